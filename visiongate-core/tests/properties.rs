//! Property-based tests for the invariants that must hold for any input

use proptest::prelude::*;
use visiongate_core::imaging::{CompressionTarget, ImageCompressor};
use visiongate_core::providers::completions::{from_openai_messages, to_openai_messages};
use visiongate_core::providers::local::converter::transcript;
use visiongate_core::streaming::StreamingCoordinator;
use visiongate_core::{Message, Part, Role, StreamEvent};

fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::System), Just(Role::User), Just(Role::Assistant)]
}

fn text_message() -> impl Strategy<Value = Message> {
    (role(), ".{0,40}").prop_map(|(role, text)| Message::new(role, vec![Part::text(text)]))
}

proptest! {
    #[test]
    fn prop_coordinator_emits_well_formed_sequence(fragments in proptest::collection::vec(".{0,8}", 0..20)) {
        let mut coordinator = StreamingCoordinator::new();
        let mut events = Vec::new();
        for fragment in &fragments {
            events.extend(coordinator.on_fragment(fragment.clone()).unwrap());
        }
        events.extend(coordinator.on_end().unwrap());

        let expected_text: String = fragments.concat();
        prop_assert_eq!(events.first(), Some(&StreamEvent::Start));
        prop_assert_eq!(events.last(), Some(&StreamEvent::Complete(expected_text.clone())));
        prop_assert_eq!(events.iter().filter(|e| **e == StreamEvent::Start).count(), 1);
        prop_assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        let chunks: String = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Chunk(text) => {
                    assert!(!text.is_empty());
                    Some(text.as_str())
                }
                _ => None,
            })
            .collect();
        prop_assert_eq!(chunks, expected_text);

        prop_assert!(coordinator.on_fragment("late".to_string()).is_err());
    }

    #[test]
    fn prop_completions_text_round_trip(messages in proptest::collection::vec(text_message(), 0..6)) {
        let back = from_openai_messages(&to_openai_messages(&messages));
        prop_assert_eq!(back, messages);
    }

    #[test]
    fn prop_compress_within_budget_is_identity(
        bytes in proptest::collection::vec(any::<u8>(), 0..2048),
        headroom in 0usize..1024,
    ) {
        let target = CompressionTarget::new(bytes.len() + headroom);
        let compressed = ImageCompressor::new()
            .compress(&bytes, "image/png", target)
            .unwrap();

        prop_assert!(compressed.is_passthrough());
        prop_assert!(compressed.within_budget);
        prop_assert_eq!(compressed.bytes, bytes);
        prop_assert_eq!(compressed.mime_type, "image/png");
    }

    #[test]
    fn prop_transcript_skips_blank_turns(messages in proptest::collection::vec(text_message(), 0..6)) {
        let rendered = transcript(&messages);
        let kept = messages.iter().filter(|m| !m.text().trim().is_empty()).count();
        if kept == 0 {
            prop_assert!(rendered.is_empty());
        } else {
            prop_assert!(rendered.starts_with(
                messages.iter().find(|m| !m.text().trim().is_empty()).unwrap().role.label()
            ));
        }
    }
}
