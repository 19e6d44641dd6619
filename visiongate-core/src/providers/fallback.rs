//! Bounded alternate-path attempts after a recoverable failure
//!
//! A chain holds a primary attempt plus an ordered list of labelled
//! alternates. Alternates run only when the primary fails with a kind that
//! allows fallback; each runs at most once, and when all fail the primary's
//! error is returned.

use crate::providers::error::AdapterResult;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

/// One request shape to try
pub type Attempt<'a, T> = BoxFuture<'a, AdapterResult<T>>;

/// Primary attempt followed by ordered alternates
pub struct FallbackChain<'a, T> {
    primary_label: &'static str,
    primary: Attempt<'a, T>,
    alternates: Vec<(&'static str, Attempt<'a, T>)>,
}

impl<'a, T> FallbackChain<'a, T> {
    /// Chain whose first attempt is `primary`
    pub fn new(label: &'static str, primary: Attempt<'a, T>) -> Self {
        Self {
            primary_label: label,
            primary,
            alternates: Vec::new(),
        }
    }

    /// Append an alternate, tried after those added before it
    pub fn or_else(mut self, label: &'static str, attempt: Attempt<'a, T>) -> Self {
        self.alternates.push((label, attempt));
        self
    }

    /// Run the chain to the first success
    pub async fn run(self) -> AdapterResult<T> {
        let original = match self.primary.await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !original.allows_fallback() {
            debug!(
                "'{}' failed with {}; not eligible for fallback",
                self.primary_label, original.kind
            );
            return Err(original);
        }

        for (label, attempt) in self.alternates {
            info!(
                "'{}' failed ({}); falling back to '{}'",
                self.primary_label, original, label
            );
            match attempt.await {
                Ok(value) => {
                    info!("Fallback '{}' succeeded", label);
                    return Ok(value);
                }
                Err(err) if err.allows_fallback() => {
                    warn!("Fallback '{}' failed: {}", label, err);
                }
                Err(err) => {
                    warn!("Fallback '{}' failed with {}; stopping", label, err);
                    break;
                }
            }
        }

        Err(original)
    }
}
