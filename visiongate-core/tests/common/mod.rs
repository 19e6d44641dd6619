//! Shared helpers for integration tests

#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Route `tracing` output to the test harness; honours `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// PNG of pseudo-random pixels; barely compressible, so size tracks pixel count
pub fn noise_png(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let img = RgbImage::from_fn(width, height, |_, _| {
        let value = next();
        Rgb([value as u8, (value >> 8) as u8, (value >> 16) as u8])
    });

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode noise png");
    bytes
}

/// Small single-colour PNG
pub fn solid_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode solid png");
    bytes
}

/// Parsed JSON bodies of every request the mock server received on `path`
pub async fn bodies_for(server: &wiremock::MockServer, path: &str) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == path)
        .map(|request| serde_json::from_slice(&request.body).expect("json request body"))
        .collect()
}

/// SSE body from `data:` payloads
pub fn sse_body<'a>(payloads: impl IntoIterator<Item = &'a str>) -> String {
    payloads
        .into_iter()
        .map(|payload| format!("data: {}\n\n", payload))
        .collect()
}
