//! Example: bridge wake-word triggers from the system bus to the console.
//!
//! Run with: cargo run -p hark-detect --example wake_bridge
//!
//! Expects a detector engine broadcasting `trigger` signals on the
//! io.hark.Detector1 interface.

use std::sync::Arc;
use std::time::Duration;

use hark_buslink::SystemBusLink;
use hark_detect::{keyword_observer, state_observer, WakeBridge};
use hark_stream::AudioStream;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("hark_detect=debug,hark_buslink=debug")
        .init();

    let stream = Arc::new(AudioStream::new());

    let on_keyword = keyword_observer(|stream, keyword, _begin, _end| {
        println!(
            "wake word '{}' ({}ms of audio buffered)",
            keyword,
            stream.duration_ms()
        );
    });
    let on_state = state_observer(|state| {
        println!("detector state: {state:?}");
    });

    let mut bridge = WakeBridge::create(
        Box::new(SystemBusLink::new()),
        Some(stream),
        vec![on_keyword],
        vec![on_state],
    )?;

    println!("Listening for triggers for 60 seconds...");
    std::thread::sleep(Duration::from_secs(60));

    bridge.shutdown();
    println!("Done.");
    Ok(())
}
