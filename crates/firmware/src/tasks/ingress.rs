//! MIDI ingress task
//!
//! Pumps pitch-bend events from the external source, scales them into the
//! 16-bit channel domain, and writes the input bank. Events for channels
//! beyond the configured bank are silently dropped.

use embassy_futures::yield_now;

use pico_cv_core::midi::{channel_to_index, pitch_bend_to_value};

use crate::bridge::Bridge;
use crate::midi::MidiSource;

pub async fn run<S: MidiSource>(bridge: &Bridge, mut source: S) -> ! {
    crate::log_info!("midi ingress task started");
    loop {
        let event = source.next_event().await;
        if let Some(index) = channel_to_index(event.channel) {
            bridge.write_input(index, pitch_bend_to_value(event.value));
        }
        yield_now().await;
    }
}
