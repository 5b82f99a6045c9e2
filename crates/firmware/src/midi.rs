//! MIDI event sources
//!
//! The ingress task pumps pitch-bend events from a [`MidiSource`]. In the
//! deployed firmware that is a [`QueueSource`] fed by the USB-MIDI front
//! end; with the `lfo-test` feature the source is replaced by a generated
//! waveform that sweeps every channel, for bench checks without a host.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};

use pico_cv_core::midi::PitchBend;

/// Depth of the ingress event queue.
pub const MIDI_QUEUE_DEPTH: usize = 32;

/// Queue between the USB-MIDI front end and the ingress task.
pub type MidiQueue = Channel<CriticalSectionRawMutex, PitchBend, MIDI_QUEUE_DEPTH>;

/// Provider of pitch-bend events for the ingress task.
pub trait MidiSource {
    /// Next event; pends until one is available.
    async fn next_event(&mut self) -> PitchBend;
}

/// Source backed by a [`MidiQueue`].
pub struct QueueSource<'a> {
    receiver: Receiver<'a, CriticalSectionRawMutex, PitchBend, MIDI_QUEUE_DEPTH>,
}

impl<'a> QueueSource<'a> {
    pub fn new(queue: &'a MidiQueue) -> Self {
        Self {
            receiver: queue.receiver(),
        }
    }
}

impl MidiSource for QueueSource<'_> {
    async fn next_event(&mut self) -> PitchBend {
        self.receiver.receive().await
    }
}

/// Triangle-wave self-test source.
///
/// Sweeps the full bend range and cycles through all channels, one event
/// per channel per tick, feeding the input bank exactly like live MIDI
/// would.
#[cfg(feature = "lfo-test")]
pub struct LfoSource<C> {
    clock: C,
    period_ms: u64,
    next_channel: u8,
}

#[cfg(feature = "lfo-test")]
impl<C: pico_cv_core::time::TimeSource> LfoSource<C> {
    pub fn new(clock: C, period_ms: u64) -> Self {
        Self {
            clock,
            period_ms: period_ms.max(2),
            next_channel: 1,
        }
    }

    /// Triangle over the signed 14-bit bend range.
    fn bend_at(&self, now_ms: u64) -> i16 {
        let phase = now_ms % self.period_ms;
        let half = self.period_ms / 2;
        let span = 0x3FFFu64;
        let pos = if phase < half {
            phase * span / half
        } else {
            (self.period_ms - phase) * span / half
        };
        (pos as i32 - 0x2000) as i16
    }
}

#[cfg(feature = "lfo-test")]
impl<C: pico_cv_core::time::TimeSource> MidiSource for LfoSource<C> {
    async fn next_event(&mut self) -> PitchBend {
        use pico_cv_core::config::TOTAL_CHANNELS;

        let channel = self.next_channel;
        self.next_channel += 1;
        if self.next_channel > TOTAL_CHANNELS as u8 {
            self.next_channel = 1;
            // Pace one full sweep per millisecond tick.
            embassy_time::Timer::after_millis(1).await;
        }

        PitchBend {
            channel,
            value: self.bend_at(self.clock.now_ms()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_source_delivers_in_order() {
        let queue = MidiQueue::new();
        let mut source = QueueSource::new(&queue);

        queue
            .send(PitchBend {
                channel: 1,
                value: 0,
            })
            .await;
        queue
            .send(PitchBend {
                channel: 3,
                value: 0x1000,
            })
            .await;

        assert_eq!(
            source.next_event().await,
            PitchBend {
                channel: 1,
                value: 0
            }
        );
        assert_eq!(
            source.next_event().await,
            PitchBend {
                channel: 3,
                value: 0x1000
            }
        );
    }
}
