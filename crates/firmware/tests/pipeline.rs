//! End-to-end pipeline scenarios over the mock platform
//!
//! Each test stands up the real task bodies (engine service loop,
//! dispatcher, worker, ingress, refresh) against a mock bus and drives a
//! scenario from the outside: feed pitch-bend events, inject faults,
//! then verify the frames that reached the "wire" and the recovery
//! bookkeeping.

use embassy_futures::join::{join3, join4};
use embassy_futures::select::{select, Either};
use embassy_time::Timer;

use pico_cv_core::config::{TransferConfig, CHANNELS_PER_DAC};
use pico_cv_core::midi::PitchBend;
use pico_cv_core::recovery::RecoveryAction;
use pico_cv_core::transfer::ErrorKind;

use pico_cv_firmware::bridge::Bridge;
use pico_cv_firmware::drivers::{Ad5593r, DacDriver};
use pico_cv_firmware::midi::{MidiQueue, QueueSource};
use pico_cv_firmware::platform::error::I2cBusError;
use pico_cv_firmware::platform::mock::{MockI2cBus, MockLatchPin, MockOutcome, Transaction};
use pico_cv_firmware::tasks;
use pico_cv_firmware::time::EmbassyClock;
use pico_cv_firmware::transfer::{watchdog, TransferEngine};

const DAC_ADDRESS: u8 = 0x10;

type Engine = TransferEngine<MockI2cBus, EmbassyClock>;

fn engine_with_timeout(timeout_ms: u64) -> Engine {
    TransferEngine::new(
        MockI2cBus::new(),
        EmbassyClock,
        TransferConfig {
            timeout_ms,
            ..TransferConfig::new(DAC_ADDRESS)
        },
    )
}

async fn initialized_dac(
    engine: &Engine,
) -> Ad5593r<'_, MockI2cBus, EmbassyClock, MockLatchPin> {
    let mut dac = Ad5593r::new(engine, MockLatchPin::new(), DAC_ADDRESS);
    dac.initialize().await.unwrap();
    engine.with_bus(|bus| bus.clear_transactions()).await;
    dac
}

/// Batched-frame triple for one channel, as seen on the wire.
fn frame_triple(bytes: &[u8], channel: usize) -> &[u8] {
    &bytes[channel * 3..channel * 3 + 3]
}

fn last_write_bytes(transactions: &[Transaction]) -> Vec<u8> {
    transactions
        .iter()
        .rev()
        .find_map(|t| match t {
            Transaction::Write { bytes, .. } => Some(bytes.as_slice().to_vec()),
            _ => None,
        })
        .expect("no write reached the bus")
}

/// Whether any write on the bus carried exactly these bytes.
fn saw_write(transactions: &[Transaction], expected: &[u8]) -> bool {
    transactions.iter().any(|t| match t {
        Transaction::Write { bytes, .. } => bytes.as_slice() == expected,
        _ => false,
    })
}

#[tokio::test]
async fn center_hold_reaches_dac_register() {
    let bridge = Bridge::new();
    let engine = engine_with_timeout(100);
    let dac = initialized_dac(&engine).await;
    let queue = MidiQueue::new();

    let pipeline = join4(
        engine.run(),
        tasks::dispatcher::run(&bridge),
        tasks::worker::run(&bridge, 0, dac, EmbassyClock),
        tasks::ingress::run(&bridge, QueueSource::new(&queue)),
    );

    let scenario = async {
        queue.send(PitchBend { channel: 1, value: 0 }).await;
        Timer::after_millis(120).await;

        let bytes = engine
            .with_bus(|bus| last_write_bytes(bus.transactions()))
            .await;
        // Channel 0: register 0x10, 0x8000 rescaled to 12 bits = 0x800.
        assert_eq!(frame_triple(&bytes, 0), &[0x10, 0x08, 0x00]);

        // Monotonic publication held throughout.
        let (update, processed) = bridge.sequences(0);
        assert_eq!(update, processed);
    };

    match select(scenario, pipeline).await {
        Either::First(()) => {}
        Either::Second(_) => unreachable!(),
    }
}

#[tokio::test]
async fn maximum_swing_reaches_last_channel() {
    let bridge = Bridge::new();
    let engine = engine_with_timeout(100);
    let dac = initialized_dac(&engine).await;
    let queue = MidiQueue::new();

    let pipeline = join4(
        engine.run(),
        tasks::dispatcher::run(&bridge),
        tasks::worker::run(&bridge, 0, dac, EmbassyClock),
        tasks::ingress::run(&bridge, QueueSource::new(&queue)),
    );

    let scenario = async {
        queue
            .send(PitchBend {
                channel: 8,
                value: 0x1FFF,
            })
            .await;
        Timer::after_millis(120).await;

        let bytes = engine
            .with_bus(|bus| last_write_bytes(bus.transactions()))
            .await;
        // Channel 7: register 0x17, 0xFFFC rescaled = 0xFFF.
        assert_eq!(frame_triple(&bytes, 7), &[0x17, 0x0F, 0xFF]);
    };

    match select(scenario, pipeline).await {
        Either::First(()) => {}
        Either::Second(_) => unreachable!(),
    }
}

#[tokio::test]
async fn burst_coalesces_to_latest_value() {
    let bridge = Bridge::new();
    let engine = engine_with_timeout(100);
    let dac = initialized_dac(&engine).await;
    let queue = MidiQueue::new();

    let pipeline = join4(
        engine.run(),
        tasks::dispatcher::run(&bridge),
        tasks::worker::run(&bridge, 0, dac, EmbassyClock),
        tasks::ingress::run(&bridge, QueueSource::new(&queue)),
    );

    let scenario = async {
        // Let the boot publish drain, then make transfers slow enough
        // that the burst outpaces them.
        Timer::after_millis(30).await;
        engine
            .with_bus(|bus| {
                bus.clear_transactions();
                bus.set_default_outcome(MockOutcome::OkAfterMs(10));
            })
            .await;

        // 100 messages on channel 3, sweeping up to +0x1000.
        for i in 0..100i32 {
            let value = (i + 1) * 0x1000 / 100;
            queue
                .send(PitchBend {
                    channel: 3,
                    value: value as i16,
                })
                .await;
        }
        Timer::after_millis(60).await;

        engine
            .with_bus(|bus| {
                // Coalescing: the burst produced at most two transfers.
                assert!(bus.write_count() <= 2, "got {} writes", bus.write_count());
                let bytes = last_write_bytes(bus.transactions());
                // +0x1000 -> 0xC000 -> 0xC00 at 12 bits, channel index 2.
                assert_eq!(frame_triple(&bytes, 2), &[0x12, 0x0C, 0x00]);
            })
            .await;
    };

    match select(scenario, pipeline).await {
        Either::First(()) => {}
        Either::Second(_) => unreachable!(),
    }
}

#[tokio::test]
async fn transient_nak_degrades_then_recovers() {
    let bridge = Bridge::new();
    let engine = engine_with_timeout(100);
    let dac = initialized_dac(&engine).await;
    let queue = MidiQueue::new();

    // DAC 1 owns channel indices 8..16; MIDI channel 9 is its first.
    let dac_index = 1;

    let pipeline = join4(
        engine.run(),
        tasks::dispatcher::run(&bridge),
        tasks::worker::run(&bridge, dac_index, dac, EmbassyClock),
        tasks::ingress::run(&bridge, QueueSource::new(&queue)),
    );

    let scenario = async {
        Timer::after_millis(30).await;
        engine
            .with_bus(|bus| {
                bus.clear_transactions();
                bus.script_n(MockOutcome::Error(I2cBusError::Nack), 4);
            })
            .await;

        queue
            .send(PitchBend {
                channel: 9,
                value: 0x1000,
            })
            .await;
        Timer::after_millis(50).await;

        // The retry ladder: three immediate retries, then fallback.
        let actions: Vec<RecoveryAction> =
            bridge.with_recovery(|p| p.error_log().map(|e| e.action).collect());
        assert_eq!(
            actions,
            vec![
                RecoveryAction::RetryNow,
                RecoveryAction::RetryNow,
                RecoveryAction::RetryNow,
                RecoveryAction::FallbackSync,
            ]
        );
        assert!(bridge.with_recovery(|p| p
            .error_log()
            .all(|e| e.kind == ErrorKind::Nak && e.dac_index == dac_index as u8)));
        assert!(bridge.fallback_mode(dac_index));

        // The subsequent synchronous transfer carried the value: channel
        // index 8 is this DAC's register 0x10, +0x1000 scales to 0xC00.
        assert!(
            engine
                .with_bus(|bus| saw_write(bus.transactions(), &[0x10, 0x0C, 0x00]))
                .await
        );

        // Ten clean synchronous updates clear the fallback.
        let streak = bridge.with_recovery(|p| p.config().fallback_recovery_successes);
        for _ in 0..streak {
            bridge.request_update(dac_index);
            loop {
                let (update, processed) = bridge.sequences(dac_index);
                if update == processed {
                    break;
                }
                embassy_futures::yield_now().await;
            }
        }
        assert!(!bridge.fallback_mode(dac_index));

        // And the async path is back: the next update is one batched frame.
        engine.with_bus(|bus| bus.clear_transactions()).await;
        bridge.request_update(dac_index);
        Timer::after_millis(20).await;
        let bytes = engine
            .with_bus(|bus| last_write_bytes(bus.transactions()))
            .await;
        assert_eq!(bytes.len(), CHANNELS_PER_DAC * 3);
    };

    match select(scenario, pipeline).await {
        Either::First(()) => {}
        Either::Second(_) => unreachable!(),
    }
}

#[tokio::test]
async fn permanent_stall_resets_peripheral_then_recovers() {
    let bridge = Bridge::new();
    // Short timeout keeps the retry ladder fast on host.
    let engine = engine_with_timeout(20);
    let dac = initialized_dac(&engine).await;

    let pipeline = join4(
        engine.run(),
        watchdog::run(&engine),
        tasks::worker::run(&bridge, 0, dac, EmbassyClock),
        tasks::refresh::run(&bridge),
    );

    let scenario = async {
        Timer::after_millis(30).await;
        engine
            .with_bus(|bus| {
                bus.clear_transactions();
                bus.set_default_outcome(MockOutcome::Stall);
            })
            .await;

        bridge.write_input(0, 0x9000);
        bridge.dispatch().await;

        // Timeout ladder -> fallback -> persistent stall -> reset. The
        // mock bus becomes healthy again after the reset.
        let deadline = embassy_time::Instant::now() + embassy_time::Duration::from_millis(1500);
        loop {
            let resets = engine.with_bus(|bus| bus.resets()).await;
            if resets > 0 {
                break;
            }
            assert!(embassy_time::Instant::now() < deadline, "no reset issued");
            Timer::after_millis(5).await;
        }

        assert_eq!(bridge.with_recovery(|p| p.stats().peripheral_resets), 1);
        assert!(bridge.fallback_mode(0));

        // Within one refresh period the published value reaches the bus:
        // 0x9000 rescaled to 12 bits = 0x900, channel 0 register write.
        engine.with_bus(|bus| bus.clear_transactions()).await;
        Timer::after_millis(150).await;
        assert!(
            engine
                .with_bus(|bus| saw_write(bus.transactions(), &[0x10, 0x09, 0x00]))
                .await
        );
    };

    match select(scenario, pipeline).await {
        Either::First(()) => {}
        Either::Second(_) => unreachable!(),
    }
}

#[tokio::test]
async fn quiescent_refresh_keeps_outputs_alive() {
    let bridge = Bridge::new();
    let engine = engine_with_timeout(100);
    let dac = initialized_dac(&engine).await;

    let pipeline = join3(
        engine.run(),
        tasks::worker::run(&bridge, 0, dac, EmbassyClock),
        tasks::refresh::run(&bridge),
    );

    let scenario = async {
        // Let boot and the first refresh storm settle.
        Timer::after_millis(50).await;
        let baseline = engine.with_bus(|bus| bus.write_count()).await;

        Timer::after_millis(500).await;
        let total = engine.with_bus(|bus| bus.write_count()).await;

        // One refresh-driven transfer per period: 5 in 500 ms, +/-1.
        let refreshed = total - baseline;
        assert!(
            (4..=6).contains(&refreshed),
            "expected 4..=6 refresh transfers, got {refreshed}"
        );
    };

    match select(scenario, pipeline).await {
        Either::First(()) => {}
        Either::Second(_) => unreachable!(),
    }
}
