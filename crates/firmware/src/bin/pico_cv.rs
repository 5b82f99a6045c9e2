//! pico_cv firmware entrypoint
//!
//! Raspberry Pi Pico 2 (RP2350) with two AD5593R DACs, one per I2C
//! controller:
//!
//! - DAC 0: I2C0 (GP4 SDA / GP5 SCL), LDAC on GP8
//! - DAC 1: I2C1 (GP6 SDA / GP7 SCL), LDAC on GP9
//!
//! The USB-MIDI front end feeds pitch-bend events into [`MIDI_EVENTS`];
//! build with `--features lfo-test` to replace it with the waveform
//! self-test source.
//!
//! ```bash
//! cargo build --release --features rp2350 --bin pico_cv
//! probe-rs run --chip RP235x target/thumbv8m.main-none-eabihf/release/pico_cv
//! ```

#![no_std]
#![no_main]

use defmt::info;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::{I2C0, I2C1};
use embassy_time::Timer;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use pico_cv_core::config::{TransferConfig, I2C_CLOCK_HZ};
use pico_cv_firmware::bridge::Bridge;
use pico_cv_firmware::drivers::{ad5593r, Ad5593r, DacDriver};
use pico_cv_firmware::midi::MidiQueue;
use pico_cv_firmware::platform::rp2350::RpI2cBus;
use pico_cv_firmware::tasks;
use pico_cv_firmware::time::EmbassyClock;
use pico_cv_firmware::transfer::{watchdog, TransferEngine};

bind_interrupts!(struct Irqs {
    I2C0_IRQ => i2c::InterruptHandler<I2C0>;
    I2C1_IRQ => i2c::InterruptHandler<I2C1>;
});

type Engine0 = TransferEngine<RpI2cBus<'static, I2C0>, EmbassyClock>;
type Engine1 = TransferEngine<RpI2cBus<'static, I2C1>, EmbassyClock>;
type Dac0 = Ad5593r<'static, RpI2cBus<'static, I2C0>, EmbassyClock, Output<'static>>;
type Dac1 = Ad5593r<'static, RpI2cBus<'static, I2C1>, EmbassyClock, Output<'static>>;

static BRIDGE: Bridge = Bridge::new();

/// Ingress queue; the USB-MIDI front end is its producer.
pub static MIDI_EVENTS: MidiQueue = MidiQueue::new();

static ENGINE0: StaticCell<Engine0> = StaticCell::new();
static ENGINE1: StaticCell<Engine1> = StaticCell::new();

#[embassy_executor::task]
async fn engine0_task(engine: &'static Engine0) -> ! {
    engine.run().await
}

#[embassy_executor::task]
async fn engine1_task(engine: &'static Engine1) -> ! {
    engine.run().await
}

#[embassy_executor::task]
async fn timeout_watchdog0_task(engine: &'static Engine0) -> ! {
    watchdog::run(engine).await
}

#[embassy_executor::task]
async fn timeout_watchdog1_task(engine: &'static Engine1) -> ! {
    watchdog::run(engine).await
}

#[embassy_executor::task]
async fn worker0_task(driver: Dac0) -> ! {
    tasks::worker::run(&BRIDGE, 0, driver, EmbassyClock).await
}

#[embassy_executor::task]
async fn worker1_task(driver: Dac1) -> ! {
    tasks::worker::run(&BRIDGE, 1, driver, EmbassyClock).await
}

#[embassy_executor::task]
async fn dispatcher_task() -> ! {
    tasks::dispatcher::run(&BRIDGE).await
}

#[embassy_executor::task]
async fn refresh_task() -> ! {
    tasks::refresh::run(&BRIDGE).await
}

#[cfg(not(feature = "lfo-test"))]
#[embassy_executor::task]
async fn ingress_task() -> ! {
    use pico_cv_firmware::midi::QueueSource;
    tasks::ingress::run(&BRIDGE, QueueSource::new(&MIDI_EVENTS)).await
}

#[cfg(feature = "lfo-test")]
#[embassy_executor::task]
async fn ingress_task() -> ! {
    use pico_cv_firmware::midi::LfoSource;
    tasks::ingress::run(&BRIDGE, LfoSource::new(EmbassyClock, 1_000)).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    info!("pico_cv MIDI-to-CV bridge starting");

    fn i2c_config() -> i2c::Config {
        let mut config = i2c::Config::default();
        config.frequency = I2C_CLOCK_HZ;
        config
    }

    let bus0 = RpI2cBus::new(I2c::new_async(p.I2C0, p.PIN_5, p.PIN_4, Irqs, i2c_config()));
    let bus1 = RpI2cBus::new(I2c::new_async(p.I2C1, p.PIN_7, p.PIN_6, Irqs, i2c_config()));

    let engine0: &'static Engine0 = ENGINE0.init(TransferEngine::new(
        bus0,
        EmbassyClock,
        TransferConfig::new(ad5593r::DEFAULT_ADDRESS),
    ));
    let engine1: &'static Engine1 = ENGINE1.init(TransferEngine::new(
        bus1,
        EmbassyClock,
        TransferConfig::new(ad5593r::DEFAULT_ADDRESS),
    ));

    spawner.spawn(engine0_task(engine0)).unwrap();
    spawner.spawn(engine1_task(engine1)).unwrap();
    spawner.spawn(timeout_watchdog0_task(engine0)).unwrap();
    spawner.spawn(timeout_watchdog1_task(engine1)).unwrap();

    let mut dac0 = Ad5593r::new(engine0, Output::new(p.PIN_8, Level::Low), ad5593r::DEFAULT_ADDRESS);
    let mut dac1 = Ad5593r::new(engine1, Output::new(p.PIN_9, Level::Low), ad5593r::DEFAULT_ADDRESS);

    // A DAC that never answers stays parked in Uninitialized; the rest of
    // the pipeline keeps running.
    if let Err(e) = dac0.initialize().await {
        defmt::error!("dac0 initialization failed: {}", e.as_str());
    }
    if let Err(e) = dac1.initialize().await {
        defmt::error!("dac1 initialization failed: {}", e.as_str());
    }

    spawner.spawn(worker0_task(dac0)).unwrap();
    spawner.spawn(worker1_task(dac1)).unwrap();
    spawner.spawn(dispatcher_task()).unwrap();
    spawner.spawn(refresh_task()).unwrap();
    spawner.spawn(ingress_task()).unwrap();

    info!("all tasks started");

    loop {
        Timer::after_secs(10).await;
    }
}
