//! PulseMeter daemon - meter pulses in, MQTT snapshots out
//!
//! One positional argument selects the physical channel: a GPIO pin
//! number for the digital proximity switch, or the reserved value `1`
//! for the analog Hall sensor on I2C (the gas meter, 10 L per pulse).
//! Broker, topic, and device identity come from `PULSEMETER_*`
//! environment variables; see the `config` module.
//!
//! Everything runs on a single-threaded runtime as cooperative tasks:
//! detector loop, processor, publisher, MQTT driver, and the liveness
//! watchdog. The first task to fail brings the whole set down and the
//! process exits non-zero - a malfunctioning sensor must not keep
//! silently producing numbers.

use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use pulsemeter_core::liveness::{LivenessMarker, LivenessWatchdog};
use pulsemeter_core::processor::PulseEventProcessor;
use pulsemeter_core::time::{Clock, SystemClock};
use pulsemeter_core::FlowGauge;

use pulsemeter_daemon::config::{Channel, DaemonConfig};
use pulsemeter_daemon::publisher::MqttPublisher;
use pulsemeter_daemon::tasks;

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[cfg(feature = "rpi")]
fn spawn_detector(
    channel: &Channel,
    set: &mut JoinSet<Result<(), tasks::TaskError>>,
    events: mpsc::Sender<pulsemeter_core::PulseEvent>,
) -> Result<(), tasks::TaskError> {
    use pulsemeter_daemon::hardware;

    match channel {
        Channel::Digital { gpio_pin } => {
            let source = hardware::GpioPulseSource::open(*gpio_pin)?;
            set.spawn(tasks::run_digital_detector(source, SystemClock, events));
        }
        Channel::Analog { i2c_bus } => {
            let source = hardware::Ads1115Source::open(*i2c_bus)?;
            set.spawn(tasks::run_analog_detector(source, SystemClock, events));
        }
    }
    Ok(())
}

#[cfg(not(feature = "rpi"))]
fn spawn_detector(
    channel: &Channel,
    _set: &mut JoinSet<Result<(), tasks::TaskError>>,
    _events: mpsc::Sender<pulsemeter_core::PulseEvent>,
) -> Result<(), tasks::TaskError> {
    // Keep the binary buildable off-target; attaching real sensors
    // requires the `rpi` feature.
    let _ = channel;
    Err(tasks::TaskError::NoHardwareSupport)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match DaemonConfig::from_env(std::env::args()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("usage: pulsemeter <gpio-pin>   (pin 1 selects the analog/I2C channel)");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.debug);

    info!(
        "pid {}: starting on {:?}, broker {}:{}, send SIGINT or SIGTERM to exit",
        std::process::id(),
        config.channel,
        config.broker,
        config.port
    );

    let clock = SystemClock;
    let started_at = clock.now_ms();
    let marker = Arc::new(LivenessMarker::new(started_at));

    let (event_tx, event_rx) = mpsc::channel(tasks::EVENT_QUEUE_DEPTH);
    let (snapshot_tx, snapshot_rx) = mpsc::channel(tasks::SNAPSHOT_QUEUE_DEPTH);

    let processor = PulseEventProcessor::new(
        FlowGauge::new(),
        Arc::clone(&marker),
        config.channel.liters_per_pulse(),
        started_at,
    );

    let (mqtt, mqtt_driver) = match MqttPublisher::connect(&config, started_at) {
        Ok(pair) => pair,
        Err(err) => {
            error!("cannot set up MQTT client: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut set: JoinSet<Result<(), tasks::TaskError>> = JoinSet::new();

    if let Err(err) = spawn_detector(&config.channel, &mut set, event_tx) {
        error!("cannot open sensor channel: {err}");
        return ExitCode::FAILURE;
    }
    set.spawn(tasks::run_processor(processor, event_rx, snapshot_tx));
    set.spawn(tasks::run_publisher(mqtt, snapshot_rx));
    set.spawn(tasks::drive_mqtt(mqtt_driver));
    set.spawn(tasks::run_watchdog(
        Arc::clone(&marker),
        LivenessWatchdog::default(),
        clock,
    ));

    // Fail-fast supervision: the first task to finish decides the fate of
    // the whole set, then everything is cancelled and awaited so hardware
    // handles are released deterministically.
    let verdict = tokio::select! {
        joined = set.join_next() => match joined {
            Some(Ok(Ok(()))) => {
                error!("task finished unexpectedly");
                ExitCode::FAILURE
            }
            Some(Ok(Err(err))) => {
                error!("fatal: {err}");
                ExitCode::FAILURE
            }
            Some(Err(join_err)) => {
                error!("task panicked: {join_err}");
                ExitCode::FAILURE
            }
            None => ExitCode::FAILURE,
        },
        _ = tasks::shutdown_signal() => {
            info!("signal received, shutting down");
            ExitCode::SUCCESS
        }
    };

    set.shutdown().await;
    info!("end of main");
    verdict
}
