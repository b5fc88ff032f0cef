//! The daemon's cooperative task set
//!
//! Every long-lived activity is one async task on the current-thread
//! runtime: detector loop, processor, publisher, MQTT driver, watchdog.
//! Suspension points are the explicit sleeps between polls - 10 ms while
//! stabilizing a suspected transition, 100 ms in normal polling, 1 s for
//! the watchdog - so no task ever blocks the thread.
//!
//! Hand-offs are bounded mpsc channels: detector to processor carries
//! [`PulseEvent`]s, processor to publisher carries snapshots. The
//! snapshot hand-off is fire-and-forget (`try_send`); a slow broker fills
//! the queue and drops snapshots with a warning instead of stalling
//! detection.
//!
//! Each task returns `Result<(), TaskError>`; the supervisor in `main`
//! treats the first completion as fatal, cancels the rest, and exits.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, trace, warn};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};

use pulsemeter_core::constants::{
    POLL_INTERVAL_MS, STABILIZE_INTERVAL_MS, WATCHDOG_INTERVAL_MS,
};
use pulsemeter_core::detect::analog::Edge;
use pulsemeter_core::detect::calibrator::AnalogCalibrator;
use pulsemeter_core::detect::digital::{DigitalPulseDetector, Stabilizer, Transition};
use pulsemeter_core::detect::heartbeat::HeartbeatSchedule;
use pulsemeter_core::detect::AnalogPulseDetector;
use pulsemeter_core::errors::PulseError;
use pulsemeter_core::liveness::{LivenessMarker, LivenessWatchdog};
use pulsemeter_core::processor::{PulseEventProcessor, Snapshot};
use pulsemeter_core::time::Clock;
use pulsemeter_core::PulseEvent;

use crate::publisher::MetricsPublisher;
use crate::source::{AnalogSource, DigitalSource, SourceError};

/// Detector-to-processor queue depth
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Processor-to-publisher queue depth; overflowing drops snapshots
pub const SNAPSHOT_QUEUE_DEPTH: usize = 8;

/// Seed range for the analog calibrator, matching the deployed
/// hall-sensor electronics; calibration passes refine it from there.
const ANALOG_SEED_LOW: i32 = 16_500;
/// See [`ANALOG_SEED_LOW`].
const ANALOG_SEED_HIGH: i32 = 18_500;

/// Window of raw analog readings flushed to the debug log
const ANALOG_DEBUG_CHUNK: usize = 20;

/// Fatal task outcomes routed to the supervisor
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Detection, calibration, or liveness failure from the core
    #[error("{0}")]
    Pulse(PulseError),

    /// Platform sensor read failure
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A peer task hung up its channel end
    #[error("event channel closed")]
    ChannelClosed,

    /// Binary built without a platform sensor backend
    #[error("built without hardware support; rebuild with the `rpi` feature")]
    NoHardwareSupport,
}

impl From<PulseError> for TaskError {
    fn from(err: PulseError) -> Self {
        TaskError::Pulse(err)
    }
}

/// Resolves when SIGINT or SIGTERM arrives
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = ctrl_c.await;
        }
    }

    #[cfg(not(unix))]
    let _ = ctrl_c.await;
}

/// One stabilization pass: sample at the short cadence until the line
/// settles or the bounce budget runs out.
async fn stabilize<S: DigitalSource>(source: &mut S) -> Result<bool, TaskError> {
    let mut stabilizer = Stabilizer::new();
    loop {
        sleep(Duration::from_millis(STABILIZE_INTERVAL_MS)).await;
        let value = source.digital_read()?;
        if let Some(stable) = stabilizer.observe(value)? {
            return Ok(stable);
        }
    }
}

async fn send_event(
    events: &mpsc::Sender<PulseEvent>,
    event: PulseEvent,
) -> Result<(), TaskError> {
    events.send(event).await.map_err(|_| TaskError::ChannelClosed)
}

/// Debounced polling loop over a digital source.
///
/// The initial confirmed level comes from a full stabilization pass, so a
/// meter parked on the active level does not count a phantom pulse at
/// boot. After that: poll, stabilize on disagreement, emit a pulse on a
/// confirmed transition to the active level, and keep the no-pulse
/// heartbeats flowing per the schedule.
pub async fn run_digital_detector<S, C>(
    mut source: S,
    clock: C,
    events: mpsc::Sender<PulseEvent>,
) -> Result<(), TaskError>
where
    S: DigitalSource + Send,
    C: Clock + Send,
{
    let initial = stabilize(&mut source).await?;
    let mut detector = DigitalPulseDetector::new(initial);
    let mut schedule = HeartbeatSchedule::new(clock.now_ms());
    debug!("digital detector up, initial level {initial}");

    loop {
        let raw = source.digital_read()?;
        if detector.needs_confirmation(raw) {
            let stabilized = stabilize(&mut source).await?;
            match detector.resolve(raw, stabilized) {
                Transition::Confirmed { value } => {
                    if value {
                        let now = clock.now_ms();
                        schedule.note_pulse(now);
                        send_event(
                            &events,
                            PulseEvent::Pulse {
                                timestamp: now,
                                flow_hint_mlps: None,
                            },
                        )
                        .await?;
                    }
                }
                Transition::AbsorbedJitter => {
                    debug!("absorbed jitter, keeping {}", detector.confirmed());
                }
            }
        }

        let now = clock.now_ms();
        if schedule.due(now) {
            schedule.note_beat(now);
            send_event(&events, PulseEvent::Heartbeat { timestamp: now }).await?;
        }

        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Calibrating hysteresis loop over an analog source.
///
/// Each falling edge is the counted pulse. For field debugging the loop
/// also collects raw readings during the first minute of every hour since
/// start and flushes them to the debug log, and logs every recalibration.
pub async fn run_analog_detector<S, C>(
    mut source: S,
    clock: C,
    events: mpsc::Sender<PulseEvent>,
) -> Result<(), TaskError>
where
    S: AnalogSource + Send,
    C: Clock + Send,
{
    let calibrator = AnalogCalibrator::with_range(ANALOG_SEED_LOW, ANALOG_SEED_HIGH);
    let mut detector = AnalogPulseDetector::new(calibrator);
    let started = clock.now_ms();
    let mut previous_range = detector.calibrator().range();
    let mut debug_window: Vec<i32> = Vec::new();

    loop {
        let value = i32::from(source.analog_read()?);
        let now = clock.now_ms();

        let in_debug_minute = now.saturating_sub(started) % 3_600_000 < 60_000;
        if in_debug_minute {
            debug_window.push(value);
        }
        if debug_window.len() >= ANALOG_DEBUG_CHUNK || (!in_debug_minute && !debug_window.is_empty())
        {
            let readings = debug_window
                .iter()
                .map(i32::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            debug!("analog readings: {readings}");
            debug_window.clear();
        }

        match detector.feed(value, now)? {
            Some(Edge::Rising) => {
                debug!("got rising edge at {value}");
            }
            Some(Edge::Falling { flow_hint_mlps }) => {
                debug!("got falling edge at {value}, dwell flow {flow_hint_mlps:?} mL/s");
                send_event(
                    &events,
                    PulseEvent::Pulse {
                        timestamp: now,
                        flow_hint_mlps,
                    },
                )
                .await?;
            }
            None => {}
        }

        let range = detector.calibrator().range();
        if range != previous_range {
            if let (Some(old), Some(new)) = (previous_range, range) {
                debug!(
                    "recalibrated: {}->{} {}->{}",
                    old.low, new.low, old.high, new.high
                );
            }
            previous_range = range;
        }

        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Event consumer: counts, gauges, throttles, and forwards snapshots.
pub async fn run_processor(
    mut processor: PulseEventProcessor,
    mut events: mpsc::Receiver<PulseEvent>,
    snapshots: mpsc::Sender<Snapshot>,
) -> Result<(), TaskError> {
    while let Some(event) = events.recv().await {
        if let PulseEvent::Pulse {
            flow_hint_mlps: Some(hint),
            ..
        } = event
        {
            debug!("pulse dwell suggests {hint:.1} mL/s");
        }

        if let Some(snapshot) = processor.handle(event) {
            match snapshots.try_send(snapshot) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("publish queue full, dropping snapshot");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    return Err(TaskError::ChannelClosed);
                }
            }
        }
    }

    // Detector hung up; it reports its own failure to the supervisor.
    Err(TaskError::ChannelClosed)
}

/// Publisher consumer. Transport failures are logged and the snapshot is
/// abandoned; the next scheduled publish is the retry.
pub async fn run_publisher<P: MetricsPublisher>(
    mut publisher: P,
    mut snapshots: mpsc::Receiver<Snapshot>,
) -> Result<(), TaskError> {
    while let Some(snapshot) = snapshots.recv().await {
        if let Err(err) = publisher.publish(&snapshot).await {
            error!("publish failed, retrying on next snapshot: {err}");
        }
    }
    Err(TaskError::ChannelClosed)
}

/// Drives the rumqttc event loop; nothing leaves the box unless this
/// task is polled.
pub async fn drive_mqtt(mut event_loop: rumqttc::EventLoop) -> Result<(), TaskError> {
    loop {
        match event_loop.poll().await {
            Ok(event) => trace!("mqtt: {event:?}"),
            Err(err) => {
                error!("mqtt connection error: {err}");
                // Polling again reconnects; pace it.
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// 1 Hz dead man's switch over the liveness marker.
pub async fn run_watchdog<C>(
    marker: Arc<LivenessMarker>,
    watchdog: LivenessWatchdog,
    clock: C,
) -> Result<(), TaskError>
where
    C: Clock + Send,
{
    let mut ticker = interval(Duration::from_millis(WATCHDOG_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        watchdog.check(&marker, clock.now_ms())?;
    }
}
