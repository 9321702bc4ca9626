/// Pulse playback scheduler: pulse sequence → time-offset `vibrate` calls.
///
/// Pulse i fires at the exclusive prefix sum of (vibration + delay) over
/// the pulses before it:
///
///   [100/20, 50/0]  →  bzz 100ms @ 0ms, bzz 50ms @ 120ms
///
/// Starting a new playback cancels whatever is still pending from the
/// previous one, so previews never interleave at the device.

use crate::pulse::PulseSequence;
use crate::vibrator::Vibrator;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};

/// A single deferred actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actuation {
    /// Delay from the start of playback.
    pub offset: Duration,
    pub duration: Duration,
}

/// Compute the actuation plan for a sequence.
pub fn schedule(sequence: &PulseSequence) -> Vec<Actuation> {
    let mut offset_ms: u64 = 0;
    sequence
        .pulses()
        .iter()
        .map(|pulse| {
            let actuation = Actuation {
                offset: Duration::from_millis(offset_ms),
                duration: Duration::from_millis(pulse.vibration_ms as u64),
            };
            offset_ms += pulse.vibration_ms as u64 + pulse.delay_ms as u64;
            actuation
        })
        .collect()
}

/// Owns the vibrator and at most one in-flight playback.
pub struct Player {
    vibrator: Arc<dyn Vibrator>,
    current: Option<JoinHandle<()>>,
}

impl Player {
    pub fn new(vibrator: Arc<dyn Vibrator>) -> Self {
        Self { vibrator, current: None }
    }

    /// Fire-and-forget playback (non-blocking). Must be called from within a
    /// tokio runtime.
    pub fn play(&mut self, sequence: &PulseSequence) {
        self.stop();
        let plan = schedule(sequence);
        log::debug!("Playing {} pulse(s) over {}ms", plan.len(), sequence.span_ms());
        let vibrator = Arc::clone(&self.vibrator);
        self.current = Some(tokio::spawn(async move {
            run_plan(&plan, vibrator.as_ref()).await;
        }));
    }

    /// Drop any actuations that have not fired yet.
    pub fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            if !handle.is_finished() {
                log::debug!("Cancelling previous playback");
            }
            handle.abort();
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_plan(plan: &[Actuation], vibrator: &dyn Vibrator) {
    let start = Instant::now();
    for actuation in plan {
        sleep_until(start + actuation.offset).await;
        vibrator.vibrate(actuation.duration);
    }
}
