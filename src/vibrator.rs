/// Device actuation interface.
///
/// A vibrator only knows how to run its motor for a duration. It has no
/// notion of delays or sequences; the playback scheduler turns a pulse
/// sequence into timed `vibrate` calls.

use std::time::Duration;

pub trait Vibrator: Send + Sync + 'static {
    /// Start vibrating for `duration`. Must not block the caller.
    fn vibrate(&self, duration: Duration);
}

/// Backend for machines without a haptic device: logs each actuation.
pub struct LogVibrator;

impl Vibrator for LogVibrator {
    fn vibrate(&self, duration: Duration) {
        log::info!("bzz {}ms", duration.as_millis());
    }
}
