/// Rumble-only output reports for Sony controllers.
///
/// Only the motor bytes and the flags that enable them are written, so a
/// pulse never disturbs the lightbar or player LEDs.
///
/// DualSense USB: Report ID 0x02, 48 bytes
///   Byte 1:  valid flag 0 (0x01 = compatible vibration, 0x02 = haptics select)
///   Byte 3:  right (high frequency) motor
///   Byte 4:  left (low frequency) motor
///
/// DualSense BT: Report ID 0x31, 78 bytes
///   Byte 1:  data tag (0x02)
///   Then the USB layout shifted by +1
///   Last 4 bytes: CRC-32 (seed 0xA2)
///
/// DS4 USB: Report ID 0x05, 32 bytes
///   Byte 1:  flags (0x01 = rumble)
///   Byte 4:  right motor
///   Byte 5:  left motor
///
/// DS4 BT: Report ID 0x11, 79 bytes
///   Byte 1:  0x80 (HID output flag)
///   Byte 3:  0xF1 (enable rumble)
///   Byte 6:  right motor
///   Byte 7:  left motor
///   Last 4 bytes: CRC-32 (seed 0xA2)

use crate::controller::{ConnectionType, ControllerType};
use crate::crc32;
use crate::vibrator::Vibrator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Motor strengths, 0-255 each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Motors {
    pub left: u8,
    pub right: u8,
}

impl Motors {
    pub const OFF: Motors = Motors { left: 0, right: 0 };

    /// Both motors at the same strength.
    pub fn both(intensity: u8) -> Self {
        Self { left: intensity, right: intensity }
    }
}

/// Build a rumble report ready to write to the device.
pub fn build_report(ct: ControllerType, conn: ConnectionType, motors: Motors) -> Vec<u8> {
    match (ct.is_dualsense(), conn) {
        (true, ConnectionType::Usb) => dualsense(motors, 48, 0),
        (true, ConnectionType::Bluetooth) => dualsense(motors, 78, 1),
        (false, ConnectionType::Usb) => ds4_usb(motors),
        (false, ConnectionType::Bluetooth) => ds4_bt(motors),
    }
}

fn dualsense(motors: Motors, len: usize, shift: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    if shift == 0 {
        buf[0] = 0x02;
    } else {
        buf[0] = 0x31;
        buf[1] = 0x02;
    }
    buf[1 + shift] = 0x03;
    buf[3 + shift] = motors.right;
    buf[4 + shift] = motors.left;
    // Bluetooth only
    if shift > 0 {
        crc32::stamp(crc32::SEED_OUTPUT, &mut buf, len - 4);
    }
    buf
}

fn ds4_usb(motors: Motors) -> Vec<u8> {
    let mut buf = vec![0u8; 32];
    buf[0] = 0x05;
    buf[1] = 0x01;
    buf[4] = motors.right;
    buf[5] = motors.left;
    buf
}

fn ds4_bt(motors: Motors) -> Vec<u8> {
    let mut buf = vec![0u8; 79];
    buf[0] = 0x11;
    buf[1] = 0x80;
    buf[3] = 0xF1;
    buf[6] = motors.right;
    buf[7] = motors.left;
    let crc_offset = buf.len() - 4;
    crc32::stamp(crc32::SEED_OUTPUT, &mut buf, crc_offset);
    buf
}

/// Writes a motor state to the device.
pub type MotorWriter = Arc<dyn Fn(Motors) + Send + Sync>;

/// Turns timed pulses into motor on/off writes.
///
/// Every pulse bumps a counter; the delayed "motors off" only goes out if
/// no newer pulse has started since, so overlapping pulses are not cut short.
pub struct RumblePulser {
    write: MotorWriter,
    on: Motors,
    latest_pulse: Arc<AtomicU64>,
}

impl RumblePulser {
    pub fn new(write: MotorWriter, on: Motors) -> Self {
        Self {
            write,
            on,
            latest_pulse: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Vibrator for RumblePulser {
    fn vibrate(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let pulse = self.latest_pulse.fetch_add(1, Ordering::SeqCst) + 1;
        (self.write)(self.on);

        let write = Arc::clone(&self.write);
        let latest = Arc::clone(&self.latest_pulse);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if latest.load(Ordering::SeqCst) == pulse {
                write(Motors::OFF);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::Player;
    use crate::pulse::seq;
    use std::sync::Mutex;
    use tokio::time::Instant;

    const STRONG: Motors = Motors { left: 200, right: 120 };

    #[test]
    fn dualsense_usb_layout() {
        let r = build_report(ControllerType::DualSense, ConnectionType::Usb, STRONG);
        assert_eq!(r.len(), 48);
        assert_eq!(r[0], 0x02);
        assert_eq!(r[1], 0x03);
        assert_eq!(r[2], 0x00); // lightbar / LED flags untouched
        assert_eq!((r[3], r[4]), (120, 200));
    }

    #[test]
    fn dualsense_bt_layout_and_crc() {
        let r = build_report(ControllerType::DualSenseEdge, ConnectionType::Bluetooth, STRONG);
        assert_eq!(r.len(), 78);
        assert_eq!((r[0], r[1], r[2]), (0x31, 0x02, 0x03));
        assert_eq!((r[4], r[5]), (120, 200));
        assert!(crc32::validate(crc32::SEED_OUTPUT, &r));
    }

    #[test]
    fn ds4_layouts() {
        let usb = build_report(ControllerType::Ds4V2, ConnectionType::Usb, STRONG);
        assert_eq!(usb.len(), 32);
        assert_eq!((usb[0], usb[1], usb[4], usb[5]), (0x05, 0x01, 120, 200));

        let bt = build_report(ControllerType::Ds4V1, ConnectionType::Bluetooth, STRONG);
        assert_eq!(bt.len(), 79);
        assert_eq!((bt[0], bt[3], bt[6], bt[7]), (0x11, 0xF1, 120, 200));
        assert!(crc32::validate(crc32::SEED_OUTPUT, &bt));
    }

    #[test]
    fn off_report_zeroes_motors() {
        let r = build_report(ControllerType::DualSense, ConnectionType::Usb, Motors::OFF);
        assert_eq!((r[3], r[4]), (0, 0));
        assert_eq!(Motors::both(90), Motors { left: 90, right: 90 });
    }

    /// Pulser whose writes are recorded as (ms since creation, motors).
    fn recording_pulser() -> (RumblePulser, Arc<Mutex<Vec<(u128, Motors)>>>) {
        let origin = Instant::now();
        let writes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&writes);
        let write: MotorWriter = Arc::new(move |m: Motors| {
            sink.lock().unwrap().push((origin.elapsed().as_millis(), m));
        });
        (RumblePulser::new(write, STRONG), writes)
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_pulse_is_not_cut_short() {
        let (pulser, writes) = recording_pulser();
        pulser.vibrate(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(60)).await;
        pulser.vibrate(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(
            *writes.lock().unwrap(),
            vec![(0, STRONG), (60, STRONG), (110, Motors::OFF)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_pulses_end_after_the_last_one() {
        let (pulser, writes) = recording_pulser();
        let mut player = Player::new(Arc::new(pulser));
        player.play(&seq(&[100, 50], &[0, 0]));
        tokio::time::sleep(Duration::from_millis(500)).await;

        let writes = writes.lock().unwrap().clone();
        let last_on = writes.iter().rposition(|&(_, m)| m == STRONG).unwrap();
        assert_eq!(writes[last_on].0, 100);
        // Nothing turns the motors off while the second pulse runs.
        assert_eq!(&writes[last_on + 1..], &[(150, Motors::OFF)]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_length_pulse_writes_nothing() {
        let (pulser, writes) = recording_pulser();
        pulser.vibrate(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(writes.lock().unwrap().is_empty());
    }
}
