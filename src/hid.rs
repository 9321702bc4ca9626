/// DualSense / DualShock 4 vibrator backed by hidapi.
///
/// - Filter by VID/PID + usage page 0x01 / usage 0x05 (gamepad collection)
/// - Bluetooth needs the extended-mode feature report read once before
///   output reports are honoured
/// - Write errors are non-fatal (log and continue)

use crate::controller::{self, ConnectionType, ControllerType, GAMEPAD_USAGE, GAMEPAD_USAGE_PAGE};
use crate::rumble::{self, MotorWriter, Motors, RumblePulser};
use crate::vibrator::Vibrator;
use hidapi::{BusType, HidApi, HidDevice, HidError};
use std::ffi::CString;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Found {
    controller_type: ControllerType,
    connection_type: ConnectionType,
    path: CString,
}

/// First supported controller, USB preferred over Bluetooth.
fn find_controller(api: &HidApi) -> Option<Found> {
    let mut found: Vec<Found> = api
        .device_list()
        .filter(|dev| dev.usage_page() == GAMEPAD_USAGE_PAGE && dev.usage() == GAMEPAD_USAGE)
        .filter_map(|dev| {
            let controller_type = controller::identify(dev.vendor_id(), dev.product_id())?;
            let connection_type = match dev.bus_type() {
                BusType::Bluetooth => ConnectionType::Bluetooth,
                _ => ConnectionType::Usb,
            };
            Some(Found {
                controller_type,
                connection_type,
                path: dev.path().to_owned(),
            })
        })
        .collect();
    found.sort_by_key(|f| f.connection_type == ConnectionType::Bluetooth);
    found.into_iter().next()
}

fn activate_bt_extended_mode(device: &HidDevice, ct: ControllerType) -> Result<(), HidError> {
    let report_id = if ct.is_dualsense() { 0x05 } else { 0x02 };
    let mut buf = [0u8; 64];
    buf[0] = report_id;
    let n = device.get_feature_report(&mut buf)?;
    log::info!("BT extended mode activated (feature report 0x{report_id:02X}, {n} bytes)");
    Ok(())
}

/// Rumbles a Sony controller for each pulse.
pub struct RumbleVibrator {
    device: Arc<Mutex<HidDevice>>,
    controller_type: ControllerType,
    connection_type: ConnectionType,
    pulser: RumblePulser,
}

impl RumbleVibrator {
    /// Open the first connected controller.
    pub fn connect(intensity: u8) -> Result<Self, HidError> {
        let api = HidApi::new()?;
        let found = find_controller(&api).ok_or_else(|| HidError::HidApiError {
            message: "no DualSense or DualShock 4 controller found".into(),
        })?;
        let device = api.open_path(&found.path)?;
        device.set_blocking_mode(false)?;
        log::info!("Connected: {} ({})", found.controller_type, found.connection_type);

        if found.connection_type == ConnectionType::Bluetooth {
            if let Err(e) = activate_bt_extended_mode(&device, found.controller_type) {
                log::warn!("Failed to activate BT extended mode: {e}. Rumble may not work.");
            }
        }

        let device = Arc::new(Mutex::new(device));
        let (ct, conn) = (found.controller_type, found.connection_type);
        let sink = Arc::clone(&device);
        let write: MotorWriter = Arc::new(move |motors: Motors| write_motors(&sink, ct, conn, motors));

        Ok(Self {
            device,
            controller_type: ct,
            connection_type: conn,
            pulser: RumblePulser::new(write, Motors::both(intensity)),
        })
    }
}

fn write_motors(device: &Mutex<HidDevice>, ct: ControllerType, conn: ConnectionType, motors: Motors) {
    let report = rumble::build_report(ct, conn, motors);
    let Ok(dev) = device.lock() else {
        return;
    };
    if let Err(e) = dev.write(&report) {
        log::debug!("HID write error (non-fatal): {e}");
    }
}

impl Vibrator for RumbleVibrator {
    fn vibrate(&self, duration: Duration) {
        self.pulser.vibrate(duration);
    }
}

impl Drop for RumbleVibrator {
    fn drop(&mut self) {
        write_motors(&self.device, self.controller_type, self.connection_type, Motors::OFF);
    }
}
