/// Controller identification for the rumble backend.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerType {
    DualSense,
    DualSenseEdge,
    Ds4V1,
    Ds4V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Bluetooth,
}

const SONY_VID: u16 = 0x054C;

/// HID usage page / usage of the gamepad collection.
pub const GAMEPAD_USAGE_PAGE: u16 = 0x01;
pub const GAMEPAD_USAGE: u16 = 0x05;

/// Identify a supported controller from VID/PID.
pub fn identify(vid: u16, pid: u16) -> Option<ControllerType> {
    if vid != SONY_VID {
        return None;
    }
    match pid {
        0x0CE6 => Some(ControllerType::DualSense),
        0x0DF2 => Some(ControllerType::DualSenseEdge),
        0x05C4 => Some(ControllerType::Ds4V1),
        0x09CC => Some(ControllerType::Ds4V2),
        _ => None,
    }
}

impl ControllerType {
    pub fn is_dualsense(self) -> bool {
        matches!(self, ControllerType::DualSense | ControllerType::DualSenseEdge)
    }
}

impl std::fmt::Display for ControllerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ControllerType::DualSense => "DualSense",
            ControllerType::DualSenseEdge => "DualSense Edge",
            ControllerType::Ds4V1 => "DualShock 4 v1",
            ControllerType::Ds4V2 => "DualShock 4 v2",
        })
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Usb => f.write_str("USB"),
            ConnectionType::Bluetooth => f.write_str("Bluetooth"),
        }
    }
}
