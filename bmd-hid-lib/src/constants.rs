// Protocol constants for the Blackmagic HID control surfaces

use std::time::Duration;

/// Blackmagic Design USB vendor id
pub const VENDOR_ID: u16 = 0x1edb;

/// DaVinci Resolve Speed Editor product id
pub const SPEED_EDITOR_PID: u16 = 0xda0e;

/// DaVinci Resolve Editor Keyboard product id
pub const EDITOR_KEYBOARD_PID: u16 = 0xda0b;

/// HID interface number on the device
pub const HID_INTERFACE: u8 = 0;

/// Interrupt IN endpoint carrying input reports
pub const INPUT_ENDPOINT: u8 = 0x81;

/// Feature report id used for the authentication handshake
pub const AUTH_REPORT_ID: u8 = 6;

/// Length of the authentication feature report (id + step + u64)
pub const AUTH_REPORT_LEN: usize = 10;

/// Feature report id carrying the device serial number
pub const SERIAL_REPORT_ID: u8 = 8;

/// Length of the serial feature report (id + 32 bytes)
pub const SERIAL_REPORT_LEN: usize = 33;

/// Size of the serial number field, null padded
pub const SERIAL_LEN: usize = 32;

/// Number of keycode slots in a key event
pub const KEY_SLOTS: usize = 6;

/// Trailer byte written after the jog value in jog mode requests
pub const JOG_TRAILER: u8 = 0xff;

/// Largest input report read in a single transfer
pub const MAX_REPORT_LEN: usize = 64;

/// Handshake deadline used at open and on every re-authentication
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_millis(2000);

/// Re-authenticate this long before the granted validity runs out
pub const DEFAULT_REAUTH_MARGIN: Duration = Duration::from_secs(10);

/// Never re-authenticate more often than this
pub const DEFAULT_MIN_REAUTH_INTERVAL: Duration = Duration::from_secs(1);

/// Longest single input read performed while holding the transport lock
pub const DEFAULT_READ_SLICE: Duration = Duration::from_millis(50);

/// Pause between feature polls that produced nothing useful
pub const FEATURE_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Timeout for control transfers carrying feature and output reports
pub const CONTROL_TIMEOUT: Duration = Duration::from_millis(500);
