use nusb::transfer::TransferError;
use thiserror::Error;

/// The primary error type for the `bmd-hid` library.
#[derive(Error, Debug)]
pub enum BmdError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Timed out waiting for device authentication")]
    AuthenticationTimeout,

    #[error("Device rejected authentication")]
    AuthenticationRejected,

    #[error("Serial mismatch: descriptor reports {descriptor:?}, device reports {reported:?}")]
    SerialMismatch { descriptor: String, reported: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Device session is closed")]
    Closed,
}

/// A report with a known discriminator that could not be parsed.
///
/// Unknown discriminators are not errors; the codec reports them as "no message".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Report 0x{id:02x} too short: expected {expected} bytes, got {actual}")]
    Truncated { id: u8, expected: usize, actual: usize },

    #[error("Report 0x{id:02x} has invalid {field}: {value:#x}")]
    InvalidField { id: u8, field: &'static str, value: u64 },

    #[error("Report 0x{id:02x} has non-ASCII {field}")]
    InvalidText { id: u8, field: &'static str },
}

/// Failures of the raw HID transport underneath a session.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("USB device not found. Is the control surface connected?")]
    NotFound,

    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Device disconnected")]
    Disconnected,
}
