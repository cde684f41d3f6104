//! Field domains of the message catalogue: keys, LEDs, jog modes and
//! handshake steps.

use bitflags::bitflags;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;

/// Steps of the challenge-response handshake, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum HandshakeStep {
    PcChallenge = 0x00,
    DeviceChallenge = 0x01,
    DeviceResponse = 0x02,
    PcResponse = 0x03,
    Result = 0x04,
}

/// How the jog wheel reports its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum JogMode {
    /// Deltas since the previous report
    #[default]
    Relative = 0,
    /// Position relative to where the mode was set, -4096..4096 is about half a turn
    Absolute = 1,
    /// Relative with a small dead zone
    RelativeDeadzone = 2,
    /// Absolute with a small dead zone
    AbsoluteDeadzone = 3,
}

/// Keycodes reported in key events. On the wire `0x0000` marks an empty slot:
/// decoding skips it, and `Key::Unknown(0)` encodes as an empty slot, so it
/// does not survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum Key {
    #[strum(to_string = "SMART INSRT")]
    SmartInsert = 0x01,
    #[strum(to_string = "APPND")]
    Append = 0x02,
    #[strum(to_string = "RIPL O/WR")]
    RippleOverwrite = 0x03,
    #[strum(to_string = "CLOSE UP")]
    CloseUp = 0x04,
    #[strum(to_string = "PLACE ON TOP")]
    PlaceOnTop = 0x05,
    #[strum(to_string = "SRC O/WR")]
    SourceOverwrite = 0x06,

    #[strum(to_string = "IN")]
    In = 0x07,
    #[strum(to_string = "OUT")]
    Out = 0x08,
    #[strum(to_string = "TRIM IN")]
    TrimIn = 0x09,
    #[strum(to_string = "TRIM OUT")]
    TrimOut = 0x0a,
    #[strum(to_string = "ROLL")]
    Roll = 0x0b,
    #[strum(to_string = "SLIP SRC")]
    SlipSource = 0x0c,
    #[strum(to_string = "SLIP DEST")]
    SlipDest = 0x0d,
    #[strum(to_string = "TRANS DUR")]
    TransitionDuration = 0x0e,
    #[strum(to_string = "CUT")]
    Cut = 0x0f,
    #[strum(to_string = "DIS")]
    Dissolve = 0x10,
    #[strum(to_string = "SMTH CUT")]
    SmoothCut = 0x11,

    #[strum(to_string = "SOURCE")]
    Source = 0x1a,
    #[strum(to_string = "TIMELINE")]
    Timeline = 0x1b,

    #[strum(to_string = "SHTL")]
    Shuttle = 0x1c,
    #[strum(to_string = "JOG")]
    Jog = 0x1d,
    #[strum(to_string = "SCRL")]
    Scroll = 0x1e,
    #[strum(to_string = "SYNC BIN")]
    SyncBin = 0x1f,

    #[strum(to_string = "TRANS")]
    Transition = 0x22,
    #[strum(to_string = "VIDEO ONLY")]
    VideoOnly = 0x25,
    #[strum(to_string = "AUDIO ONLY")]
    AudioOnly = 0x26,
    #[strum(to_string = "RIPL DEL")]
    RippleDelete = 0x2b,
    #[strum(to_string = "AUDIO LEVEL")]
    AudioLevel = 0x2c,
    #[strum(to_string = "FULL VIEW")]
    FullView = 0x2d,
    #[strum(to_string = "SNAP")]
    Snap = 0x2e,
    #[strum(to_string = "SPLIT")]
    Split = 0x2f,
    #[strum(to_string = "LIVE O/WR")]
    LiveOverwrite = 0x30,
    #[strum(to_string = "ESC")]
    Escape = 0x31,

    #[strum(to_string = "CAM1")]
    Cam1 = 0x33,
    #[strum(to_string = "CAM2")]
    Cam2 = 0x34,
    #[strum(to_string = "CAM3")]
    Cam3 = 0x35,
    #[strum(to_string = "CAM4")]
    Cam4 = 0x36,
    #[strum(to_string = "CAM5")]
    Cam5 = 0x37,
    #[strum(to_string = "CAM6")]
    Cam6 = 0x38,
    #[strum(to_string = "CAM7")]
    Cam7 = 0x39,
    #[strum(to_string = "CAM8")]
    Cam8 = 0x3a,
    #[strum(to_string = "CAM9")]
    Cam9 = 0x3b,
    #[strum(to_string = "STOP/PLAY")]
    StopPlay = 0x3c,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl Key {
    /// The system LED sitting under this key, if it has one.
    pub fn led(&self) -> Option<Led> {
        let led = match self {
            Key::CloseUp => Led::CLOSE_UP,
            Key::Cut => Led::CUT,
            Key::Dissolve => Led::DIS,
            Key::SmoothCut => Led::SMTH_CUT,
            Key::Transition => Led::TRANS,
            Key::Snap => Led::SNAP,
            Key::Cam1 => Led::CAM1,
            Key::Cam2 => Led::CAM2,
            Key::Cam3 => Led::CAM3,
            Key::Cam4 => Led::CAM4,
            Key::Cam5 => Led::CAM5,
            Key::Cam6 => Led::CAM6,
            Key::Cam7 => Led::CAM7,
            Key::Cam8 => Led::CAM8,
            Key::Cam9 => Led::CAM9,
            Key::LiveOverwrite => Led::LIVE_OWR,
            Key::VideoOnly => Led::VIDEO_ONLY,
            Key::AudioOnly => Led::AUDIO_ONLY,
            _ => return None,
        };
        Some(led)
    }

    /// The jog-section LED for the three jog mode keys.
    pub fn jog_led(&self) -> Option<JogLed> {
        match self {
            Key::Shuttle => Some(JogLed::SHTL),
            Key::Jog => Some(JogLed::JOG),
            Key::Scroll => Some(JogLed::SCRL),
            _ => None,
        }
    }
}

bitflags! {
    /// System LEDs, sent as a little-endian u32 bitfield in output report 2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Led: u32 {
        const CLOSE_UP = 1 << 0;
        const CUT = 1 << 1;
        const DIS = 1 << 2;
        const SMTH_CUT = 1 << 3;
        const TRANS = 1 << 4;
        const SNAP = 1 << 5;
        const CAM7 = 1 << 6;
        const CAM8 = 1 << 7;
        const CAM9 = 1 << 8;
        const LIVE_OWR = 1 << 9;
        const CAM4 = 1 << 10;
        const CAM5 = 1 << 11;
        const CAM6 = 1 << 12;
        const VIDEO_ONLY = 1 << 13;
        const CAM1 = 1 << 14;
        const CAM2 = 1 << 15;
        const CAM3 = 1 << 16;
        const AUDIO_ONLY = 1 << 17;
    }
}

bitflags! {
    /// The jog mode LEDs live on a separate 8 bit field in output report 4.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JogLed: u8 {
        const JOG = 1 << 0;
        const SHTL = 1 << 1;
        const SCRL = 1 << 2;
    }
}
