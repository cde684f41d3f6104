//! The message catalogue.
//!
//! Every report starts with a one byte discriminator followed by a fixed
//! little-endian layout. The three report channels each have their own
//! catalogue and share the id space only within a channel:
//!
//! | Channel | Message | Id | Layout after the id |
//! |---|---|---|---|
//! | input | [`JogEvent`] | 3 | mode:u8, value:i32, trailer:u8 |
//! | input | [`KeyEvent`] | 4 | 6 × keycode:u16 |
//! | input | [`BatteryEvent`] | 7 | charging:u8, level:u8 |
//! | feature | [`AuthMessage`] | 6 | step:u8, data:u64 |
//! | feature | [`SerialMessage`] | 8 | serial:\[u8; 32\] |
//! | output | [`SetLedRequest`] | 2 | leds:u32 |
//! | output | [`SetJogModeRequest`] | 3 | mode:u8, value:i32, trailer:u8 |
//! | output | [`SetJogLedRequest`] | 4 | leds:u8 |

use crate::codec::Catalogue;
use crate::constants::{JOG_TRAILER, KEY_SLOTS, SERIAL_LEN};
use crate::error::DecodeError;
use crate::types::{HandshakeStep, JogLed, JogMode, Key, Led};
use bytes::{BufMut, BytesMut};
use zerocopy::byteorder::little_endian::{I32, U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

// --- Wire layouts (everything after the discriminator) ---

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct JogRaw {
    mode: u8,
    value: I32,
    trailer: u8,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct KeysRaw {
    keys: [U16; KEY_SLOTS],
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct BatteryRaw {
    charging: u8,
    level: u8,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct AuthRaw {
    step: u8,
    data: U64,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct SerialRaw {
    serial: [u8; SERIAL_LEN],
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct LedRaw {
    leds: U32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct JogLedRaw {
    leds: u8,
}

/// Reads a fixed layout from the front of `body`, trailing bytes are ignored.
fn read_layout<L: FromBytes>(id: u8, body: &[u8]) -> Result<L, DecodeError> {
    L::read_from_prefix(body).map(|(layout, _)| layout).map_err(|_| DecodeError::Truncated {
        id,
        expected: 1 + size_of::<L>(),
        actual: 1 + body.len(),
    })
}

fn jog_mode(id: u8, raw: u8) -> Result<JogMode, DecodeError> {
    JogMode::try_from(raw).map_err(|_| DecodeError::InvalidField {
        id,
        field: "jog mode",
        value: raw.into(),
    })
}

// --- Input reports ---

/// Jog wheel movement, interpreted according to `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JogEvent {
    pub mode: JogMode,
    pub value: i32,
}

impl JogEvent {
    pub const ID: u8 = 3;
}

/// The set of keys currently held down, in report order. Sent every time the
/// set changes; there is no auto-repeat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyEvent {
    pub keys: Vec<Key>,
}

impl KeyEvent {
    pub const ID: u8 = 4;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryEvent {
    pub charging: bool,
    pub level: u8,
}

impl BatteryEvent {
    pub const ID: u8 = 7;
}

/// Messages arriving on the input report channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Jog(JogEvent),
    Key(KeyEvent),
    Battery(BatteryEvent),
}

impl Catalogue for InputEvent {
    const CHANNEL: &'static str = "input";

    fn id(&self) -> u8 {
        match self {
            InputEvent::Jog(_) => JogEvent::ID,
            InputEvent::Key(_) => KeyEvent::ID,
            InputEvent::Battery(_) => BatteryEvent::ID,
        }
    }

    fn decode_body(id: u8, body: &[u8]) -> Result<Option<Self>, DecodeError> {
        let event = match id {
            JogEvent::ID => {
                let raw: JogRaw = read_layout(id, body)?;
                InputEvent::Jog(JogEvent {
                    mode: jog_mode(id, raw.mode)?,
                    value: raw.value.get(),
                })
            }
            KeyEvent::ID => {
                let raw: KeysRaw = read_layout(id, body)?;
                let keys = raw
                    .keys
                    .iter()
                    .map(|code| code.get())
                    .filter(|&code| code != 0)
                    .map(Key::from)
                    .collect();
                InputEvent::Key(KeyEvent { keys })
            }
            BatteryEvent::ID => {
                let raw: BatteryRaw = read_layout(id, body)?;
                InputEvent::Battery(BatteryEvent {
                    charging: raw.charging != 0,
                    level: raw.level,
                })
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    fn encode_body(&self, out: &mut BytesMut) {
        match self {
            InputEvent::Jog(event) => {
                let raw = JogRaw {
                    mode: event.mode.into(),
                    value: I32::new(event.value),
                    trailer: JOG_TRAILER,
                };
                out.put_slice(raw.as_bytes());
            }
            InputEvent::Key(event) => {
                let mut raw = KeysRaw {
                    keys: [U16::new(0); KEY_SLOTS],
                };
                for (slot, key) in raw.keys.iter_mut().zip(&event.keys) {
                    *slot = U16::new((*key).into());
                }
                out.put_slice(raw.as_bytes());
            }
            InputEvent::Battery(event) => {
                let raw = BatteryRaw {
                    charging: event.charging.into(),
                    level: event.level,
                };
                out.put_slice(raw.as_bytes());
            }
        }
    }
}

// --- Feature reports ---

/// One step of the authentication handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthMessage {
    pub step: HandshakeStep,
    pub data: u64,
}

impl AuthMessage {
    pub const ID: u8 = 6;

    pub fn new(step: HandshakeStep, data: u64) -> Self {
        Self { step, data }
    }
}

/// Serial number as reported by the protocol (32 ASCII bytes, null padded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialMessage {
    pub serial: String,
}

impl SerialMessage {
    pub const ID: u8 = 8;

    pub fn new(serial: impl Into<String>) -> Self {
        Self { serial: serial.into() }
    }
}

/// Messages exchanged over feature reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureMessage {
    Auth(AuthMessage),
    Serial(SerialMessage),
}

impl Catalogue for FeatureMessage {
    const CHANNEL: &'static str = "feature";

    fn id(&self) -> u8 {
        match self {
            FeatureMessage::Auth(_) => AuthMessage::ID,
            FeatureMessage::Serial(_) => SerialMessage::ID,
        }
    }

    fn decode_body(id: u8, body: &[u8]) -> Result<Option<Self>, DecodeError> {
        let message = match id {
            AuthMessage::ID => {
                let raw: AuthRaw = read_layout(id, body)?;
                let step = HandshakeStep::try_from(raw.step).map_err(|_| DecodeError::InvalidField {
                    id,
                    field: "handshake step",
                    value: raw.step.into(),
                })?;
                FeatureMessage::Auth(AuthMessage::new(step, raw.data.get()))
            }
            SerialMessage::ID => {
                let raw: SerialRaw = read_layout(id, body)?;
                let len = raw.serial.iter().position(|&b| b == 0).unwrap_or(SERIAL_LEN);
                let text = &raw.serial[..len];
                if !text.is_ascii() {
                    return Err(DecodeError::InvalidText { id, field: "serial" });
                }
                FeatureMessage::Serial(SerialMessage::new(String::from_utf8_lossy(text)))
            }
            _ => return Ok(None),
        };
        Ok(Some(message))
    }

    fn encode_body(&self, out: &mut BytesMut) {
        match self {
            FeatureMessage::Auth(message) => {
                let raw = AuthRaw {
                    step: message.step.into(),
                    data: U64::new(message.data),
                };
                out.put_slice(raw.as_bytes());
            }
            FeatureMessage::Serial(message) => {
                // Longer serials are truncated to the field width.
                let mut raw = SerialRaw { serial: [0; SERIAL_LEN] };
                let text = message.serial.as_bytes();
                let len = text.len().min(SERIAL_LEN);
                raw.serial[..len].copy_from_slice(&text[..len]);
                out.put_slice(raw.as_bytes());
            }
        }
    }
}

// --- Output reports ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLedRequest {
    pub leds: Led,
}

impl SetLedRequest {
    pub const ID: u8 = 2;
}

/// Switches the jog wheel reporting mode. `value` seeds the position for the
/// absolute modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetJogModeRequest {
    pub mode: JogMode,
    pub value: i32,
}

impl SetJogModeRequest {
    pub const ID: u8 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetJogLedRequest {
    pub leds: JogLed,
}

impl SetJogLedRequest {
    pub const ID: u8 = 4;
}

/// Requests written to the output report channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRequest {
    SetLed(SetLedRequest),
    SetJogMode(SetJogModeRequest),
    SetJogLed(SetJogLedRequest),
}

impl OutputRequest {
    pub fn leds(leds: Led) -> Self {
        OutputRequest::SetLed(SetLedRequest { leds })
    }

    pub fn jog_leds(leds: JogLed) -> Self {
        OutputRequest::SetJogLed(SetJogLedRequest { leds })
    }

    pub fn jog_mode(mode: JogMode) -> Self {
        OutputRequest::SetJogMode(SetJogModeRequest { mode, value: 0 })
    }
}

impl Catalogue for OutputRequest {
    const CHANNEL: &'static str = "output";

    fn id(&self) -> u8 {
        match self {
            OutputRequest::SetLed(_) => SetLedRequest::ID,
            OutputRequest::SetJogMode(_) => SetJogModeRequest::ID,
            OutputRequest::SetJogLed(_) => SetJogLedRequest::ID,
        }
    }

    fn decode_body(id: u8, body: &[u8]) -> Result<Option<Self>, DecodeError> {
        let request = match id {
            SetLedRequest::ID => {
                let raw: LedRaw = read_layout(id, body)?;
                OutputRequest::leds(Led::from_bits_retain(raw.leds.get()))
            }
            SetJogModeRequest::ID => {
                let raw: JogRaw = read_layout(id, body)?;
                OutputRequest::SetJogMode(SetJogModeRequest {
                    mode: jog_mode(id, raw.mode)?,
                    value: raw.value.get(),
                })
            }
            SetJogLedRequest::ID => {
                let raw: JogLedRaw = read_layout(id, body)?;
                OutputRequest::jog_leds(JogLed::from_bits_retain(raw.leds))
            }
            _ => return Ok(None),
        };
        Ok(Some(request))
    }

    fn encode_body(&self, out: &mut BytesMut) {
        match self {
            OutputRequest::SetLed(request) => {
                let raw = LedRaw {
                    leds: U32::new(request.leds.bits()),
                };
                out.put_slice(raw.as_bytes());
            }
            OutputRequest::SetJogMode(request) => {
                let raw = JogRaw {
                    mode: request.mode.into(),
                    value: I32::new(request.value),
                    trailer: JOG_TRAILER,
                };
                out.put_slice(raw.as_bytes());
            }
            OutputRequest::SetJogLed(request) => {
                let raw = JogLedRaw {
                    leds: request.leds.bits(),
                };
                out.put_slice(raw.as_bytes());
            }
        }
    }
}
