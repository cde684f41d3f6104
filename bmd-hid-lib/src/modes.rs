//! Mutually exclusive key groups with an LED per member.

use crate::types::{JogLed, JogMode, Key, Led};
use strum_macros::Display;

/// The three jog wheel buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum JogSelector {
    Shuttle,
    Jog,
    Scroll,
}

impl JogSelector {
    /// LEDs of the whole group.
    pub fn leds() -> JogLed {
        JogLed::SHTL | JogLed::JOG | JogLed::SCRL
    }

    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::Shuttle => Some(JogSelector::Shuttle),
            Key::Jog => Some(JogSelector::Jog),
            Key::Scroll => Some(JogSelector::Scroll),
            _ => None,
        }
    }

    /// Wheel reporting mode used while this selector is active. Shuttle reads
    /// the wheel position, the others want deltas.
    pub fn mode(&self) -> JogMode {
        match self {
            JogSelector::Shuttle => JogMode::Absolute,
            JogSelector::Jog | JogSelector::Scroll => JogMode::Relative,
        }
    }

    pub fn led(&self) -> JogLed {
        match self {
            JogSelector::Shuttle => JogLed::SHTL,
            JogSelector::Jog => JogLed::JOG,
            JogSelector::Scroll => JogLed::SCRL,
        }
    }
}

/// The transition keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CutMode {
    Cut,
    Dissolve,
    SmoothCut,
}

impl CutMode {
    pub fn leds() -> Led {
        Led::CUT | Led::DIS | Led::SMTH_CUT
    }

    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::Cut => Some(CutMode::Cut),
            Key::Dissolve => Some(CutMode::Dissolve),
            Key::SmoothCut => Some(CutMode::SmoothCut),
            _ => None,
        }
    }

    pub fn led(&self) -> Led {
        match self {
            CutMode::Cut => Led::CUT,
            CutMode::Dissolve => Led::DIS,
            CutMode::SmoothCut => Led::SMTH_CUT,
        }
    }
}
