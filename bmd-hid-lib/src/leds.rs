//! LED state with batched updates.
//!
//! The device keeps no LED state of its own beyond the last request, so every
//! change resends the whole bitfield. [`LedState`] tracks both fields and
//! returns the requests to write. Between [`LedState::begin_batch`] and the
//! matching [`LedState::end_batch`] changes are only recorded; the outermost
//! `end_batch` emits at most one request per field.

use crate::message::OutputRequest;
use crate::types::{JogLed, Led};

/// Either LED field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedTarget {
    System(Led),
    Jog(JogLed),
}

impl From<Led> for LedTarget {
    fn from(leds: Led) -> Self {
        LedTarget::System(leds)
    }
}

impl From<JogLed> for LedTarget {
    fn from(leds: JogLed) -> Self {
        LedTarget::Jog(leds)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LedState {
    system: Led,
    jog: JogLed,
    batch_depth: u32,
    system_dirty: bool,
    jog_dirty: bool,
}

impl LedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(&self) -> Led {
        self.system
    }

    pub fn jog(&self) -> JogLed {
        self.jog
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    /// Whether changes are waiting for the end of a batch.
    pub fn pending(&self) -> bool {
        self.system_dirty || self.jog_dirty
    }

    pub fn is_on(&self, target: impl Into<LedTarget>) -> bool {
        match target.into() {
            LedTarget::System(leds) => self.system.contains(leds),
            LedTarget::Jog(leds) => self.jog.contains(leds),
        }
    }

    pub fn on(&mut self, target: impl Into<LedTarget>) -> Vec<OutputRequest> {
        match target.into() {
            LedTarget::System(leds) => self.set_system(self.system | leds),
            LedTarget::Jog(leds) => self.set_jog(self.jog | leds),
        }
        self.flush()
    }

    pub fn off(&mut self, target: impl Into<LedTarget>) -> Vec<OutputRequest> {
        match target.into() {
            LedTarget::System(leds) => self.set_system(self.system - leds),
            LedTarget::Jog(leds) => self.set_jog(self.jog - leds),
        }
        self.flush()
    }

    /// Replaces one field entirely.
    pub fn set(&mut self, target: impl Into<LedTarget>) -> Vec<OutputRequest> {
        match target.into() {
            LedTarget::System(leds) => self.set_system(leds),
            LedTarget::Jog(leds) => self.set_jog(leds),
        }
        self.flush()
    }

    /// Switches everything off.
    pub fn clear(&mut self) -> Vec<OutputRequest> {
        self.set_system(Led::empty());
        self.set_jog(JogLed::empty());
        self.flush()
    }

    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Closes one batch level. Returns the coalesced requests once the
    /// outermost level closes.
    pub fn end_batch(&mut self) -> Vec<OutputRequest> {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        self.flush()
    }

    fn set_system(&mut self, leds: Led) {
        self.system = leds;
        self.system_dirty = true;
    }

    fn set_jog(&mut self, leds: JogLed) {
        self.jog = leds;
        self.jog_dirty = true;
    }

    fn flush(&mut self) -> Vec<OutputRequest> {
        let mut requests = Vec::new();
        if self.in_batch() {
            return requests;
        }
        if std::mem::take(&mut self.system_dirty) {
            requests.push(OutputRequest::leds(self.system));
        }
        if std::mem::take(&mut self.jog_dirty) {
            requests.push(OutputRequest::jog_leds(self.jog));
        }
        requests
    }
}
