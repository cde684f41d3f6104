//! Event dispatch on top of a [`DeviceSession`].

use crate::device::DeviceSession;
use crate::error::BmdError;
use crate::input::{KeyEdge, KeyTracker};
use crate::leds::LedState;
use crate::message::{InputEvent, OutputRequest};
use crate::transport::HidTransport;
use crate::types::{JogMode, Key};
use std::time::Duration;
use tracing::debug;

/// Callbacks for a [`ControlSurface`].
///
/// LED changes made through `leds` inside a callback are batched and sent
/// once the current event has been dispatched.
pub trait SurfaceHandler {
    fn on_jog(&mut self, leds: &mut LedState, mode: JogMode, value: i32) {
        let _ = (leds, mode, value);
    }

    fn on_key_down(&mut self, leds: &mut LedState, key: Key) {
        let _ = (leds, key);
    }

    fn on_key_up(&mut self, leds: &mut LedState, key: Key) {
        let _ = (leds, key);
    }

    fn on_battery(&mut self, leds: &mut LedState, charging: bool, level: u8) {
        let _ = (leds, charging, level);
    }
}

/// A session plus key tracking, LED state and a handler.
pub struct ControlSurface<T: HidTransport, H> {
    session: DeviceSession<T>,
    handler: H,
    keys: KeyTracker,
    leds: LedState,
}

impl<T: HidTransport, H: SurfaceHandler> ControlSurface<T, H> {
    pub fn new(session: DeviceSession<T>, handler: H) -> Self {
        Self {
            session,
            handler,
            keys: KeyTracker::new(),
            leds: LedState::new(),
        }
    }

    pub fn session(&self) -> &DeviceSession<T> {
        &self.session
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn held_keys(&self) -> &[Key] {
        self.keys.held()
    }

    pub fn leds(&self) -> &LedState {
        &self.leds
    }

    /// Polls the session once and dispatches whatever arrived. Returns the
    /// event that was handled, if any.
    pub async fn poll(&mut self, timeout: Option<Duration>) -> Result<Option<InputEvent>, BmdError> {
        let Some(event) = self.session.poll(timeout).await? else {
            return Ok(None);
        };

        self.leds.begin_batch();
        self.dispatch(&event);
        let requests = self.leds.end_batch();
        self.send_all(requests).await?;

        Ok(Some(event))
    }

    fn dispatch(&mut self, event: &InputEvent) {
        match event {
            InputEvent::Jog(jog) => self.handler.on_jog(&mut self.leds, jog.mode, jog.value),
            InputEvent::Key(keys) => {
                for edge in self.keys.update(&keys.keys) {
                    debug!("Key {:?}", edge);
                    match edge {
                        KeyEdge::Down(key) => self.handler.on_key_down(&mut self.leds, key),
                        KeyEdge::Up(key) => self.handler.on_key_up(&mut self.leds, key),
                    }
                }
            }
            InputEvent::Battery(battery) => self.handler.on_battery(&mut self.leds, battery.charging, battery.level),
        }
    }

    pub async fn set_jog_mode(&self, mode: JogMode) -> Result<(), BmdError> {
        self.session.send(&OutputRequest::jog_mode(mode)).await
    }

    /// Applies several LED changes and sends them as one update per field.
    pub async fn update_leds(&mut self, update: impl FnOnce(&mut LedState)) -> Result<(), BmdError> {
        self.leds.begin_batch();
        update(&mut self.leds);
        let requests = self.leds.end_batch();
        self.send_all(requests).await
    }

    async fn send_all(&self, requests: Vec<OutputRequest>) -> Result<(), BmdError> {
        for request in requests {
            self.session.send(&request).await?;
        }
        Ok(())
    }

    /// Switches the LEDs off if the session is still live, then closes it.
    pub async fn close(&mut self) {
        if !self.session.is_closed() {
            let requests = self.leds.clear();
            if let Err(e) = self.send_all(requests).await {
                debug!("Could not clear LEDs on close: {}", e);
            }
        }
        self.session.close().await;
    }
}
