//! Host authentication handshake.
//!
//! # Authentication Flow
//!
//! The handshake runs over feature report 6. Each poll reads the report back,
//! each answer writes it:
//!
//! 1. Host sends `PcChallenge` carrying its own challenge (zero is fine)
//! 2. Device answers `PcChallenge` with its challenge; host sends `DeviceChallenge`
//! 3. Device sends `DeviceResponse`; host sends `PcResponse` with [`solve`] of the
//!    device challenge
//! 4. Device sends `Result`: 0 means rejected, anything else is the number of
//!    seconds the session stays trusted
//!
//! Steps arriving out of this order are dropped without an answer.

use crate::constants::FEATURE_POLL_INTERVAL;
use crate::crypto::solve;
use crate::error::BmdError;
use crate::message::{AuthMessage, FeatureMessage};
use crate::types::HandshakeStep;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

/// Request/response access to the feature report channel.
pub trait FeatureChannel {
    /// Reads the current feature report. `Ok(None)` when it held nothing usable.
    fn poll_feature(&mut self) -> impl Future<Output = Result<Option<FeatureMessage>, BmdError>> + Send;

    fn send_feature(&mut self, message: FeatureMessage) -> impl Future<Output = Result<(), BmdError>> + Send;
}

/// Where the handshake currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No handshake in progress
    Idle,
    /// Sent our challenge, waiting for the device's
    AwaitingChallenge,
    /// Sent `DeviceChallenge`, waiting for `DeviceResponse`
    AwaitingDeviceResponse,
    /// Sent our response, waiting for the verdict
    AwaitingResult,
}

/// What to do after feeding a message to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Send this message back to the device
    Reply(AuthMessage),
    /// The device delivered its verdict
    Complete(u64),
    /// Not the expected step, nothing to do
    Ignore,
}

#[derive(Debug)]
pub struct Authenticator {
    our_challenge: u64,
    their_challenge: u64,
    state: HandshakeState,
}

impl Authenticator {
    pub fn new(our_challenge: u64) -> Self {
        Self {
            our_challenge,
            their_challenge: 0,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn their_challenge(&self) -> u64 {
        self.their_challenge
    }

    /// Starts a new round and returns the opening message.
    pub fn begin(&mut self) -> AuthMessage {
        self.their_challenge = 0;
        self.state = HandshakeState::AwaitingChallenge;
        AuthMessage::new(HandshakeStep::PcChallenge, self.our_challenge)
    }

    /// Advances the handshake with one message read from the device.
    pub fn handle(&mut self, message: &FeatureMessage) -> HandshakeAction {
        let FeatureMessage::Auth(auth) = message else {
            return HandshakeAction::Ignore;
        };

        match (self.state, auth.step) {
            (HandshakeState::AwaitingChallenge, HandshakeStep::PcChallenge) => {
                debug!("Device challenge {:#018x}", auth.data);
                self.their_challenge = auth.data;
                self.state = HandshakeState::AwaitingDeviceResponse;
                HandshakeAction::Reply(AuthMessage::new(HandshakeStep::DeviceChallenge, self.our_challenge))
            }
            (HandshakeState::AwaitingDeviceResponse, HandshakeStep::DeviceResponse) => {
                self.state = HandshakeState::AwaitingResult;
                HandshakeAction::Reply(AuthMessage::new(
                    HandshakeStep::PcResponse,
                    solve(self.their_challenge),
                ))
            }
            (HandshakeState::AwaitingResult, HandshakeStep::Result) => {
                self.state = HandshakeState::Idle;
                HandshakeAction::Complete(auth.data)
            }
            _ => HandshakeAction::Ignore,
        }
    }

    /// Runs a full handshake and returns the granted validity in seconds.
    pub async fn authenticate<C: FeatureChannel>(&mut self, channel: &mut C, timeout: Duration) -> Result<u64, BmdError> {
        let deadline = Instant::now() + timeout;
        let opening = self.begin();
        channel.send_feature(FeatureMessage::Auth(opening)).await?;

        let result = loop {
            let polled = match timeout_at(deadline, channel.poll_feature()).await {
                Ok(polled) => polled?,
                Err(_) => break None,
            };
            match polled.map(|message| self.handle(&message)) {
                Some(HandshakeAction::Reply(reply)) => {
                    debug!("Handshake step {}", reply.step);
                    channel.send_feature(FeatureMessage::Auth(reply)).await?;
                }
                Some(HandshakeAction::Complete(code)) => break Some(code),
                Some(HandshakeAction::Ignore) | None => {
                    if Instant::now() >= deadline {
                        break None;
                    }
                    sleep(FEATURE_POLL_INTERVAL).await;
                }
            }
        };

        match result {
            None => {
                self.state = HandshakeState::Idle;
                warn!("Timed out waiting for device auth");
                Err(BmdError::AuthenticationTimeout)
            }
            Some(0) => {
                warn!("Could not authenticate with device");
                Err(BmdError::AuthenticationRejected)
            }
            Some(validity) => {
                info!("Authenticated, session valid for {}s", validity);
                Ok(validity)
            }
        }
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Plays back a fixed sequence of feature reports and records what was sent.
    #[derive(Default)]
    struct ScriptedChannel {
        incoming: VecDeque<FeatureMessage>,
        sent: Vec<AuthMessage>,
    }

    impl ScriptedChannel {
        fn new(script: &[(HandshakeStep, u64)]) -> Self {
            Self {
                incoming: script
                    .iter()
                    .map(|&(step, data)| FeatureMessage::Auth(AuthMessage::new(step, data)))
                    .collect(),
                sent: Vec::new(),
            }
        }
    }

    impl FeatureChannel for ScriptedChannel {
        async fn poll_feature(&mut self) -> Result<Option<FeatureMessage>, BmdError> {
            Ok(self.incoming.pop_front())
        }

        async fn send_feature(&mut self, message: FeatureMessage) -> Result<(), BmdError> {
            match message {
                FeatureMessage::Auth(auth) => self.sent.push(auth),
                other => panic!("unexpected feature message {other:?}"),
            }
            Ok(())
        }
    }

    const DEVICE_CHALLENGE: u64 = 0x0123456789abcdef;

    #[tokio::test]
    async fn test_authenticate_success() {
        let mut channel = ScriptedChannel::new(&[
            (HandshakeStep::PcChallenge, DEVICE_CHALLENGE),
            (HandshakeStep::DeviceResponse, 0),
            (HandshakeStep::Result, 30),
        ]);
        let mut auth = Authenticator::default();

        let validity = auth.authenticate(&mut channel, Duration::from_secs(1)).await.unwrap();

        assert_eq!(validity, 30);
        assert_eq!(
            channel.sent,
            vec![
                AuthMessage::new(HandshakeStep::PcChallenge, 0),
                AuthMessage::new(HandshakeStep::DeviceChallenge, 0),
                AuthMessage::new(HandshakeStep::PcResponse, solve(DEVICE_CHALLENGE)),
            ]
        );
        assert_eq!(auth.their_challenge(), DEVICE_CHALLENGE);
        assert_eq!(auth.state(), HandshakeState::Idle);
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let mut channel = ScriptedChannel::new(&[
            (HandshakeStep::PcChallenge, DEVICE_CHALLENGE),
            (HandshakeStep::DeviceResponse, 0),
            (HandshakeStep::Result, 0),
        ]);
        let mut auth = Authenticator::default();

        let result = auth.authenticate(&mut channel, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(BmdError::AuthenticationRejected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_times_out_without_result() {
        let mut channel = ScriptedChannel::new(&[(HandshakeStep::PcChallenge, DEVICE_CHALLENGE)]);
        let mut auth = Authenticator::default();

        let started = Instant::now();
        let result = auth.authenticate(&mut channel, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(BmdError::AuthenticationTimeout)));
        assert!(started.elapsed() >= Duration::from_millis(50));
        // Only the opening message and the answer to the device challenge went out.
        assert_eq!(channel.sent.len(), 2);
    }

    #[tokio::test]
    async fn test_our_challenge_is_sent() {
        let mut channel = ScriptedChannel::new(&[
            (HandshakeStep::PcChallenge, 7),
            (HandshakeStep::DeviceResponse, 0),
            (HandshakeStep::Result, 60),
        ]);
        let mut auth = Authenticator::new(0xfeed);

        auth.authenticate(&mut channel, Duration::from_secs(1)).await.unwrap();
        assert_eq!(channel.sent[0], AuthMessage::new(HandshakeStep::PcChallenge, 0xfeed));
        assert_eq!(channel.sent[1], AuthMessage::new(HandshakeStep::DeviceChallenge, 0xfeed));
    }

    #[test]
    fn test_result_before_challenge_is_ignored() {
        let mut auth = Authenticator::default();
        auth.begin();

        let early = FeatureMessage::Auth(AuthMessage::new(HandshakeStep::Result, 30));
        assert_eq!(auth.handle(&early), HandshakeAction::Ignore);
        assert_eq!(auth.state(), HandshakeState::AwaitingChallenge);
        assert_eq!(auth.their_challenge(), 0);
    }

    #[test]
    fn test_duplicate_challenge_is_ignored() {
        let mut auth = Authenticator::default();
        auth.begin();

        let challenge = FeatureMessage::Auth(AuthMessage::new(HandshakeStep::PcChallenge, 5));
        assert!(matches!(auth.handle(&challenge), HandshakeAction::Reply(_)));

        let again = FeatureMessage::Auth(AuthMessage::new(HandshakeStep::PcChallenge, 9));
        assert_eq!(auth.handle(&again), HandshakeAction::Ignore);
        assert_eq!(auth.their_challenge(), 5);
        assert_eq!(auth.state(), HandshakeState::AwaitingDeviceResponse);
    }

    #[test]
    fn test_messages_ignored_when_idle() {
        let mut auth = Authenticator::default();
        let serial = FeatureMessage::Serial(crate::message::SerialMessage::new("ABC"));
        let challenge = FeatureMessage::Auth(AuthMessage::new(HandshakeStep::PcChallenge, 1));

        assert_eq!(auth.handle(&serial), HandshakeAction::Ignore);
        assert_eq!(auth.handle(&challenge), HandshakeAction::Ignore);
        assert_eq!(auth.state(), HandshakeState::Idle);
    }
}
