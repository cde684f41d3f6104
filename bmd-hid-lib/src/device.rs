use crate::auth::{Authenticator, FeatureChannel};
use crate::codec::MessageCodec;
use crate::constants::{
    AUTH_REPORT_ID, AUTH_REPORT_LEN, DEFAULT_AUTH_TIMEOUT, DEFAULT_MIN_REAUTH_INTERVAL, DEFAULT_READ_SLICE,
    DEFAULT_REAUTH_MARGIN, MAX_REPORT_LEN, SERIAL_REPORT_ID, SERIAL_REPORT_LEN,
};
use crate::error::BmdError;
use crate::message::{FeatureMessage, InputEvent, OutputRequest};
use crate::task::PeriodicTask;
use crate::transport::{DeviceIdentity, HidTransport, OpenTransport};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const INPUT_CODEC: MessageCodec<InputEvent> = MessageCodec::new();
const FEATURE_CODEC: MessageCodec<FeatureMessage> = MessageCodec::new();
const OUTPUT_CODEC: MessageCodec<OutputRequest> = MessageCodec::new();

/// Called once when a session closes, whatever the reason. A session dropped
/// without [`DeviceSession::close`] fires it once its re-authentication task
/// has exited.
pub type CloseHook = Box<dyn FnOnce() + Send + 'static>;

/// Tunables for a [`DeviceSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for each handshake
    pub auth_timeout: Duration,
    /// Re-authenticate this long before the granted validity expires
    pub reauth_margin: Duration,
    /// Lower bound for the re-authentication delay
    pub min_reauth_interval: Duration,
    /// Longest single read performed while `poll` holds the handle
    pub read_slice: Duration,
    /// Read size for input reports
    pub max_report_len: usize,
    /// Compare the descriptor serial with the one reported over feature report 8
    pub check_serial: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            reauth_margin: DEFAULT_REAUTH_MARGIN,
            min_reauth_interval: DEFAULT_MIN_REAUTH_INTERVAL,
            read_slice: DEFAULT_READ_SLICE,
            max_report_len: MAX_REPORT_LEN,
            check_serial: true,
        }
    }
}

impl SessionConfig {
    /// Delay before re-authenticating a session granted `validity` seconds.
    pub fn reauth_delay(&self, validity: u64) -> Duration {
        Duration::from_secs(validity)
            .saturating_sub(self.reauth_margin)
            .max(self.min_reauth_interval)
    }
}

/// Feature channel over a transport the caller already holds exclusively.
struct FeatureLink<'a, T> {
    transport: &'a mut T,
}

impl<T: HidTransport> FeatureChannel for FeatureLink<'_, T> {
    async fn poll_feature(&mut self) -> Result<Option<FeatureMessage>, BmdError> {
        let data = self.transport.get_feature_report(AUTH_REPORT_ID, AUTH_REPORT_LEN).await?;
        match FEATURE_CODEC.decode(&data) {
            Ok(message) => Ok(message),
            Err(e) => {
                warn!("Dropping feature report: {}", e);
                Ok(None)
            }
        }
    }

    async fn send_feature(&mut self, message: FeatureMessage) -> Result<(), BmdError> {
        let report = FEATURE_CODEC.encode(&message);
        self.transport.send_feature_report(&report).await?;
        Ok(())
    }
}

/// State reachable from both the caller and the re-authentication task.
struct Shared<T> {
    transport: Mutex<Option<T>>,
    auth: Mutex<Authenticator>,
    closed: AtomicBool,
    validity: AtomicU64,
    on_close: StdMutex<Option<CloseHook>>,
}

impl<T: HidTransport> Shared<T> {
    fn new(transport: T, our_challenge: u64, on_close: Option<CloseHook>) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            auth: Mutex::new(Authenticator::new(our_challenge)),
            closed: AtomicBool::new(false),
            validity: AtomicU64::new(0),
            on_close: StdMutex::new(on_close),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Runs one handshake with the handle held for its whole duration.
    async fn authenticate(&self, timeout: Duration) -> Result<u64, BmdError> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(BmdError::Closed)?;
        let mut auth = self.auth.lock().await;
        let validity = auth.authenticate(&mut FeatureLink { transport }, timeout).await?;
        self.validity.store(validity, Ordering::SeqCst);
        Ok(validity)
    }

    async fn verify_serial(&self) -> Result<(), BmdError> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(BmdError::Closed)?;
        let Some(descriptor) = transport.serial_number().map(str::to_owned) else {
            debug!("No descriptor serial, skipping serial check");
            return Ok(());
        };

        let data = transport.get_feature_report(SERIAL_REPORT_ID, SERIAL_REPORT_LEN).await?;
        match FEATURE_CODEC.decode(&data) {
            Ok(Some(FeatureMessage::Serial(reported))) if !reported.serial.is_empty() => {
                if reported.serial != descriptor {
                    return Err(BmdError::SerialMismatch {
                        descriptor,
                        reported: reported.serial,
                    });
                }
                debug!("Serial {} confirmed", descriptor);
                Ok(())
            }
            Ok(_) => {
                debug!("Device did not report a serial");
                Ok(())
            }
            Err(e) => {
                warn!("Unreadable serial report: {}", e);
                Ok(())
            }
        }
    }

    /// Releases the handle and fires the close hook. Safe to call repeatedly
    /// and from the re-authentication task itself.
    async fn release(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Closing device session");
        }
        drop(self.transport.lock().await.take());

        let hook = self.on_close.lock().ok().and_then(|mut slot| slot.take());
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let hook = self.on_close.get_mut().ok().and_then(Option::take);
        if let Some(hook) = hook {
            debug!("Device session dropped without close");
            drop(self.transport.get_mut().take());
            hook();
        }
    }
}

/// An authenticated session with one control surface.
///
/// The session is shared between the caller's polling loop and a background
/// task that re-runs the handshake before the device stops trusting us. All
/// transport access is serialised through one lock. Any transport failure
/// closes the session before the error is returned, and a closed session
/// stays closed.
///
/// Dropping the session stops re-authentication and releases the handle as
/// well, but without waiting: the handle and close hook go once the background
/// task has seen the stop signal.
pub struct DeviceSession<T: HidTransport> {
    shared: Arc<Shared<T>>,
    reauth: PeriodicTask,
    config: SessionConfig,
}

impl<T: HidTransport> DeviceSession<T> {
    /// Opens the device described by `identity` with default settings.
    pub async fn open(identity: &DeviceIdentity) -> Result<Self, BmdError>
    where
        T: OpenTransport,
    {
        SessionBuilder::new().open(identity).await
    }

    async fn establish(transport: T, builder: SessionBuilder) -> Result<Self, BmdError> {
        let SessionBuilder {
            config,
            our_challenge,
            on_close,
        } = builder;
        let shared = Arc::new(Shared::new(transport, our_challenge, on_close));

        let validity = match Self::handshake(&shared, &config).await {
            Ok(validity) => validity,
            Err(e) => {
                error!("Failed to open device session: {}", e);
                shared.release().await;
                return Err(e);
            }
        };

        let reauth = Self::schedule_reauth(Arc::clone(&shared), config.clone(), validity);
        Ok(Self { shared, reauth, config })
    }

    async fn handshake(shared: &Shared<T>, config: &SessionConfig) -> Result<u64, BmdError> {
        if config.check_serial {
            shared.verify_serial().await?;
        }
        shared.authenticate(config.auth_timeout).await
    }

    fn schedule_reauth(shared: Arc<Shared<T>>, config: SessionConfig, validity: u64) -> PeriodicTask {
        let first_delay = config.reauth_delay(validity);
        debug!("Re-authenticating in {:?}", first_delay);

        PeriodicTask::start(first_delay, move || {
            let shared = Arc::clone(&shared);
            let config = config.clone();
            async move {
                match shared.authenticate(config.auth_timeout).await {
                    Ok(validity) => {
                        let delay = config.reauth_delay(validity);
                        debug!("Re-authenticated, next run in {:?}", delay);
                        Some(delay)
                    }
                    Err(BmdError::Closed) => None,
                    Err(e) => {
                        error!("Re-authentication failed: {}", e);
                        shared.release().await;
                        None
                    }
                }
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Seconds of validity granted by the most recent handshake.
    pub fn validity(&self) -> u64 {
        self.shared.validity.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Waits for the next input event.
    ///
    /// `None` blocks until a report arrives, `Some(Duration::ZERO)` checks once
    /// without waiting. Returns `Ok(None)` when nothing arrived in time or the
    /// report was unrecognised or malformed.
    pub async fn poll(&self, timeout: Option<Duration>) -> Result<Option<InputEvent>, BmdError> {
        if self.is_closed() {
            return Err(BmdError::Closed);
        }
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            // Read in short slices so a pending re-authentication can take the handle in between.
            let slice = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()).min(self.config.read_slice),
                None => self.config.read_slice,
            };
            let read = {
                let mut guard = self.shared.transport.lock().await;
                let Some(transport) = guard.as_mut() else {
                    return Err(BmdError::Closed);
                };
                transport.read(self.config.max_report_len, Some(slice)).await
            };

            match read {
                Err(e) => {
                    error!("Input read failed: {}", e);
                    self.close().await;
                    return Err(e.into());
                }
                Ok(Some(data)) if !data.is_empty() => return Ok(Self::decode_input(&data)),
                Ok(_) => {}
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(None);
            }
        }
    }

    fn decode_input(data: &[u8]) -> Option<InputEvent> {
        match INPUT_CODEC.decode(data) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping input report {}: {}", hex::encode(data), e);
                None
            }
        }
    }

    /// Encodes and writes one output request.
    pub async fn send(&self, request: &OutputRequest) -> Result<(), BmdError> {
        if self.is_closed() {
            return Err(BmdError::Closed);
        }
        let report = OUTPUT_CODEC.encode(request);
        debug!("Sending {:?}", request);

        let written = {
            let mut guard = self.shared.transport.lock().await;
            let Some(transport) = guard.as_mut() else {
                return Err(BmdError::Closed);
            };
            transport.write(&report).await
        };

        if let Err(e) = written {
            error!("Output write failed: {}", e);
            self.close().await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Stops re-authentication, waiting for a run in progress, then releases
    /// the handle. The close hook fires only on the first call.
    pub async fn close(&self) {
        self.reauth.stop().await;
        self.shared.release().await;
    }
}

/// Builds a [`DeviceSession`] from an identity or an already open transport.
pub struct SessionBuilder {
    config: SessionConfig,
    our_challenge: u64,
    on_close: Option<CloseHook>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            our_challenge: 0,
            on_close: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Challenge we send to the device. The device is never verified, so zero works.
    pub fn challenge(mut self, challenge: u64) -> Self {
        self.our_challenge = challenge;
        self
    }

    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Acquires the device and authenticates.
    pub async fn open<T: OpenTransport>(self, identity: &DeviceIdentity) -> Result<DeviceSession<T>, BmdError> {
        match T::open(identity).await {
            Ok(transport) => DeviceSession::establish(transport, self).await,
            Err(e) => {
                error!("Failed to open device: {}", e);
                if let Some(hook) = self.on_close {
                    hook();
                }
                Err(e.into())
            }
        }
    }

    /// Authenticates over a transport opened elsewhere.
    pub async fn connect<T: HidTransport>(self, transport: T) -> Result<DeviceSession<T>, BmdError> {
        DeviceSession::establish(transport, self).await
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
