//! Common test utilities: a simulated control surface behind the transport seam.

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#![allow(dead_code)]

#[allow(unused_imports)]
pub use bmd_hid_lib::device::{DeviceSession, SessionBuilder, SessionConfig};
#[allow(unused_imports)]
pub use bmd_hid_lib::error::{BmdError, TransportError};
#[allow(unused_imports)]
pub use bmd_hid_lib::message::{BatteryEvent, InputEvent, JogEvent, KeyEvent, OutputRequest};
#[allow(unused_imports)]
pub use bmd_hid_lib::types::{JogLed, JogMode, Key, Led};
#[allow(unused_imports)]
pub use std::time::Duration;

use bmd_hid_lib::crypto::solve;
use bmd_hid_lib::transport::{DeviceIdentity, HidTransport, OpenTransport};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DEVICE_CHALLENGE: u64 = 0x1122334455667788;
pub const DEFAULT_VALIDITY: u64 = 600;

/// How the simulated device behaves during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBehaviour {
    /// Grants the configured validity to a correct response
    Accept,
    /// Answers every response with result 0
    Reject,
    /// Stops answering after the device response step
    Silent,
}

/// One call the session made on the transport, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOp {
    /// Auth feature report sent with this handshake step
    SendFeature(u8),
    /// Feature report read; `step` is the handshake step it carried, if any
    GetFeature { id: u8, step: Option<u8> },
    /// Output report written
    Write,
}

#[derive(Debug)]
pub struct DeviceState {
    pub behaviour: AuthBehaviour,
    pub validity: u64,
    pub descriptor_serial: Option<String>,
    pub reported_serial: Option<String>,
    pub feature_report: Vec<u8>,
    pub input: VecDeque<Vec<u8>>,
    pub writes: Vec<Vec<u8>>,
    pub auth_rounds: usize,
    pub bad_responses: usize,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub released: bool,
    pub ops: Vec<DeviceOp>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            behaviour: AuthBehaviour::Accept,
            validity: DEFAULT_VALIDITY,
            descriptor_serial: None,
            reported_serial: None,
            feature_report: Vec::new(),
            input: VecDeque::new(),
            writes: Vec::new(),
            auth_rounds: 0,
            bad_responses: 0,
            fail_reads: false,
            fail_writes: false,
            released: false,
            ops: Vec::new(),
        }
    }
}

fn auth_report(step: u8, data: u64) -> Vec<u8> {
    let mut report = vec![6, step];
    report.extend_from_slice(&data.to_le_bytes());
    report
}

impl DeviceState {
    fn handle_feature(&mut self, report: &[u8]) {
        if report.first() != Some(&6) || report.len() < 10 {
            return;
        }
        let step = report[1];
        let mut data = [0u8; 8];
        data.copy_from_slice(&report[2..10]);
        let data = u64::from_le_bytes(data);

        match step {
            // Host challenge: answer with ours
            0 => {
                self.auth_rounds += 1;
                self.feature_report = auth_report(0, DEVICE_CHALLENGE);
            }
            // Host acknowledged our challenge
            1 => self.feature_report = auth_report(2, 0),
            // Host response
            3 => {
                let valid = data == solve(DEVICE_CHALLENGE);
                if !valid {
                    self.bad_responses += 1;
                }
                self.feature_report = match self.behaviour {
                    AuthBehaviour::Accept if valid => auth_report(4, self.validity),
                    AuthBehaviour::Accept | AuthBehaviour::Reject => auth_report(4, 0),
                    AuthBehaviour::Silent => return,
                };
            }
            _ => {}
        }
    }

    fn serial_report(&self) -> Vec<u8> {
        let mut report = vec![8];
        if let Some(serial) = &self.reported_serial {
            report.extend_from_slice(serial.as_bytes());
        }
        report.resize(33, 0);
        report
    }
}

/// Transport backed by a shared [`DeviceState`]. The test keeps a
/// [`DeviceHandle`] to script input and inspect what the session did.
pub struct SimulatedDevice {
    state: Arc<Mutex<DeviceState>>,
    serial: Option<String>,
}

#[derive(Clone)]
pub struct DeviceHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatedDevice {
    pub fn new() -> (Self, DeviceHandle) {
        Self::with_state(DeviceState::default())
    }

    pub fn with_state(state: DeviceState) -> (Self, DeviceHandle) {
        let serial = state.descriptor_serial.clone();
        let state = Arc::new(Mutex::new(state));
        (
            Self {
                state: Arc::clone(&state),
                serial,
            },
            DeviceHandle { state },
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.lock().released = true;
    }
}

impl HidTransport for SimulatedDevice {
    fn serial_number(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    async fn read(&mut self, max_len: usize, timeout: Option<Duration>) -> Result<Option<Bytes>, TransportError> {
        let next = {
            let mut state = self.lock();
            if state.fail_reads {
                return Err(TransportError::Disconnected);
            }
            state.input.pop_front()
        };
        match next {
            Some(mut report) => {
                report.truncate(max_len);
                Ok(Some(Bytes::from(report)))
            }
            None => {
                tokio::time::sleep(timeout.unwrap_or(Duration::from_millis(10))).await;
                Ok(None)
            }
        }
    }

    async fn write(&mut self, report: &[u8]) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(TransportError::Disconnected);
        }
        state.ops.push(DeviceOp::Write);
        state.writes.push(report.to_vec());
        Ok(())
    }

    async fn get_feature_report(&mut self, id: u8, len: usize) -> Result<Bytes, TransportError> {
        let mut state = self.lock();
        let mut report = match id {
            6 => state.feature_report.clone(),
            8 => state.serial_report(),
            _ => Vec::new(),
        };
        report.truncate(len);
        let step = if id == 6 { report.get(1).copied() } else { None };
        state.ops.push(DeviceOp::GetFeature { id, step });
        Ok(Bytes::from(report))
    }

    async fn send_feature_report(&mut self, report: &[u8]) -> Result<(), TransportError> {
        let mut state = self.lock();
        if report.first() == Some(&6) {
            if let Some(&step) = report.get(1) {
                state.ops.push(DeviceOp::SendFeature(step));
            }
        }
        state.handle_feature(report);
        Ok(())
    }
}

impl DeviceHandle {
    pub fn with<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn push_input(&self, report: &str) {
        let bytes = hex::decode(report).expect("Failed to decode hex");
        self.with(|state| state.input.push_back(bytes));
    }

    pub fn writes(&self) -> Vec<String> {
        self.with(|state| state.writes.iter().map(hex::encode).collect())
    }

    pub fn auth_rounds(&self) -> usize {
        self.with(|state| state.auth_rounds)
    }

    pub fn released(&self) -> bool {
        self.with(|state| state.released)
    }

    pub fn ops(&self) -> Vec<DeviceOp> {
        self.with(|state| state.ops.clone())
    }
}

/// A transport whose device is never present.
pub struct UnpluggedTransport;

impl HidTransport for UnpluggedTransport {
    fn serial_number(&self) -> Option<&str> {
        None
    }

    async fn read(&mut self, _max_len: usize, _timeout: Option<Duration>) -> Result<Option<Bytes>, TransportError> {
        Err(TransportError::Disconnected)
    }

    async fn write(&mut self, _report: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Disconnected)
    }

    async fn get_feature_report(&mut self, _id: u8, _len: usize) -> Result<Bytes, TransportError> {
        Err(TransportError::Disconnected)
    }

    async fn send_feature_report(&mut self, _report: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Disconnected)
    }
}

impl OpenTransport for UnpluggedTransport {
    async fn open(_identity: &DeviceIdentity) -> Result<Self, TransportError> {
        Err(TransportError::NotFound)
    }
}

/// Counts close hook invocations.
#[derive(Clone, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub fn hook(&self) -> impl FnOnce() + Send + 'static {
        let count = Arc::clone(&self.0);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Settings that keep failing tests fast.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        auth_timeout: Duration::from_millis(200),
        read_slice: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

/// Routes library logs to the test output, honouring `RUST_LOG`.
pub fn init_logging() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Opens an authenticated session on a fresh simulated device.
pub async fn connect(state: DeviceState) -> (DeviceSession<SimulatedDevice>, DeviceHandle, CloseCounter) {
    init_logging();
    let (device, handle) = SimulatedDevice::with_state(state);
    let closes = CloseCounter::default();
    let session = SessionBuilder::new()
        .config(test_config())
        .on_close(closes.hook())
        .connect(device)
        .await
        .expect("Failed to open session");
    (session, handle, closes)
}
