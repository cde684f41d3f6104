//! Raw HID transport underneath a device session.
//!
//! [`HidTransport`] is the seam between the protocol and the physical handle.
//! [`UsbHidTransport`] implements it on top of `nusb`: input reports come from
//! the interrupt IN endpoint, feature and output reports go through the HID
//! class GET_REPORT / SET_REPORT control requests.

use crate::constants::{
    CONTROL_TIMEOUT, EDITOR_KEYBOARD_PID, HID_INTERFACE, INPUT_ENDPOINT, SPEED_EDITOR_PID, VENDOR_ID,
};
use crate::error::TransportError;
use bytes::Bytes;
use nusb::transfer::{ControlIn, ControlOut, ControlType, In, Interrupt, Recipient, TransferError};
use nusb::{Endpoint, Interface};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, trace};

const HID_GET_REPORT: u8 = 0x01;
const HID_SET_REPORT: u8 = 0x09;
const REPORT_TYPE_OUTPUT: u8 = 0x02;
const REPORT_TYPE_FEATURE: u8 = 0x03;

/// Which physical device a session should open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Pick a specific unit when several are connected
    pub serial: Option<String>,
}

impl DeviceIdentity {
    pub const SPEED_EDITOR: DeviceIdentity = DeviceIdentity::new(VENDOR_ID, SPEED_EDITOR_PID);
    pub const EDITOR_KEYBOARD: DeviceIdentity = DeviceIdentity::new(VENDOR_ID, EDITOR_KEYBOARD_PID);

    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            serial: None,
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16, serial: Option<&str>) -> bool {
        self.vendor_id == vendor_id
            && self.product_id == product_id
            && self.serial.as_deref().is_none_or(|wanted| serial == Some(wanted))
    }
}

/// An exclusive handle on one HID device. Dropping it releases the device.
///
/// Reports always carry their report id as the first byte.
pub trait HidTransport: Send + 'static {
    /// Serial number from the USB descriptor, when the device exposes one.
    fn serial_number(&self) -> Option<&str>;

    /// Reads one input report. `None` timeout blocks until data arrives;
    /// `Ok(None)` means nothing arrived in time.
    fn read(
        &mut self,
        max_len: usize,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Option<Bytes>, TransportError>> + Send;

    /// Writes one output report.
    fn write(&mut self, report: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Fetches feature report `id`, at most `len` bytes.
    fn get_feature_report(&mut self, id: u8, len: usize)
    -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Sends a feature report.
    fn send_feature_report(&mut self, report: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Transports that can acquire their own handle from a [`DeviceIdentity`].
pub trait OpenTransport: HidTransport + Sized {
    fn open(identity: &DeviceIdentity) -> impl Future<Output = Result<Self, TransportError>> + Send;
}

/// HID transport over a claimed USB interface.
pub struct UsbHidTransport {
    interface: Interface,
    input: Endpoint<Interrupt, In>,
    serial: Option<String>,
}

impl UsbHidTransport {
    fn report_value(report_type: u8, id: u8) -> u16 {
        (u16::from(report_type) << 8) | u16::from(id)
    }

    async fn set_report(&mut self, report_type: u8, report: &[u8]) -> Result<(), TransportError> {
        let id = report.first().copied().unwrap_or(0);
        trace!("SET_REPORT type {} id {}: {}", report_type, id, hex::encode(report));
        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_SET_REPORT,
                    value: Self::report_value(report_type, id),
                    index: u16::from(HID_INTERFACE),
                    data: report,
                },
                CONTROL_TIMEOUT,
            )
            .await?;
        Ok(())
    }
}

impl OpenTransport for UsbHidTransport {
    async fn open(identity: &DeviceIdentity) -> Result<Self, TransportError> {
        info!(
            "Searching for device {:04x}:{:04x}...",
            identity.vendor_id, identity.product_id
        );
        let device_info = nusb::list_devices()
            .await?
            .find(|d| identity.matches(d.vendor_id(), d.product_id(), d.serial_number()))
            .ok_or(TransportError::NotFound)?;

        info!("Found device, serial {:?}", device_info.serial_number());
        let serial = device_info.serial_number().map(str::to_owned);

        let device = device_info.open().await?;
        let interface = device.detach_and_claim_interface(HID_INTERFACE).await?;
        let input = interface.endpoint::<Interrupt, In>(INPUT_ENDPOINT)?;
        info!("Interface claimed successfully.");

        Ok(Self {
            interface,
            input,
            serial,
        })
    }
}

impl HidTransport for UsbHidTransport {
    fn serial_number(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    async fn read(&mut self, max_len: usize, wait: Option<Duration>) -> Result<Option<Bytes>, TransportError> {
        // Keep one transfer in flight; a timed out wait leaves it pending for the next read.
        if self.input.pending() == 0 {
            let buffer = self.input.allocate(self.input.max_packet_size());
            self.input.submit(buffer);
        }

        let completion = match wait {
            Some(wait) => match timeout(wait, self.input.next_complete()).await {
                Ok(completion) => completion,
                Err(_) => return Ok(None),
            },
            None => self.input.next_complete().await,
        };
        match completion.status {
            Err(TransferError::Disconnected) => return Err(TransportError::Disconnected),
            status => status?,
        }

        let data: &[u8] = &completion.buffer;
        let len = data.len().min(max_len);
        trace!("Received {} bytes: {}", len, hex::encode(&data[..len]));
        Ok(Some(Bytes::copy_from_slice(&data[..len])))
    }

    async fn write(&mut self, report: &[u8]) -> Result<(), TransportError> {
        self.set_report(REPORT_TYPE_OUTPUT, report).await
    }

    async fn get_feature_report(&mut self, id: u8, len: usize) -> Result<Bytes, TransportError> {
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_GET_REPORT,
                    value: Self::report_value(REPORT_TYPE_FEATURE, id),
                    index: u16::from(HID_INTERFACE),
                    length: u16::try_from(len).unwrap_or(u16::MAX),
                },
                CONTROL_TIMEOUT,
            )
            .await?;
        debug!("GET_REPORT feature {}: {}", id, hex::encode(&data));
        Ok(Bytes::from(data))
    }

    async fn send_feature_report(&mut self, report: &[u8]) -> Result<(), TransportError> {
        self.set_report(REPORT_TYPE_FEATURE, report).await
    }
}
