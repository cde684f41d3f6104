pub mod auth;
pub mod codec;
pub mod constants;
pub mod crypto;
pub mod device;
pub mod error;
pub mod input;
pub mod leds;
pub mod message;
pub mod modes;
pub mod surface;
pub mod task;
pub mod transport;
pub mod types;


pub use device::{DeviceSession, SessionBuilder, SessionConfig};
pub use error::{BmdError, DecodeError, TransportError};
pub use surface::{ControlSurface, SurfaceHandler};
pub use transport::{DeviceIdentity, UsbHidTransport};
