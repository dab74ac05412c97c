//! Transport layer module.

pub mod mock;
pub mod nusb;
pub mod traits;

pub use mock::MockTransport;
pub use nusb::{NusbTransport, find_device};
pub use traits::{HidTransport, TransportError};
