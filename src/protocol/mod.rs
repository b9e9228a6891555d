//! Wire-level pieces: payload shape, response classification, transports
//! and the status probe.

pub mod classifier;
pub mod payload;
pub mod status;
pub mod transport;

pub use classifier::{Classification, ResponseClassifier};
pub use payload::{DeviceInfo, DispatchPayload};
pub use status::{
    STATUS_CONNECTION_ERROR, STATUS_OFFLINE, STATUS_UNKNOWN, STATUS_URL, StatusProbe,
    interpret_status,
};
pub use transport::{
    AsyncTransport, BlockingReqwestTransport, BlockingTransport, ReqwestTransport, TransportError,
    TransportRequest, TransportResponse,
};
