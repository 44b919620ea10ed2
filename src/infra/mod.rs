//! Collaborators at the edge of the engine: transport, clock, request ids,
//! and process bootstrap.

pub mod clock;
pub mod error;
pub mod http;
pub mod ids;
pub mod telemetry;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::InfraError;
pub use http::ReqwestTransport;
pub use ids::{RequestIdGenerator, SequentialGenerator, UuidGenerator};
pub use transport::{RawRequest, RawResponse, Transport, TransportError};
