pub mod client;
pub mod transport;

pub use client::{ClientError, ClientResult};
pub use transport::TransportError;
