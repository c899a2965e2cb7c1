/// Client side: request correlation, timeouts, event streams.
pub mod client;
/// Service, client and logging configuration.
pub mod config;
/// Client and codec error types.
pub mod error;
/// Request and event identifiers.
pub mod ids;
/// Logging setup (formatting, filters).
pub mod logging;
/// Wire messages, error payloads, JSON codec.
pub mod protocol;
/// Channel service: destinations, dispatch, broadcast.
pub mod service;
/// Transport abstraction and the in-memory implementation.
pub mod transport;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Client handle and subscription streams.
pub use client::{ChannelClient, Event, EventStream};
/// config
pub use config::{ClientConfig, ServiceConfig, Settings, UnroutablePolicy};
/// Operation errors and result types.
pub use error::{ClientError, ClientResult, TransportError};
/// Identifier generators.
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
/// Logging entry point.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Error stack shared with handlers.
pub use postbridge_error::{ChannelError, ChannelResult, DeliveryError, StackError, StatusCode};
/// Wire protocol.
pub use protocol::{
    DownstreamKind, DownstreamMessage, ErrorPayload, Status, UpstreamKind, UpstreamMessage,
};
/// Service API.
pub use service::{ChannelService, ChannelServiceBuilder, RequestHandler};
/// Transport API.
pub use transport::{Endpoint, Inbound, PeerId, ReplyHandle, ReplySink};
