pub mod backoff;
pub mod chrome;
pub mod connection;
pub mod mock;
pub mod registry;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use chrome::{ConnectionChrome, LoggingChrome};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, SyncHandle};
pub use mock::{MockConnection, MockTransport, ScriptStep};
pub use registry::ModelRegistry;
pub use transport::{ws_base_url, FrameSink, FrameStream, Transport, WsTransport};
