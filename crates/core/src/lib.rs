pub mod decrypt;
pub mod error;
pub mod media;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stream;
pub mod transport;
pub mod tuner;

pub use error::{Result, SatIpError};
pub use server::{RtspServer, ServerConfig};
pub use stream::Stream;
pub use stream::registry::Streams;
