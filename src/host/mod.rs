pub mod handler;
pub mod protocol;

pub use handler::HostHandler;
pub use protocol::{HostMessage, HostOutput};
