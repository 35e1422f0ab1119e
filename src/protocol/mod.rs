//! CoLa2 control-channel protocol
//!
//! - [`header`]: 16-byte frame header codec
//! - [`command`]: command envelope and builder
//! - [`session`]: session handshake, request sequencing, response unwrapping

pub mod command;
pub mod header;
pub mod session;

pub use command::{Command, CommandBuilder, CommandType};
pub use header::Cola2Header;
pub use session::{Session, SessionHandler};
