//! SSH session controller used by the worker pool to run commands on managed hosts.

pub mod conn;
pub mod error;

pub use conn::{Conn, Method};
pub use error::SshError;
