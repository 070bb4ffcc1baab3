//! Error handling in [`panther-ssh`][crate].
use thiserror::Error;

/// Possible errors when driving a remote command over SSH.
#[derive(Error, Debug)]
pub enum SshError {
    /// The command's timeout elapsed before it completed; the remote process
    /// has been signalled to die but its exit is not waited for.
    #[error("timeout duration exceeded while calling command")]
    Timeout,

    /// `su` was attempted with a username/password the remote host rejected.
    #[error("invalid username or password")]
    InvalidCredential,

    /// A command completed with a non-zero exit status.
    #[error("command exited with status {0}")]
    ExitStatus(i32),

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// libssh2-level failure (handshake, auth, channel setup).
    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    /// Any other failure, e.g. a background task panicking.
    #[error("{0}")]
    Other(String),
}
