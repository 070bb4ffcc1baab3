//! One reusable SSH client per host, with serial command execution and
//! transparent `su` privilege elevation.
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use ssh2::{Channel, Session};
use tokio::sync::Mutex;
use tokio::task;

use crate::error::SshError;

const PASSWORD_PROMPT_TIMEOUT: Duration = Duration::from_secs(3);
const PASSWORD_PROMPT_NEEDLE: &[u8] = b"Password:";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How a command's output should be captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Only the completion status is reported.
    Run,
    /// Stdout is captured.
    Output,
    /// Stdout followed by stderr is captured.
    CombinedOutput,
}

struct Outcome {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

struct Inner {
    session: Session,
    op_username: String,
    op_password: String,
}

/// A reusable, authenticated SSH client.
///
/// Calls are serial: [`Conn::run`], [`Conn::output`], [`Conn::combined_output`]
/// and [`Conn::su`] each hold an exclusive lock for the duration of the
/// command; concurrent callers queue behind it.
pub struct Conn {
    inner: Mutex<Inner>,
}

impl Conn {
    /// Dial `host:port` and authenticate with `username`/`password`.
    ///
    /// Host key verification is intentionally skipped: this is a fleet tool
    /// managing hosts it already trusts, not a general-purpose SSH client.
    pub async fn connect(host: &str, port: u16, username: &str, password: &str) -> Result<Self, SshError> {
        let host = if host.is_empty() { "127.0.0.1".to_owned() } else { host.to_owned() };
        let port = if port == 0 { 22 } else { port };
        let username = username.to_owned();
        let password = password.to_owned();

        let session = task::spawn_blocking(move || -> Result<Session, SshError> {
            let tcp = TcpStream::connect((host.as_str(), port))?;
            let mut sess = Session::new()?;
            sess.set_tcp_stream(tcp);
            sess.handshake()?;
            sess.userauth_password(&username, &password)?;
            if !sess.authenticated() {
                return Err(SshError::InvalidCredential);
            }
            Ok(sess)
        })
        .await
        .map_err(|e| SshError::Other(e.to_string()))??;

        Ok(Conn {
            inner: Mutex::new(Inner {
                session,
                op_username: String::new(),
                op_password: String::new(),
            }),
        })
    }

    /// Elevate to `username` for every subsequent command on this connection,
    /// wrapping them as `su -l <username> -c "<cmd>"`.
    ///
    /// Runs a one-shot `stty -a` under the current identity first; this is
    /// not a persistent shell, privilege elevation is re-performed per
    /// command.
    pub async fn su(&self, username: &str, password: &str, timeout: Option<u64>) -> Result<(), SshError> {
        let mut guard = self.inner.lock().await;
        task::block_in_place(|| run_command(&mut guard.session, "stty -a", "", "", timeout, Method::Run))?;
        guard.op_username = username.to_owned();
        guard.op_password = password.to_owned();
        Ok(())
    }

    /// Run `cmd`, reporting only whether it completed successfully.
    pub async fn run(&self, cmd: &str, timeout: Option<u64>) -> Result<(), SshError> {
        let mut guard = self.inner.lock().await;
        let (op_user, op_pass) = (guard.op_username.clone(), guard.op_password.clone());
        task::block_in_place(|| run_command(&mut guard.session, cmd, &op_user, &op_pass, timeout, Method::Run))?;
        Ok(())
    }

    /// Run `cmd`, returning its stdout.
    pub async fn output(&self, cmd: &str, timeout: Option<u64>) -> Result<Vec<u8>, SshError> {
        let mut guard = self.inner.lock().await;
        let (op_user, op_pass) = (guard.op_username.clone(), guard.op_password.clone());
        let outcome =
            task::block_in_place(|| run_command(&mut guard.session, cmd, &op_user, &op_pass, timeout, Method::Output))?;
        Ok(outcome.stdout)
    }

    /// Run `cmd`, returning its stdout followed by its stderr.
    pub async fn combined_output(&self, cmd: &str, timeout: Option<u64>) -> Result<Vec<u8>, SshError> {
        let mut guard = self.inner.lock().await;
        let (op_user, op_pass) = (guard.op_username.clone(), guard.op_password.clone());
        let outcome = task::block_in_place(|| {
            run_command(&mut guard.session, cmd, &op_user, &op_pass, timeout, Method::CombinedOutput)
        })?;
        let mut combined = outcome.stdout;
        combined.extend(outcome.stderr);
        Ok(combined)
    }

    /// Close the underlying SSH connection.
    pub async fn close(&self) -> Result<(), SshError> {
        let guard = self.inner.lock().await;
        task::block_in_place(|| guard.session.disconnect(None, "closing", None).map_err(SshError::from))
    }
}

fn run_command(
    session: &mut Session,
    cmd: &str,
    op_user: &str,
    op_pass: &str,
    timeout: Option<u64>,
    method: Method,
) -> Result<Outcome, SshError> {
    session.set_blocking(true);
    let mut channel = session.channel_session()?;
    channel.request_pty("vt100", None, Some((200, 300, 0, 0)))?;
    let _ = channel.setenv("LANG", "C");

    let full_cmd = if op_user.is_empty() {
        cmd.to_owned()
    } else {
        format!(r#"su -l {} -c "{}""#, op_user, cmd)
    };
    channel.exec(&full_cmd)?;

    session.set_blocking(false);
    if !op_user.is_empty() {
        wait_for_password_prompt(&mut channel, op_pass)?;
    }

    let deadline = timeout
        .filter(|&t| t > 0)
        .map(|t| Instant::now() + Duration::from_secs(t));
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        if let Some(d) = deadline {
            if Instant::now() >= d {
                let _ = channel.close();
                return Err(SshError::Timeout);
            }
        }
        match channel.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => stdout.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(SshError::Io(e)),
        }
        if method == Method::CombinedOutput {
            match channel.stderr().read(&mut buf) {
                Ok(0) => {}
                Ok(n) => stderr.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(SshError::Io(e)),
            }
        }
        if channel.eof() {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    session.set_blocking(true);
    channel.wait_close()?;
    let status = channel.exit_status()?;
    if status != 0 {
        if !op_user.is_empty() && status == 1 {
            return Err(SshError::InvalidCredential);
        }
        return Err(SshError::ExitStatus(status));
    }
    Ok(Outcome { stdout, stderr })
}

/// Races a known prompt prefix against a fixed idle deadline, matching the
/// single chance `su` gets before the remote side times it out itself.
fn wait_for_password_prompt(channel: &mut Channel, password: &str) -> Result<(), SshError> {
    let deadline = Instant::now() + PASSWORD_PROMPT_TIMEOUT;
    let mut window: Vec<u8> = Vec::new();
    let mut buf = [0u8; 9];
    loop {
        if Instant::now() >= deadline {
            return Err(SshError::Timeout);
        }
        match channel.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                window.extend_from_slice(&buf[..n]);
                if window.len() > 32 {
                    let excess = window.len() - 32;
                    window.drain(0..excess);
                }
                if n == 9 && contains(&window, PASSWORD_PROMPT_NEEDLE) {
                    channel.write_all(format!("{}\n", password).as_bytes())?;
                    return Ok(());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(SshError::Io(e)),
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
