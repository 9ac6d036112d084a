// src/hal/command.rs
//! Text command channel to the Trigno Control Utility

use crate::config::constants::protocol::{
    CMD_TERM, GREETING_BUFFER_SIZE, REPLY_BUFFER_SIZE, REPLY_OK,
};
use crate::error::TrignoResult;
use crate::hal::types::CommandStatus;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Command socket wrapper: terminated text commands with `OK` reply validation
#[derive(Debug)]
pub struct CommandChannel<S> {
    stream: S,
    reply_timeout: Duration,
}

impl<S> CommandChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, reply_timeout: Duration) -> Self {
        Self {
            stream,
            reply_timeout,
        }
    }

    /// Read and drop the unsolicited server greeting
    pub async fn discard_greeting(&mut self) -> io::Result<usize> {
        let mut greeting = [0u8; GREETING_BUFFER_SIZE];
        let n = timeout(self.reply_timeout, self.stream.read(&mut greeting))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no greeting from server"))??;
        debug!(
            "Discarded server greeting: {:?}",
            String::from_utf8_lossy(&greeting[..n]).trim_end()
        );
        Ok(n)
    }

    /// Send a command and validate the reply
    ///
    /// A reply without `OK`, or no reply within the timeout, is logged as a
    /// warning and reported as [`CommandStatus::Rejected`]; only socket write
    /// failures are returned as errors.
    pub async fn send_command(&mut self, command: &str) -> TrignoResult<CommandStatus> {
        self.stream.write_all(&format_command(command)).await?;
        self.stream.flush().await?;

        let mut reply = [0u8; REPLY_BUFFER_SIZE];
        let status = match timeout(self.reply_timeout, self.stream.read(&mut reply)).await {
            Ok(Ok(n)) => validate_reply(command, &reply[..n]),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => CommandStatus::Rejected {
                command: command.to_string(),
                reply: String::new(),
            },
        };

        match &status {
            CommandStatus::Accepted => debug!("Command {} acknowledged", command),
            CommandStatus::Rejected { reply, .. } => {
                warn!("TrignoDaq command {} failed: {:?}", command, reply)
            }
        }
        Ok(status)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Encode a command with its terminator
pub fn format_command(command: &str) -> Vec<u8> {
    format!("{}{}", command, CMD_TERM).into_bytes()
}

/// A reply is accepted when it contains `OK` anywhere
pub fn validate_reply(command: &str, reply: &[u8]) -> CommandStatus {
    let text = String::from_utf8_lossy(reply);
    if text.contains(REPLY_OK) {
        CommandStatus::Accepted
    } else {
        CommandStatus::Rejected {
            command: command.to_string(),
            reply: text.trim_end().to_string(),
        }
    }
}
