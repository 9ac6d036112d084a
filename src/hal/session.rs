// src/hal/session.rs
//! Device session: one command socket and one data socket to the TCU

use crate::config::constants::protocol::{START_COMMAND, STOP_COMMAND};
use crate::config::ConnectionConfig;
use crate::error::{TrignoError, TrignoResult};
use crate::hal::command::CommandChannel;
use crate::hal::frame::{decode, FrameReader};
use crate::hal::types::{CommandStatus, DeviceFamily, DeviceState, SampleMatrix};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Connection parameters of a single session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub host: String,
    pub command_port: u16,
    pub data_port: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl SessionConfig {
    pub fn for_family(connection: &ConnectionConfig, family: DeviceFamily) -> Self {
        Self {
            host: connection.host.clone(),
            command_port: connection.command_port,
            data_port: connection.data_port(family),
            connect_timeout: connection.connect_timeout(),
            read_timeout: connection.read_timeout(),
        }
    }

    fn command_addr(&self) -> String {
        format!("{}:{}", self.host, self.command_port)
    }

    fn data_addr(&self) -> String {
        format!("{}:{}", self.host, self.data_port)
    }
}

/// Base session shared by the EMG and accelerometer adapters
///
/// Owns both sockets exclusively and tracks the Idle → Started → Stopped
/// lifecycle. The total channel count is fixed at construction.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    family: DeviceFamily,
    total_channels: usize,
    command: CommandChannel<TcpStream>,
    frames: FrameReader<TcpStream>,
    state: DeviceState,
}

impl Session {
    /// Open the command socket, drop the greeting, then open the data socket
    pub async fn connect(config: SessionConfig, family: DeviceFamily) -> TrignoResult<Self> {
        let (command, frames) = Self::open(&config).await?;
        info!(
            "{} session connected to {} (data port {})",
            family,
            config.command_addr(),
            config.data_port
        );

        Ok(Self {
            total_channels: family.total_channels(),
            config,
            family,
            command,
            frames,
            state: DeviceState::Idle,
        })
    }

    async fn open(
        config: &SessionConfig,
    ) -> TrignoResult<(CommandChannel<TcpStream>, FrameReader<TcpStream>)> {
        let command_addr = config.command_addr();
        let command_stream = connect_with_timeout(&command_addr, config.connect_timeout).await?;
        let mut command = CommandChannel::new(command_stream, config.read_timeout);
        command
            .discard_greeting()
            .await
            .map_err(|e| TrignoError::connection(&command_addr, e))?;

        let data_stream = connect_with_timeout(&config.data_addr(), config.connect_timeout).await?;
        let frames = FrameReader::new(data_stream, config.read_timeout);

        Ok((command, frames))
    }

    pub async fn send_command(&mut self, command: &str) -> TrignoResult<CommandStatus> {
        self.command.send_command(command).await
    }

    /// Idle/Stopped → Started when the TCU acknowledges `START`
    pub async fn start(&mut self) -> TrignoResult<CommandStatus> {
        let status = self.send_command(START_COMMAND).await?;
        if status.is_accepted() {
            self.state = DeviceState::Started;
            info!("{} acquisition started", self.family);
        }
        Ok(status)
    }

    /// Started → Stopped when the TCU acknowledges `STOP`
    ///
    /// `STOP` is global to the TCU and is sent from any state, but a session
    /// that never started keeps its state.
    pub async fn stop(&mut self) -> TrignoResult<CommandStatus> {
        let status = self.send_command(STOP_COMMAND).await?;
        if status.is_accepted() && self.state == DeviceState::Started {
            self.state = DeviceState::Stopped;
            info!("{} acquisition stopped", self.family);
        }
        Ok(status)
    }

    /// Reopen both sockets; the session returns to Idle
    pub async fn reset(&mut self) -> TrignoResult<()> {
        warn!("Resetting {} session to {}", self.family, self.config.command_addr());
        let (command, frames) = Self::open(&self.config).await?;
        self.command = command;
        self.frames = frames;
        self.state = DeviceState::Idle;
        Ok(())
    }

    /// Read and decode one frame of `samples` samples over all hardware channels
    pub async fn read(&mut self, samples: usize) -> TrignoResult<SampleMatrix> {
        if self.state != DeviceState::Started {
            return Err(TrignoError::InvalidState {
                operation: "read",
                state: self.state.to_string(),
            });
        }

        let buffer = self.frames.read_frame(samples, self.total_channels).await?;
        let matrix = decode(&buffer, self.total_channels, samples)?;
        debug!("{} frame decoded: {:?}", self.family, matrix.dim());
        Ok(matrix)
    }

    /// Close both sockets
    pub async fn shutdown(self) -> TrignoResult<()> {
        let mut command = self.command.into_inner();
        let mut data = self.frames.into_inner();
        command.shutdown().await?;
        data.shutdown().await?;
        info!("{} session closed", self.family);
        Ok(())
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn total_channels(&self) -> usize {
        self.total_channels
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

async fn connect_with_timeout(addr: &str, connect_timeout: Duration) -> TrignoResult<TcpStream> {
    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TrignoError::connection(addr, format!("timed out after {:?}", connect_timeout)))?
        .map_err(|e| TrignoError::connection(addr, e))?;
    stream
        .set_nodelay(true)
        .map_err(|e| TrignoError::connection(addr, e))?;
    Ok(stream)
}
