// src/hal/simulator.rs
//! In-process Trigno Control Utility emulator
//!
//! Binds a command listener plus EMG and accelerometer data listeners on
//! ephemeral localhost ports and speaks the TCU protocol: greeting on connect,
//! `OK` replies to terminated commands, and a float stream on each data port
//! while started. Sample values encode their origin as
//! `channel * 1000 + (sample % 1000)` so tests can identify rows.
//!
//! The first data connection (optionally of one family only) can be made to
//! stall after a number of bytes, which the client observes as a receive
//! timeout mid-frame.

use crate::config::constants::protocol::{CMD_TERM, START_COMMAND, STOP_COMMAND};
use crate::config::ConnectionConfig;
use crate::hal::frame::encode_frame;
use crate::hal::types::DeviceFamily;
use ndarray::Array2;
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

pub const DEFAULT_GREETING: &str = "Delsys Trigno System Digital Protocol Version 3.6.0 \r\n\r\n";
const REPLY_OK: &str = "OK\r\n\r\n";
const REPLY_INVALID: &str = "INVALID COMMAND\r\n\r\n";

/// Simulator behavior
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub greeting: String,
    /// Answer every command with `INVALID COMMAND`
    pub reject_commands: bool,
    /// Samples written per socket write
    pub samples_per_chunk: usize,
    /// Pause between chunks; `None` streams as fast as the socket accepts
    pub chunk_interval: Option<Duration>,
    /// Stop writing (but keep the socket open) after this many bytes on the first data connection
    pub stall_first_connection_after: Option<usize>,
    /// Apply the stall to the first connection of this family instead of the first overall
    pub stall_family: Option<DeviceFamily>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            reject_commands: false,
            samples_per_chunk: 27,
            chunk_interval: None,
            stall_first_connection_after: None,
            stall_family: None,
        }
    }
}

/// Value streamed for `channel` (0-based) at `sample`
pub fn sample_value(channel: usize, sample: u64) -> f32 {
    (channel * 1000) as f32 + (sample % 1000) as f32
}

#[derive(Debug)]
struct SimState {
    config: SimulatorConfig,
    streaming: watch::Sender<bool>,
    commands: Mutex<Vec<String>>,
    data_connections: AtomicUsize,
    emg_connections: AtomicUsize,
    accel_connections: AtomicUsize,
}

impl SimState {
    fn family_connections(&self, family: DeviceFamily) -> &AtomicUsize {
        match family {
            DeviceFamily::Emg => &self.emg_connections,
            DeviceFamily::Accel => &self.accel_connections,
        }
    }

    fn handle_command(&self, command: &str) -> &'static str {
        self.commands.lock().push(command.to_string());

        if self.config.reject_commands {
            return REPLY_INVALID;
        }

        match command {
            START_COMMAND => {
                self.streaming.send_replace(true);
                REPLY_OK
            }
            STOP_COMMAND => {
                self.streaming.send_replace(false);
                REPLY_OK
            }
            _ => REPLY_INVALID,
        }
    }
}

/// Running TCU emulator; all listeners shut down on drop
pub struct TcuSimulator {
    command_addr: SocketAddr,
    emg_addr: SocketAddr,
    accel_addr: SocketAddr,
    state: Arc<SimState>,
    tasks: Vec<JoinHandle<()>>,
}

impl TcuSimulator {
    pub async fn spawn(config: SimulatorConfig) -> io::Result<Self> {
        let command_listener = TcpListener::bind("127.0.0.1:0").await?;
        let emg_listener = TcpListener::bind("127.0.0.1:0").await?;
        let accel_listener = TcpListener::bind("127.0.0.1:0").await?;

        let (streaming, _) = watch::channel(false);
        let state = Arc::new(SimState {
            config,
            streaming,
            commands: Mutex::new(Vec::new()),
            data_connections: AtomicUsize::new(0),
            emg_connections: AtomicUsize::new(0),
            accel_connections: AtomicUsize::new(0),
        });

        let command_addr = command_listener.local_addr()?;
        let emg_addr = emg_listener.local_addr()?;
        let accel_addr = accel_listener.local_addr()?;

        let command_state = state.clone();
        let emg_state = state.clone();
        let accel_state = state.clone();
        let tasks = vec![
            tokio::spawn(accept_loop(command_listener, move |stream| {
                serve_commands(stream, command_state.clone())
            })),
            tokio::spawn(accept_loop(emg_listener, move |stream| {
                serve_data(stream, DeviceFamily::Emg, emg_state.clone())
            })),
            tokio::spawn(accept_loop(accel_listener, move |stream| {
                serve_data(stream, DeviceFamily::Accel, accel_state.clone())
            })),
        ];

        info!(
            "TCU simulator listening: command {}, EMG {}, ACC {}",
            command_addr, emg_addr, accel_addr
        );

        Ok(Self {
            command_addr,
            emg_addr,
            accel_addr,
            state,
            tasks,
        })
    }

    /// Connection settings pointing at this simulator
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.command_addr.ip().to_string(),
            command_port: self.command_addr.port(),
            emg_data_port: self.emg_addr.port(),
            accel_data_port: self.accel_addr.port(),
            ..ConnectionConfig::default()
        }
    }

    pub fn command_addr(&self) -> SocketAddr {
        self.command_addr
    }

    pub fn data_addr(&self, family: DeviceFamily) -> SocketAddr {
        match family {
            DeviceFamily::Emg => self.emg_addr,
            DeviceFamily::Accel => self.accel_addr,
        }
    }

    /// Commands received so far, without terminators
    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().clone()
    }

    pub fn is_streaming(&self) -> bool {
        *self.state.streaming.borrow()
    }

    /// Data connections accepted across both data ports
    pub fn data_connections(&self) -> usize {
        self.state.data_connections.load(Ordering::SeqCst)
    }
}

impl Drop for TcuSimulator {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

// Aborting the accept task drops the JoinSet, which aborts every connection
async fn accept_loop<F, Fut>(listener: TcpListener, handler: F)
where
    F: Fn(TcpStream) -> Fut,
    Fut: Future<Output = io::Result<()>> + Send + 'static,
{
    let mut connections = JoinSet::new();
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("Simulator accepted {}", peer);
                let connection = handler(stream);
                connections.spawn(async move {
                    if let Err(e) = connection.await {
                        debug!("Simulator connection from {} ended: {}", peer, e);
                    }
                });
            }
            Err(e) => debug!("Simulator accept failed: {}", e),
        }
    }
}

async fn serve_commands(mut stream: TcpStream, state: Arc<SimState>) -> io::Result<()> {
    stream.write_all(state.config.greeting.as_bytes()).await?;

    let terminator = CMD_TERM.as_bytes();
    let mut pending = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        pending.extend_from_slice(&buf[..n]);

        while let Some(pos) = pending
            .windows(terminator.len())
            .position(|window| window == terminator)
        {
            let command = String::from_utf8_lossy(&pending[..pos]).trim().to_string();
            pending.drain(..pos + terminator.len());
            let reply = state.handle_command(&command);
            stream.write_all(reply.as_bytes()).await?;
        }
    }
}

async fn serve_data(mut stream: TcpStream, family: DeviceFamily, state: Arc<SimState>) -> io::Result<()> {
    let connection_index = state.data_connections.fetch_add(1, Ordering::SeqCst);
    let family_index = state.family_connections(family).fetch_add(1, Ordering::SeqCst);
    let stalls = match state.config.stall_family {
        Some(stalled) => stalled == family && family_index == 0,
        None => connection_index == 0,
    };
    let stall_after = state.config.stall_first_connection_after.filter(|_| stalls);

    let mut streaming = state.streaming.subscribe();
    let channels = family.total_channels();
    let chunk_samples = state.config.samples_per_chunk.max(1);
    let mut next_sample: u64 = 0;
    let mut written = 0usize;

    loop {
        if !*streaming.borrow_and_update() {
            if streaming.changed().await.is_err() {
                return Ok(());
            }
            continue;
        }

        let chunk = Array2::from_shape_fn((channels, chunk_samples), |(c, s)| {
            sample_value(c, next_sample + s as u64) as f64
        });
        next_sample += chunk_samples as u64;
        let bytes = encode_frame(&chunk);

        let limit = match stall_after {
            Some(limit) => limit.saturating_sub(written).min(bytes.len()),
            None => bytes.len(),
        };
        if limit == 0 {
            debug!("Simulator {} stream stalled after {} bytes", family, written);
            std::future::pending::<()>().await;
        }

        stream.write_all(&bytes[..limit]).await?;
        written += limit;

        match state.config.chunk_interval {
            Some(interval) => tokio::time::sleep(interval).await,
            None => tokio::task::yield_now().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_value_encodes_channel() {
        assert_eq!(sample_value(0, 0), 0.0);
        assert_eq!(sample_value(2, 5), 2005.0);
        assert_eq!(sample_value(47, 1999), 47999.0);
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let sim = TcuSimulator::spawn(SimulatorConfig::default()).await.unwrap();
        let mut stream = TcpStream::connect(sim.command_addr()).await.unwrap();

        let mut greeting = vec![0u8; DEFAULT_GREETING.len()];
        stream.read_exact(&mut greeting).await.unwrap();
        assert_eq!(greeting, DEFAULT_GREETING.as_bytes());

        stream.write_all(b"START\r\n\r\n").await.unwrap();
        let mut reply = vec![0u8; REPLY_OK.len()];
        stream.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, REPLY_OK.as_bytes());

        assert!(sim.is_streaming());
        assert_eq!(sim.commands(), vec!["START".to_string()]);
    }
}
