// src/acquisition/runner.rs
//! Acquisition loops and the harness that drives them on tokio tasks

use crate::acquisition::recorder::CsvRecorder;
use crate::config::constants::recording::{LABEL_COLUMN, TIMESTAMP_COLUMN};
use crate::config::SystemConfig;
use crate::error::{TrignoError, TrignoResult};
use crate::hal::accel::TrignoAccel;
use crate::hal::emg::TrignoEmg;
use crate::hal::traits::TrignoDevice;
use crate::hal::types::{channel_header, DeviceFamily};
use crate::utils::time::TimeProvider;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Cooperative cancellation flag shared between a controller and its loops
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Summary of one finished acquisition loop
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionReport {
    pub family: DeviceFamily,
    pub reads: u64,
    pub rows_written: u64,
    pub reconnects: u32,
    pub elapsed: Duration,
}

/// Read/record loop owning one device and its recorder
///
/// A disconnect triggers `reset` + `start` up to `max_reconnects` times; any
/// other error ends the loop. A disconnect observed once the stop signal is
/// raised ends the loop cleanly, since START/STOP are global to the TCU and a
/// sibling loop's `STOP` cuts the stream mid-frame. Buffered rows are flushed
/// and `STOP` is sent on every exit path.
#[derive(Debug)]
pub struct AcquisitionLoop<D> {
    device: D,
    recorder: CsvRecorder,
    stop: StopSignal,
    poll_interval: Duration,
    max_reconnects: u32,
}

impl<D: TrignoDevice> AcquisitionLoop<D> {
    pub fn new(device: D, recorder: CsvRecorder, stop: StopSignal) -> Self {
        Self {
            device,
            recorder,
            stop,
            poll_interval: Duration::ZERO,
            max_reconnects: 0,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_reconnects(mut self, max_reconnects: u32) -> Self {
        self.max_reconnects = max_reconnects;
        self
    }

    pub async fn run(&mut self) -> TrignoResult<AcquisitionReport> {
        let started = Instant::now();
        let family = self.device.device_info().family;
        let mut report = AcquisitionReport {
            family,
            reads: 0,
            rows_written: 0,
            reconnects: 0,
            elapsed: Duration::ZERO,
        };

        self.device.start().await?.into_result()?;

        let outcome = self.poll(&mut report).await;
        let flushed = self.recorder.flush();
        let stopped = self.device.stop().await;

        report.rows_written = self.recorder.rows_written();
        report.elapsed = started.elapsed();

        if let Err(e) = &outcome {
            error!("{} acquisition ended with error: {}", family, e);
        }
        outcome?;
        flushed?;
        stopped?;

        info!(
            "{} acquisition finished: {} reads, {} rows, {} reconnects",
            family, report.reads, report.rows_written, report.reconnects
        );
        Ok(report)
    }

    async fn poll(&mut self, report: &mut AcquisitionReport) -> TrignoResult<()> {
        while !self.stop.is_stopped() {
            match self.device.read().await {
                Ok(data) => {
                    self.recorder.push(&data)?;
                    report.reads += 1;
                }
                Err(e) if e.is_disconnect() && self.stop.is_stopped() => {
                    info!("{} stream ended after stop request: {}", report.family, e);
                    break;
                }
                Err(e) if e.is_disconnect() && report.reconnects < self.max_reconnects => {
                    report.reconnects += 1;
                    warn!(
                        "{} disconnected ({}), reconnect {}/{}",
                        report.family, e, report.reconnects, self.max_reconnects
                    );
                    self.device.reset().await?;
                    self.device.start().await?.into_result()?;
                }
                Err(e) => return Err(e),
            }

            if !self.poll_interval.is_zero() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        Ok(())
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

/// One acquisition loop per enabled device family, each on its own task
#[derive(Debug)]
pub struct AcquisitionHarness {
    stop: StopSignal,
    families: Vec<DeviceFamily>,
    tasks: JoinSet<TrignoResult<AcquisitionReport>>,
}

impl AcquisitionHarness {
    /// Connect every enabled adapter and start recording
    pub async fn launch(config: &SystemConfig) -> TrignoResult<Self> {
        Self::launch_inner(config, None).await
    }

    /// Like [`launch`](Self::launch) with an explicit clock for the accelerometer timestamp row
    pub async fn launch_with_time_provider(
        config: &SystemConfig,
        time_provider: Arc<dyn TimeProvider>,
    ) -> TrignoResult<Self> {
        Self::launch_inner(config, Some(time_provider)).await
    }

    async fn launch_inner(
        config: &SystemConfig,
        time_provider: Option<Arc<dyn TimeProvider>>,
    ) -> TrignoResult<Self> {
        config.validate()?;
        let rec = &config.recording;
        std::fs::create_dir_all(&rec.output_dir)?;

        let stop = StopSignal::new();
        let mut families = Vec::new();
        let mut tasks = JoinSet::new();

        // Connect everything before spawning so a failure leaves nothing running
        let emg = if config.emg.enabled {
            let device = TrignoEmg::from_config(config).await?;
            let header = channel_header(device.channel_selection(), LABEL_COLUMN);
            let recorder =
                CsvRecorder::create(rec.emg_path(), header, rec.batch_size)?.with_label(rec.label_value);
            Some((device, recorder))
        } else {
            None
        };

        let accel = if config.accel.enabled {
            let mut device = TrignoAccel::from_config(config).await?;
            if let Some(time_provider) = time_provider {
                device = device.with_time_provider(time_provider);
            }
            let header = channel_header(device.channel_selection(), TIMESTAMP_COLUMN);
            let recorder = CsvRecorder::create(rec.imu_path(), header, rec.batch_size)?;
            Some((device, recorder))
        } else {
            None
        };

        if let Some((device, recorder)) = emg {
            spawn_loop(&mut tasks, device, recorder, &stop, config);
            families.push(DeviceFamily::Emg);
        }
        if let Some((device, recorder)) = accel {
            spawn_loop(&mut tasks, device, recorder, &stop, config);
            families.push(DeviceFamily::Accel);
        }

        info!("Acquisition harness running {} loop(s)", families.len());
        Ok(Self {
            stop,
            families,
            tasks,
        })
    }

    /// Ask every loop to finish after its current read
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn families(&self) -> Vec<DeviceFamily> {
        self.families.clone()
    }

    /// Wait for every loop in completion order; the first failure is returned after all loops end
    pub async fn join(mut self) -> TrignoResult<Vec<AcquisitionReport>> {
        let mut reports = Vec::with_capacity(self.families.len());
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(TrignoError::Task(format!("acquisition loop: {}", e))),
            };
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    // Whichever family fails first ends the session for the others
                    self.stop.stop();
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        let families = &self.families;
        reports.sort_by_key(|report| families.iter().position(|f| *f == report.family));
        Ok(reports)
    }
}

fn spawn_loop<D>(
    tasks: &mut JoinSet<TrignoResult<AcquisitionReport>>,
    device: D,
    recorder: CsvRecorder,
    stop: &StopSignal,
    config: &SystemConfig,
) where
    D: TrignoDevice + 'static,
{
    let mut acquisition = AcquisitionLoop::new(device, recorder, stop.clone())
        .with_poll_interval(config.recording.poll_interval())
        .with_max_reconnects(config.recording.max_reconnects);
    tasks.spawn(async move { acquisition.run().await });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::types::{ChannelSelection, CommandStatus, DeviceInfo, DeviceState, SampleMatrix};
    use async_trait::async_trait;
    use ndarray::Array2;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    /// Scripted device: each read pops the next outcome; the stop signal is
    /// raised after the last successful read, or before read `stop_at_read`
    struct ScriptedDevice {
        selection: ChannelSelection,
        reads: VecDeque<TrignoResult<SampleMatrix>>,
        read_count: usize,
        stop_at_read: Option<usize>,
        stop: StopSignal,
        state: DeviceState,
        resets: u32,
        commands: Vec<&'static str>,
    }

    impl ScriptedDevice {
        fn new(reads: Vec<TrignoResult<SampleMatrix>>, stop: StopSignal) -> Self {
            Self {
                selection: ChannelSelection::emg(vec![1]).unwrap(),
                reads: reads.into(),
                read_count: 0,
                stop_at_read: None,
                stop,
                state: DeviceState::Idle,
                resets: 0,
                commands: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl TrignoDevice for ScriptedDevice {
        async fn start(&mut self) -> TrignoResult<CommandStatus> {
            self.commands.push("START");
            self.state = DeviceState::Started;
            Ok(CommandStatus::Accepted)
        }

        async fn stop(&mut self) -> TrignoResult<CommandStatus> {
            self.commands.push("STOP");
            self.state = DeviceState::Stopped;
            Ok(CommandStatus::Accepted)
        }

        async fn reset(&mut self) -> TrignoResult<()> {
            self.resets += 1;
            self.state = DeviceState::Idle;
            Ok(())
        }

        async fn read(&mut self) -> TrignoResult<SampleMatrix> {
            self.read_count += 1;
            let next = self
                .reads
                .pop_front()
                .unwrap_or_else(|| Ok(Array2::zeros((1, 2))));
            let last_ok = self.reads.is_empty() && next.is_ok();
            if last_ok || self.stop_at_read == Some(self.read_count) {
                self.stop.stop();
            }
            next
        }

        fn set_channel_selection(&mut self, selection: ChannelSelection) -> TrignoResult<usize> {
            self.selection = selection;
            Ok(self.selection.len())
        }

        fn channel_selection(&self) -> &ChannelSelection {
            &self.selection
        }

        fn state(&self) -> DeviceState {
            self.state
        }

        fn device_info(&self) -> DeviceInfo {
            DeviceInfo {
                family: DeviceFamily::Emg,
                host: "scripted".to_string(),
                command_port: 0,
                data_port: 0,
                total_channels: 16,
                samples_per_read: 2,
                sampling_rate_hz: 2000.0,
            }
        }
    }

    fn disconnect() -> TrignoResult<SampleMatrix> {
        Err(TrignoError::DeviceDisconnected {
            received: 0,
            expected: 128,
        })
    }

    fn recorder(dir: &tempfile::TempDir) -> CsvRecorder {
        CsvRecorder::create(
            dir.path().join("emg.csv"),
            vec!["ch1".to_string(), "label".to_string()],
            10,
        )
        .unwrap()
        .with_label(1.0)
    }

    #[test]
    fn test_stop_signal_is_shared() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_stopped());
        signal.stop();
        assert!(clone.is_stopped());
    }

    #[tokio::test]
    async fn test_loop_flushes_and_stops_on_exit() {
        let dir = tempdir().unwrap();
        let stop = StopSignal::new();
        let device = ScriptedDevice::new(
            vec![Ok(Array2::zeros((1, 2))), Ok(Array2::ones((1, 2)))],
            stop.clone(),
        );

        let mut acquisition = AcquisitionLoop::new(device, recorder(&dir), stop);
        let report = acquisition.run().await.unwrap();

        assert_eq!(report.reads, 2);
        assert_eq!(report.rows_written, 4);
        assert_eq!(report.reconnects, 0);
        assert_eq!(acquisition.device().commands, vec!["START", "STOP"]);
        assert_eq!(acquisition.device().state(), DeviceState::Stopped);
    }

    #[tokio::test]
    async fn test_disconnect_without_budget_is_returned() {
        let dir = tempdir().unwrap();
        let stop = StopSignal::new();
        let device = ScriptedDevice::new(vec![Ok(Array2::zeros((1, 2))), disconnect()], stop.clone());

        let mut acquisition = AcquisitionLoop::new(device, recorder(&dir), stop);
        let result = acquisition.run().await;

        assert!(matches!(result, Err(TrignoError::DeviceDisconnected { .. })));
        // buffered rows from the first read still reach the file
        let content = std::fs::read_to_string(dir.path().join("emg.csv")).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(acquisition.device().commands.last(), Some(&"STOP"));
    }

    #[tokio::test]
    async fn test_disconnect_triggers_reset_and_restart() {
        let dir = tempdir().unwrap();
        let stop = StopSignal::new();
        let device = ScriptedDevice::new(
            vec![disconnect(), Ok(Array2::zeros((1, 2)))],
            stop.clone(),
        );

        let mut acquisition =
            AcquisitionLoop::new(device, recorder(&dir), stop).with_max_reconnects(1);
        let report = acquisition.run().await.unwrap();

        assert_eq!(report.reconnects, 1);
        assert_eq!(report.reads, 1);
        let device = acquisition.into_device();
        assert_eq!(device.resets, 1);
        assert_eq!(device.commands, vec!["START", "START", "STOP"]);
    }

    #[tokio::test]
    async fn test_disconnect_after_stop_request_ends_cleanly() {
        let dir = tempdir().unwrap();
        let stop = StopSignal::new();
        let mut device = ScriptedDevice::new(vec![Ok(Array2::zeros((1, 2))), disconnect()], stop.clone());
        // a sibling loop's STOP lands while this read is in flight
        device.stop_at_read = Some(2);

        let mut acquisition = AcquisitionLoop::new(device, recorder(&dir), stop);
        let report = acquisition.run().await.expect("Stop-induced disconnect is a clean exit");

        assert_eq!(report.reads, 1);
        assert_eq!(report.rows_written, 2);
        assert_eq!(report.reconnects, 0);
        let device = acquisition.into_device();
        assert_eq!(device.resets, 0);
        assert_eq!(device.commands, vec!["START", "STOP"]);
    }
}
