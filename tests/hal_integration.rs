// tests/hal_integration.rs
//! Integration tests for the device adapters against the TCU simulator

use std::sync::Arc;
use trigno_core::config::ConnectionConfig;
use trigno_core::hal::simulator::{SimulatorConfig, TcuSimulator};
use trigno_core::hal::{
    ChannelSelection, CommandStatus, DeviceFamily, DeviceState, TrignoAccel, TrignoDevice,
    TrignoEmg, Units,
};
use trigno_core::utils::MockTimeProvider;
use trigno_core::TrignoError;

async fn simulator(config: SimulatorConfig) -> (TcuSimulator, ConnectionConfig) {
    let sim = TcuSimulator::spawn(config).await.expect("Failed to spawn simulator");
    let mut connection = sim.connection_config();
    connection.read_timeout_ms = 300;
    (sim, connection)
}

#[tokio::test]
async fn test_emg_selected_rows_in_order() {
    let (sim, connection) = simulator(SimulatorConfig::default()).await;
    let selection = ChannelSelection::emg(vec![3, 1]).unwrap();
    let mut emg = TrignoEmg::connect(&connection, selection, 270, Units::Volts)
        .await
        .expect("Failed to connect");

    assert_eq!(emg.state(), DeviceState::Idle);
    assert_eq!(emg.start().await.unwrap(), CommandStatus::Accepted);
    assert_eq!(emg.state(), DeviceState::Started);

    for _ in 0..3 {
        let data = emg.read().await.expect("Failed to read");
        assert_eq!(data.dim(), (2, 270));
        for (ch3, ch1) in data.row(0).iter().zip(data.row(1).iter()) {
            assert_eq!(ch3 - ch1, 2000.0);
        }
    }

    assert!(emg.stop().await.unwrap().is_accepted());
    assert_eq!(emg.state(), DeviceState::Stopped);
    assert_eq!(sim.commands(), vec!["START", "STOP"]);
    emg.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_emg_device_info() {
    let (_sim, connection) = simulator(SimulatorConfig::default()).await;
    let emg = TrignoEmg::connect(
        &connection,
        ChannelSelection::emg(vec![1]).unwrap(),
        270,
        Units::Millivolts,
    )
    .await
    .unwrap();

    let info = emg.device_info();
    assert_eq!(info.family, DeviceFamily::Emg);
    assert_eq!(info.total_channels, 16);
    assert_eq!(info.data_port, connection.emg_data_port);
    assert_eq!(info.sampling_rate_hz, 2000.0);
    assert_eq!(emg.scaler(), 1000.0);
}

#[tokio::test]
async fn test_accel_regrouped_with_timestamp() {
    let (_sim, connection) = simulator(SimulatorConfig::default()).await;
    let clock = Arc::new(MockTimeProvider::new(1_700_000_000_000_000_000));
    let mut accel = TrignoAccel::connect(&connection, ChannelSelection::accel(vec![1]).unwrap(), 9)
        .await
        .unwrap()
        .with_time_provider(clock.clone());

    accel.start().await.unwrap();
    let data = accel.read().await.unwrap();

    assert_eq!(data.dim(), (2, 27));
    let row = data.row(0);
    for sample in 0..9 {
        let x = row[3 * sample];
        assert_eq!(row[3 * sample + 1] - x, 1000.0);
        assert_eq!(row[3 * sample + 2] - x, 2000.0);
    }
    assert!(data.row(1).iter().all(|&t| t == 1_700_000_000.0));
    assert_eq!(accel.sampling_rate(), 148.1);
}

#[tokio::test]
async fn test_read_before_start_is_invalid_state() {
    let (_sim, connection) = simulator(SimulatorConfig::default()).await;
    let mut emg = TrignoEmg::connect(
        &connection,
        ChannelSelection::emg(vec![1]).unwrap(),
        270,
        Units::Volts,
    )
    .await
    .unwrap();

    assert!(matches!(
        emg.read().await,
        Err(TrignoError::InvalidState { operation: "read", .. })
    ));
}

#[tokio::test]
async fn test_rejected_start_is_reported_not_raised() {
    let (sim, connection) = simulator(SimulatorConfig {
        reject_commands: true,
        ..SimulatorConfig::default()
    })
    .await;
    let mut emg = TrignoEmg::connect(
        &connection,
        ChannelSelection::emg(vec![1]).unwrap(),
        270,
        Units::Volts,
    )
    .await
    .unwrap();

    let status = emg.start().await.expect("Rejection must not be an error");
    match status {
        CommandStatus::Rejected { command, reply } => {
            assert_eq!(command, "START");
            assert!(reply.contains("INVALID"));
        }
        CommandStatus::Accepted => panic!("Expected rejection"),
    }
    assert_eq!(emg.state(), DeviceState::Idle);
    assert!(!sim.is_streaming());
}

#[tokio::test]
async fn test_stalled_stream_disconnects_and_reset_recovers() {
    let (sim, connection) = simulator(SimulatorConfig {
        stall_first_connection_after: Some(100),
        ..SimulatorConfig::default()
    })
    .await;
    let mut emg = TrignoEmg::connect(
        &connection,
        ChannelSelection::emg(vec![2]).unwrap(),
        270,
        Units::Volts,
    )
    .await
    .unwrap();

    emg.start().await.unwrap();
    let err = emg.read().await.expect_err("Stalled stream must disconnect");
    assert!(matches!(
        err,
        TrignoError::DeviceDisconnected {
            received: 100,
            expected: 17_280
        }
    ));
    assert!(err.is_disconnect());

    emg.reset().await.expect("Reset failed");
    assert_eq!(emg.state(), DeviceState::Idle);
    assert!(emg.start().await.unwrap().is_accepted());

    let data = emg.read().await.expect("Read after reset failed");
    assert_eq!(data.dim(), (1, 270));
    assert!(data.row(0).iter().all(|&v| (1000.0..2000.0).contains(&v)));
    assert_eq!(sim.data_connections(), 2);
}

#[tokio::test]
async fn test_connection_failure_on_closed_port() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let connection = ConnectionConfig {
        host: "127.0.0.1".to_string(),
        command_port: port,
        connect_timeout_ms: 500,
        ..ConnectionConfig::default()
    };

    let result = TrignoEmg::connect(
        &connection,
        ChannelSelection::emg(vec![1]).unwrap(),
        270,
        Units::Volts,
    )
    .await;

    match result {
        Err(TrignoError::ConnectionFailure { addr, .. }) => {
            assert_eq!(addr, format!("127.0.0.1:{}", port));
        }
        other => panic!("Expected ConnectionFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_channel_selection_can_change_between_reads() {
    let (_sim, connection) = simulator(SimulatorConfig::default()).await;
    let mut emg = TrignoEmg::connect(
        &connection,
        ChannelSelection::emg(vec![1]).unwrap(),
        27,
        Units::Volts,
    )
    .await
    .unwrap();
    emg.start().await.unwrap();

    assert_eq!(emg.read().await.unwrap().nrows(), 1);
    let count = emg
        .set_channel_selection(ChannelSelection::emg(vec![16, 8, 1]).unwrap())
        .unwrap();
    assert_eq!(count, 3);

    let data = emg.read().await.unwrap();
    assert_eq!(data.nrows(), 3);
    assert_eq!(data[[0, 0]] - data[[2, 0]], 15_000.0);

    assert!(emg.stop().await.expect("STOP failed").is_accepted());
    assert_eq!(emg.state(), DeviceState::Stopped);
}

#[tokio::test]
async fn test_stop_before_start_keeps_idle() {
    let (sim, connection) = simulator(SimulatorConfig::default()).await;
    let mut emg = TrignoEmg::connect(
        &connection,
        ChannelSelection::emg(vec![1]).unwrap(),
        270,
        Units::Volts,
    )
    .await
    .unwrap();

    assert!(emg.stop().await.unwrap().is_accepted());
    assert_eq!(emg.state(), DeviceState::Idle);
    assert_eq!(sim.commands(), vec!["STOP"]);
    assert!(matches!(
        emg.read().await,
        Err(TrignoError::InvalidState { operation: "read", .. })
    ));
}
