//! End-to-end scenarios against a device bound to loopback ports.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use senso_core::protocol::constants::*;
use senso_core::protocol::{BlockHeader, FrameHeader};
use senso_core::transfer::parse_ack;
use senso_core::{
    DeviceConfig, DeviceEvent, DeviceMode, DeviceState, NullDiscovery, RecordingObserver,
    SensoDevice, TransferOutcome,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const SETTLE: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(10);

struct Harness {
    observer: Arc<RecordingObserver>,
    stop: watch::Sender<bool>,
    device: JoinHandle<DeviceState>,
}

impl Harness {
    fn start(config: DeviceConfig) -> Self {
        let observer = Arc::new(RecordingObserver::new());
        let device =
            SensoDevice::with_parts(&config, observer.clone(), Arc::new(NullDiscovery)).unwrap();
        let (stop, shutdown) = watch::channel(false);
        let device = tokio::spawn(async move { device.run(shutdown).await });
        Self {
            observer,
            stop,
            device,
        }
    }

    /// Address of the `nth` (zero based) activation of `mode`.
    async fn mode_started(&self, mode: DeviceMode, nth: usize) -> SocketAddr {
        let starts = |events: &[DeviceEvent]| -> Vec<SocketAddr> {
            events
                .iter()
                .filter_map(|e| match e {
                    DeviceEvent::ModeStarted { mode: m, addr } if *m == mode => Some(*addr),
                    _ => None,
                })
                .collect()
        };
        let events = timeout(WAIT, self.observer.wait_until(|e| starts(e).len() > nth))
            .await
            .expect("mode did not start");
        starts(&events)[nth]
    }

    async fn stop(self) -> DeviceState {
        self.stop.send_replace(true);
        timeout(WAIT, self.device).await.unwrap().unwrap()
    }
}

fn config() -> DeviceConfig {
    DeviceConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        control_port: 0,
        update_port: 0,
        settle_delay_ms: SETTLE.as_millis() as u64,
        advertise: false,
        ..Default::default()
    }
}

fn request(types: &[u16]) -> Vec<u8> {
    let mut frame = FrameHeader::new(PROTOCOL_VERSION, types.len() as u8)
        .to_bytes()
        .to_vec();
    for t in types {
        frame.extend_from_slice(&BlockHeader::new(0, *t).to_bytes());
    }
    frame
}

async fn exchange(client: &UdpSocket, datagram: &[u8]) -> u16 {
    client.send(datagram).await.unwrap();
    let mut buf = [0u8; 16];
    let n = timeout(WAIT, client.recv(&mut buf)).await.unwrap().unwrap();
    parse_ack(&buf[..n]).expect("not an ack")
}

fn data(block: u16, len: usize) -> Vec<u8> {
    let mut datagram = vec![0, 3];
    datagram.extend_from_slice(&block.to_be_bytes());
    datagram.extend(std::iter::repeat_n(0x5A, len));
    datagram
}

#[tokio::test]
async fn test_dfu_round_trip() {
    let harness = Harness::start(config());

    // Application: ENTER_DFU closes the control connection without a reply.
    let control = harness.mode_started(DeviceMode::Application, 0).await;
    let mut driver = TcpStream::connect(control).await.unwrap();
    driver.write_all(&request(&[CMD_ENTER_DFU])).await.unwrap();
    let requested = Instant::now();
    let mut buf = [0u8; 64];
    let n = timeout(WAIT, driver.read(&mut buf)).await.unwrap().unwrap_or(0);
    assert_eq!(n, 0);

    // Bootloader appears after the settle delay.
    let update = harness.mode_started(DeviceMode::Bootloader, 0).await;
    assert!(requested.elapsed() >= SETTLE);

    let uploader = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    uploader.connect(update).await.unwrap();
    assert_eq!(exchange(&uploader, b"\x00\x02firmware.bin\x00octet\x00").await, 0);
    assert_eq!(exchange(&uploader, &data(1, 596)).await, 1);
    assert_eq!(exchange(&uploader, &data(2, 100)).await, 2);

    // Back to Application on a fresh listener.
    let control = harness.mode_started(DeviceMode::Application, 1).await;
    assert!(harness.observer.events().contains(&DeviceEvent::TransferFinished {
        outcome: TransferOutcome::Completed { bytes_received: 696 }
    }));

    let mut driver = TcpStream::connect(control).await.unwrap();
    driver.write_all(&request(&[CMD_GET_DEV_INFO])).await.unwrap();
    let mut response = vec![0u8; FRAME_HEADER_SIZE + BLOCK_HEADER_SIZE + DEV_INFO_BLOCK_LENGTH];
    timeout(WAIT, driver.read_exact(&mut response)).await.unwrap().unwrap();
    let payload = &response[FRAME_HEADER_SIZE + BLOCK_HEADER_SIZE..];
    assert_eq!(&payload[..11], b"10-00000000");
    assert_eq!(&payload[16..22], &[0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]);

    let state = harness.stop().await;
    assert_eq!(state.mode(), DeviceMode::Application);
    assert_eq!(state.transitions(), 2);
}

#[tokio::test]
async fn test_out_of_order_block_is_dropped() {
    let harness = Harness::start(DeviceConfig {
        start_in_dfu: true,
        ..config()
    });
    let update = harness.mode_started(DeviceMode::Bootloader, 0).await;

    let uploader = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    uploader.connect(update).await.unwrap();
    assert_eq!(exchange(&uploader, &[0, 2]).await, 0);

    // Block 2 before block 1 gets no reply; block 1 is still expected.
    uploader.send(&data(2, 10)).await.unwrap();
    assert_eq!(exchange(&uploader, &data(1, 10)).await, 1);

    harness.mode_started(DeviceMode::Application, 0).await;
    assert!(harness.observer.events().contains(&DeviceEvent::TransferFinished {
        outcome: TransferOutcome::Completed { bytes_received: 10 }
    }));
    harness.stop().await;
}

#[tokio::test]
async fn test_multiple_commands_single_response() {
    let harness = Harness::start(config());
    let control = harness.mode_started(DeviceMode::Application, 0).await;

    let mut driver = TcpStream::connect(control).await.unwrap();
    driver
        .write_all(&request(&[CMD_GET_STATUS, 0x0042]))
        .await
        .unwrap();

    let len = FRAME_HEADER_SIZE
        + BLOCK_HEADER_SIZE
        + STATUS_BLOCK_LENGTH
        + BLOCK_HEADER_SIZE
        + STANDARD_BLOCK_LENGTH;
    let mut response = vec![0u8; len];
    timeout(WAIT, driver.read_exact(&mut response)).await.unwrap().unwrap();
    assert_eq!(response[1], 2);

    let second = FRAME_HEADER_SIZE + BLOCK_HEADER_SIZE + STATUS_BLOCK_LENGTH;
    let header = BlockHeader::from_bytes(&response[second..]).unwrap();
    assert_eq!(header, BlockHeader::new(24, 0x8042));

    let state = harness.stop().await;
    assert_eq!(state.transitions(), 0);
}

#[tokio::test]
async fn test_recording_streams_sensor_frames() {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let frame = |fill: u8, data_type: u8| {
        let mut frame = vec![fill; 20];
        frame[DATA_TYPE_OFFSET] = data_type;
        frame
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.dat");
    std::fs::write(
        &path,
        format!(
            "5,{}\n5,{}\n5,{}\n",
            STANDARD.encode(frame(1, DATA_TYPE_SENSOR)),
            STANDARD.encode(frame(2, 0x01)),
            STANDARD.encode(frame(3, DATA_TYPE_SENSOR)),
        ),
    )
    .unwrap();

    let harness = Harness::start(DeviceConfig {
        recording: Some(path),
        replay_loop: false,
        ..config()
    });
    let control = harness.mode_started(DeviceMode::Application, 0).await;
    let mut driver = TcpStream::connect(control).await.unwrap();

    let mut pushed = vec![0u8; 40];
    timeout(WAIT, driver.read_exact(&mut pushed)).await.unwrap().unwrap();
    assert_eq!(&pushed[..20], frame(1, DATA_TYPE_SENSOR).as_slice());
    assert_eq!(&pushed[20..], frame(3, DATA_TYPE_SENSOR).as_slice());

    harness.stop().await;
}
