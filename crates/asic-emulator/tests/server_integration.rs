//! End-to-end exchanges with a live emulator server over loopback TCP.

use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use asic_emulator::codec::{read_frame, write_frame};
use asic_emulator::{
    AsicDevice, ClientError, EmulatorClient, EmulatorConfig, EmulatorServer, Frame, ServerStatus,
};
use asic_model::{Page, Register};
use crossbeam_channel as _;
use parking_lot as _;
use proptest as _;
use rand as _;
use rstest::rstest;
use serde as _;
use tempfile as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

const TIMEOUT: Duration = Duration::from_secs(5);

fn start_server() -> EmulatorServer {
    EmulatorServer::bind(&EmulatorConfig {
        endpoint: "127.0.0.1:0".to_string(),
        log_register_writes: true,
    })
    .expect("server binds an ephemeral port")
}

fn connect(server: &EmulatorServer) -> EmulatorClient {
    let client = EmulatorClient::connect(&server.local_addr().to_string()).expect("client connects");
    client.set_timeout(Some(TIMEOUT)).expect("timeout accepted");
    client
}

fn wait_for_status(server: &EmulatorServer, accept: impl Fn(&ServerStatus) -> bool) -> ServerStatus {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let status = server.status();
        if accept(&status) || Instant::now() > deadline {
            return status;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn read_returns_power_on_defaults() {
    let server = start_server();
    let mut client = connect(&server);

    let response = client
        .read(vec![Register::FrmLngth.address(), 0, 0])
        .expect("read succeeds");

    assert_eq!(response, vec![0x85, 200, 1]);
}

#[test]
fn write_clears_rw_bit_and_updates_model() {
    let server = start_server();
    let mut client = connect(&server);

    let response = client
        .write(vec![0x80 | Register::IntTime.address(), 7])
        .expect("write succeeds");

    assert_eq!(response, vec![Register::IntTime.address(), 7]);
    let registers = server.registers().expect("processor running");
    assert_eq!(registers[Register::IntTime.index()], 7);
}

#[test]
fn malformed_request_does_not_stop_other_clients() {
    let server = start_server();
    let mut faulty = connect(&server);
    let mut healthy = connect(&server);

    assert_eq!(faulty.transfer(&[]).expect("empty transaction absorbed"), Vec::<u8>::new());
    assert_eq!(
        faulty.transfer(&[0x01]).expect("payload-less write absorbed"),
        vec![0x01]
    );

    let response = healthy.read(vec![0, 0]).expect("healthy client served");
    assert_eq!(response, vec![0x80, 0x50]);
}

#[rstest]
#[case(b"not a transaction")]
#[case(b"[1, 2, 999]")]
fn undecodable_payloads_are_echoed_verbatim(#[case] payload: &[u8]) {
    let server = start_server();
    let mut stream = TcpStream::connect(server.local_addr()).expect("raw connect");
    stream.set_read_timeout(Some(TIMEOUT)).expect("timeout accepted");
    let request = Frame {
        identity: b"raw-client".to_vec(),
        payload: payload.to_vec(),
    };

    write_frame(&mut stream, &request).expect("frame sent");
    let reply = read_frame(&mut stream).expect("reply read").expect("reply frame");

    assert_eq!(reply, request);
    assert_eq!(
        server.snapshot().expect("processor running"),
        asic_model::RegisterModel::default().snapshot()
    );
}

#[test]
fn clients_share_one_device_state() {
    let server = start_server();
    let mut first = connect(&server);
    let mut second = connect(&server);

    first.write(vec![0, 0x51]).expect("page select");
    first.write(vec![3, 0xAA]).expect("page 1 write");

    let response = second.read(vec![3, 0]).expect("read on shared page");
    assert_eq!(response, vec![0x83, 0xAA]);

    let snapshot = server.snapshot().expect("processor running");
    assert_eq!(snapshot.page, Page::Page1);
    assert_eq!(snapshot.registers[3 + 128], 0xAA);
    assert_eq!(snapshot.registers[3], 0);
}

#[test]
fn concurrent_clients_are_serialized() {
    let server = start_server();
    let endpoint = server.local_addr().to_string();

    let workers: Vec<_> = (0..4_u8)
        .map(|worker| {
            let endpoint = endpoint.clone();
            thread::spawn(move || {
                let mut client = EmulatorClient::connect(&endpoint).expect("client connects");
                client.set_timeout(Some(TIMEOUT)).expect("timeout accepted");
                let address = 20 + worker * 4;
                for round in 0..25_u8 {
                    let values = [round, round, round, round];
                    let mut transaction = vec![address];
                    transaction.extend_from_slice(&values);
                    client.write(transaction).expect("write succeeds");

                    let response = client.read(vec![address, 0, 0, 0, 0]).expect("read succeeds");
                    assert_eq!(&response[1..], &values);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker finished cleanly");
    }

    let registers = server.registers().expect("processor running");
    assert!(registers[20..36].iter().all(|value| *value == 24));
}

#[test]
fn status_tracks_connects_and_disconnects() {
    let server = start_server();
    assert_eq!(
        server.status(),
        ServerStatus {
            connected: false,
            clients: Vec::new(),
        }
    );

    let first = connect(&server);
    let second = connect(&server);
    let status = wait_for_status(&server, |status| status.clients.len() == 2);
    assert!(status.connected);
    assert_eq!(status.clients.len(), 2);
    assert_eq!(server.connected_clients().len(), 2);

    drop(first);
    let status = wait_for_status(&server, |status| status.clients.len() == 1);
    assert_eq!(status.clients.len(), 1);

    drop(second);
    let status = wait_for_status(&server, |status| !status.connected);
    assert!(status.clients.is_empty());
}

#[test]
fn status_serializes_for_introspection() {
    let status = ServerStatus {
        connected: true,
        clients: vec!["127.0.0.1:40000".to_string()],
    };

    let json = serde_json::to_string(&status).expect("status serializes");

    assert_eq!(json, r#"{"connected":true,"clients":["127.0.0.1:40000"]}"#);
}

#[test]
fn device_helper_switches_pages_for_full_addresses() {
    let server = start_server();
    let mut device = AsicDevice::new(connect(&server));

    device
        .write_register(Register::SerBias1.address(), 0x3C)
        .expect("page 1 write");
    assert_eq!(device.page(), Page::Page1);

    device
        .write_register(Register::GlobVal1.address(), 0x11)
        .expect("page 0 write");
    assert_eq!(device.page(), Page::Page0);

    assert_eq!(
        device.read_register(Register::SerBias1.address()).expect("page 1 read"),
        0x3C
    );
    assert_eq!(
        device.read_register(Register::GlobVal1.address()).expect("page 0 read"),
        0x11
    );

    let snapshot = server.snapshot().expect("processor running");
    assert_eq!(snapshot.registers[Register::SerBias1.index()], 0x3C);
    assert_eq!(snapshot.page, Page::Page0);
    assert_eq!(snapshot.registers[Register::Config1.index()], 0x50);
}

#[test]
fn device_helper_reselects_page_after_external_reset() {
    let server = start_server();
    let mut device = AsicDevice::new(connect(&server));
    let mut other = connect(&server);

    device
        .write_register(Register::SerBias1.address(), 0x3C)
        .expect("page 1 write");
    assert_eq!(device.page(), Page::Page1);

    other
        .write(vec![Register::Config1.address(), 0x50])
        .expect("page 0 selected elsewhere");
    device.reset_page();
    assert_eq!(device.page(), Page::Page0);

    assert_eq!(
        device.read_register(Register::SerBias1.address()).expect("page 1 read"),
        0x3C
    );
    assert_eq!(device.page(), Page::Page1);
}

#[test]
fn device_helper_exposes_client_identity() {
    let server = start_server();
    let device = AsicDevice::new(connect(&server));

    let identity = device.client().identity();

    assert_eq!(identity.len(), 9);
    assert_eq!(identity.as_bytes()[4], b'-');
    assert!(identity
        .chars()
        .filter(|c| *c != '-')
        .all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn late_reply_closes_the_client() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("stub binds");
    let endpoint = listener.local_addr().expect("stub address").to_string();
    let stub = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("stub accepts");
        let request = read_frame(&mut stream).expect("request read").expect("request frame");
        thread::sleep(Duration::from_millis(300));
        let _ = write_frame(&mut stream, &request.reply(b"[128,170]".to_vec()));
    });

    let mut client = EmulatorClient::connect(&endpoint).expect("client connects");
    client
        .set_timeout(Some(Duration::from_millis(100)))
        .expect("timeout accepted");

    let err = client.read(vec![0, 0]).expect_err("reply arrives too late");
    assert!(matches!(err, ClientError::Codec(_)), "{err:?}");
    assert!(client.is_closed());

    let err = client.read(vec![0, 0]).expect_err("client stays closed");
    assert!(matches!(err, ClientError::Disconnected), "{err:?}");
    assert!(matches!(
        client.set_timeout(None),
        Err(ClientError::Disconnected)
    ));

    stub.join().expect("stub finished");
}

#[test]
fn device_helper_bursts_and_bit_operations() {
    let server = start_server();
    let mut device = AsicDevice::new(connect(&server));
    let start = Register::SegControl1Ser.address();

    device.burst_write(start, &[1, 2, 3, 4, 5]).expect("burst write");
    assert_eq!(device.burst_read(start, 5).expect("burst read"), vec![1, 2, 3, 4, 5]);

    device
        .set_register_bit(Register::Config1.address(), 0b0000_0100)
        .expect("set bit");
    assert_eq!(device.read_register(0).expect("read config"), 0x54);

    device
        .clear_register_bit(Register::Config1.address(), 0b0100_0000)
        .expect("clear bit");
    assert_eq!(device.read_register(0).expect("read config"), 0x14);
}

#[test]
fn shutdown_closes_client_connections() {
    let server = start_server();
    let mut client = connect(&server);
    client.read(vec![0, 0]).expect("served before shutdown");

    server.shutdown();

    let err = client.read(vec![0, 0]).expect_err("server is gone");
    assert!(matches!(
        err,
        ClientError::Disconnected | ClientError::Codec(_)
    ));
}

#[test]
fn bind_reports_unusable_endpoints() {
    let result = EmulatorServer::bind(&EmulatorConfig {
        endpoint: "not-an-endpoint".to_string(),
        log_register_writes: false,
    });

    assert!(matches!(
        result,
        Err(asic_emulator::ServerError::Bind { .. })
    ));
}
