use quicperf::{format_bitrate, Client, Config, Mode, Server};
use std::time::Duration;
use tokio::time::timeout;

#[test]
fn test_config_builder() {
    let config = Config::client("192.168.1.100".to_string(), 4433)
        .with_duration(Duration::from_secs(30));

    assert_eq!(config.mode, Mode::Client);
    assert_eq!(config.port, 4433);
    assert_eq!(config.duration, Duration::from_secs(30));
    assert_eq!(config.server_addr.as_deref(), Some("192.168.1.100"));
}

#[test]
fn test_bitrate_formatting_units() {
    assert_eq!(format_bitrate(0.0), "0 bit/s");
    assert_eq!(format_bitrate(128.0), "1024 bit/s");
    assert!(format_bitrate(1_000_000.0).ends_with(" mbit/s"));
    assert!(format_bitrate(1e15).ends_with(" gbit/s"));
}

/// Runs a bulk-sender server and a measuring client over loopback for a
/// one-second window and checks the client winds itself down.
#[tokio::test]
async fn test_loopback_measurement_run() {
    let server = Server::new(Config::server(0).with_bind_addr("127.0.0.1".parse().unwrap()));
    let bound = server.bind().expect("failed to bind server endpoint");
    let port = bound.local_addr().unwrap().port();

    tokio::spawn(async move {
        let _ = bound.serve().await;
    });

    let client_config = Config::client("127.0.0.1".to_string(), port)
        .with_duration(Duration::from_secs(1));
    let client = Client::new(client_config).unwrap();

    let result = timeout(Duration::from_secs(15), client.run()).await;
    assert!(result.is_ok(), "client did not terminate within the window");
    assert!(result.unwrap().is_ok(), "client run failed");
}

/// The cancellation token exposed by the client fires once the window
/// has elapsed, so embedders can observe termination.
#[tokio::test]
async fn test_termination_visible_through_token() {
    let server = Server::new(Config::server(0).with_bind_addr("127.0.0.1".parse().unwrap()));
    let bound = server.bind().expect("failed to bind server endpoint");
    let port = bound.local_addr().unwrap().port();

    tokio::spawn(async move {
        let _ = bound.serve().await;
    });

    let client_config = Config::client("127.0.0.1".to_string(), port)
        .with_duration(Duration::from_secs(1));
    let client = Client::new(client_config).unwrap();
    let token = client.cancellation_token();
    assert!(!token.is_cancelled());

    let result = timeout(Duration::from_secs(15), client.run()).await;
    assert!(result.is_ok());
    assert!(token.is_cancelled(), "termination must cancel the token");
}
