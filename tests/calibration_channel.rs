use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use quilt_viewer::calibration::channel::DEFAULT_TIMEOUT;
use quilt_viewer::calibration::{
    BridgeInstallHint, CalibrationChannel, CalibrationProfile, CalibrationSource, FallbackReason,
    OperatorPrompt, OsFamily,
};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Default)]
struct RecordingPrompt(Mutex<Vec<BridgeInstallHint>>);

impl OperatorPrompt for RecordingPrompt {
    fn bridge_unreachable(&self, hint: &BridgeInstallHint) {
        self.0.lock().unwrap().push(hint.clone());
    }
}

enum Reply {
    Text(String),
    Silent,
    HangUp,
}

/// One-connection bridge stand-in on an ephemeral loopback port.
async fn spawn_bridge(reply: Reply) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        match reply {
            Reply::Text(payload) => {
                ws.send(Message::text(payload)).await.unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            }
            Reply::Silent => {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Reply::HangUp => {
                let _ = ws.close(None).await;
            }
        }
    });
    addr
}

fn live_profile() -> CalibrationProfile {
    let mut profile = CalibrationProfile::fallback();
    profile.serial = "LKG-2K-04412".into();
    profile.pitch.value = 47.612;
    profile.slope.value = -5.4;
    profile.center.value = 0.125;
    profile
}

#[tokio::test]
async fn live_profile_is_adopted() {
    let payload = serde_json::to_string(&live_profile()).unwrap();
    let addr = spawn_bridge(Reply::Text(payload)).await;
    let channel = CalibrationChannel::new(format!("ws://{addr}/"), DEFAULT_TIMEOUT);

    let started = Instant::now();
    let resolved = channel.acquire().await;
    assert!(resolved.is_live());
    assert_eq!(resolved.profile, live_profile());
    assert!(started.elapsed() < DEFAULT_TIMEOUT);
}

#[tokio::test]
async fn silent_bridge_falls_back_after_timeout() {
    let addr = spawn_bridge(Reply::Silent).await;
    let channel = CalibrationChannel::new(format!("ws://{addr}/"), DEFAULT_TIMEOUT);

    let started = Instant::now();
    let resolved = channel.acquire().await;
    let elapsed = started.elapsed();

    assert_eq!(resolved.profile, CalibrationProfile::fallback());
    assert_eq!(
        resolved.source,
        CalibrationSource::Fallback(FallbackReason::TimedOut)
    );
    assert!(elapsed >= Duration::from_millis(790), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(900), "returned late: {elapsed:?}");
}

#[tokio::test]
async fn hang_up_without_message_waits_for_timer() {
    let addr = spawn_bridge(Reply::HangUp).await;
    let channel = CalibrationChannel::new(format!("ws://{addr}/"), Duration::from_millis(200));
    let resolved = channel.acquire().await;
    assert_eq!(
        resolved.source,
        CalibrationSource::Fallback(FallbackReason::TimedOut)
    );
}

#[tokio::test]
async fn malformed_payload_falls_back() {
    let addr = spawn_bridge(Reply::Text("{\"pitch\": 3".into())).await;
    let channel = CalibrationChannel::new(format!("ws://{addr}/"), DEFAULT_TIMEOUT);
    let resolved = channel.acquire().await;
    assert!(matches!(
        resolved.source,
        CalibrationSource::Fallback(FallbackReason::Malformed(_))
    ));
    assert_eq!(resolved.profile, CalibrationProfile::fallback());
}

#[tokio::test]
async fn unbound_port_reports_channel_error_and_prompts() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let prompt = Arc::new(RecordingPrompt::default());
    let channel = CalibrationChannel::new(format!("ws://{addr}/"), DEFAULT_TIMEOUT)
        .with_os(OsFamily::Windows)
        .with_prompt(prompt.clone());

    let started = Instant::now();
    let resolved = channel.acquire().await;
    assert!(started.elapsed() < Duration::from_millis(900));
    assert!(matches!(
        resolved.source,
        CalibrationSource::Fallback(FallbackReason::ChannelError(_))
    ));
    assert_eq!(resolved.profile, CalibrationProfile::fallback());

    let hints = prompt.0.lock().unwrap();
    assert_eq!(hints.len(), 1);
    assert!(matches!(
        &hints[0],
        BridgeInstallHint::Download { os: OsFamily::Windows, url } if url.ends_with(".exe")
    ));
}
