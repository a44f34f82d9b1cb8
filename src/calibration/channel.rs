//! One-shot calibration handshake with the local display bridge.
//!
//! The bridge is a WebSocket service on loopback. Connecting is the request;
//! the reply is a single text frame holding a JSON profile. Every failure
//! path (timeout, malformed payload, refused connection) resolves to the
//! fallback profile, so callers only ever see a usable profile.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use super::bridge::{BridgeInstallHint, LogPrompt, OperatorPrompt, OsFamily};
use super::profile::CalibrationProfile;

pub const DEFAULT_BRIDGE_URL: &str = "ws://localhost:11222/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(800);
/// Cap on the polite close after a profile arrived.
pub const CLOSE_GRACE: Duration = Duration::from_millis(50);

type BridgeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Received,
    TimedOut,
    ChannelError,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeEvent {
    Message(String),
    Timeout,
    LinkError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    TimedOut,
    Malformed(String),
    ChannelError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationSource {
    Live,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCalibration {
    pub profile: CalibrationProfile,
    pub source: CalibrationSource,
}

impl ResolvedCalibration {
    pub fn is_live(&self) -> bool {
        self.source == CalibrationSource::Live
    }
}

/// Resolve-once state machine. Events arriving after resolution are ignored,
/// which is what keeps a late timeout from replacing a received profile.
#[derive(Debug)]
pub struct Handshake {
    state: ChannelState,
    os: OsFamily,
}

impl Handshake {
    pub fn new(os: OsFamily) -> Self {
        Self {
            state: ChannelState::Idle,
            os,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn begin(&mut self) {
        if self.state == ChannelState::Idle {
            self.state = ChannelState::Connecting;
        }
    }

    pub fn handle(
        &mut self,
        event: HandshakeEvent,
        prompt: &dyn OperatorPrompt,
    ) -> Option<ResolvedCalibration> {
        if self.state == ChannelState::Resolved {
            trace!(?event, "calibration already resolved; ignoring event");
            return None;
        }

        let resolved = match event {
            HandshakeEvent::Message(payload) => {
                self.state = ChannelState::Received;
                match CalibrationProfile::from_json(&payload) {
                    Ok(profile) => {
                        info!(serial = %profile.serial, "new calibration loaded");
                        ResolvedCalibration {
                            profile,
                            source: CalibrationSource::Live,
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "calibration payload unusable; using default calibration");
                        fallback(FallbackReason::Malformed(err.to_string()))
                    }
                }
            }
            HandshakeEvent::Timeout => {
                self.state = ChannelState::TimedOut;
                warn!("no display calibration received; using default calibration");
                fallback(FallbackReason::TimedOut)
            }
            HandshakeEvent::LinkError(err) => {
                self.state = ChannelState::ChannelError;
                prompt.bridge_unreachable(&BridgeInstallHint::for_os(self.os));
                warn!(error = %err, "display bridge unreachable; using default calibration");
                fallback(FallbackReason::ChannelError(err))
            }
        };

        self.state = ChannelState::Resolved;
        Some(resolved)
    }
}

fn fallback(reason: FallbackReason) -> ResolvedCalibration {
    ResolvedCalibration {
        profile: CalibrationProfile::fallback(),
        source: CalibrationSource::Fallback(reason),
    }
}

/// Acquires a calibration profile from the display bridge.
#[derive(Clone)]
pub struct CalibrationChannel {
    endpoint: String,
    timeout: Duration,
    os: OsFamily,
    prompt: Arc<dyn OperatorPrompt>,
}

impl CalibrationChannel {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            os: OsFamily::current(),
            prompt: Arc::new(LogPrompt),
        }
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn OperatorPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_os(mut self, os: OsFamily) -> Self {
        self.os = os;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Single attempt, no retries. Returns within the timeout plus
    /// [`CLOSE_GRACE`].
    pub async fn acquire(&self) -> ResolvedCalibration {
        let mut handshake = Handshake::new(self.os);
        handshake.begin();
        debug!(
            endpoint = %self.endpoint,
            timeout_ms = self.timeout.as_millis() as u64,
            "requesting calibration from display bridge"
        );

        let timer = tokio::time::sleep(self.timeout);
        tokio::pin!(timer);
        let link = read_first_message(&self.endpoint);
        tokio::pin!(link);

        let mut stream: Option<BridgeStream> = None;
        let event = tokio::select! {
            biased;
            outcome = &mut link => match outcome {
                Ok((payload, ws)) => {
                    stream = Some(ws);
                    HandshakeEvent::Message(payload)
                }
                Err(err) => HandshakeEvent::LinkError(err.to_string()),
            },
            _ = &mut timer => HandshakeEvent::Timeout,
        };

        let resolved = handshake
            .handle(event, self.prompt.as_ref())
            .unwrap_or_else(|| fallback(FallbackReason::TimedOut));

        if let Some(mut ws) = stream {
            if tokio::time::timeout(CLOSE_GRACE, ws.close(None)).await.is_err() {
                trace!("bridge close did not complete in time; dropping link");
            }
        }
        resolved
    }
}

impl Default for CalibrationChannel {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_URL, DEFAULT_TIMEOUT)
    }
}

async fn read_first_message(endpoint: &str) -> Result<(String, BridgeStream), tungstenite::Error> {
    let (mut ws, _response) = connect_async(endpoint).await?;
    debug!("connected to display bridge");
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok((text.as_str().to_owned(), ws)),
            Some(Ok(Message::Binary(bytes))) => {
                return Ok((String::from_utf8_lossy(&bytes).into_owned(), ws));
            }
            Some(Ok(Message::Close(_))) | None => {
                // A bridge that hangs up without answering is handled by the timer.
                debug!("display bridge closed without sending calibration");
                return std::future::pending().await;
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(err),
        }
    }
}
