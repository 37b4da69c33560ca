//! Remote switcher seam
//!
//! Everything the control layer knows about OBS goes through the types in
//! this module: typed requests and replies, push events, and the
//! [`Connector`]/[`SwitcherLink`] traits. The obs-websocket implementation
//! lives in [`obws_link`]; tests use the scripted link in `fake`.

mod obws_link;

#[cfg(test)]
pub mod fake;

pub use obws_link::ObwsConnector;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Where the switcher listens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// WebSocket password. Write-only: it can be handed to a connector but is
/// never printed, serialized or logged.
#[derive(Clone, Default)]
pub struct Credential(Option<String>);

impl Credential {
    pub fn new(secret: Option<String>) -> Self {
        Self(secret.filter(|s| !s.is_empty()))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub(crate) fn reveal(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => write!(f, "Credential(<redacted>)"),
            None => write!(f, "Credential(none)"),
        }
    }
}

/// Output mix a projector can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VideoMix {
    Program,
    Preview,
}

/// Requests understood by the switcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetSceneList,
    SetCurrentProgramScene { scene: String },
    SetCurrentPreviewScene { scene: String },
    GetStudioModeEnabled,
    TriggerStudioModeTransition,
    SetCurrentSceneTransition { transition: String },
    GetSceneTransitionList,
    OpenVideoMixProjector { mix: VideoMix, monitor: Option<i32> },
    OpenSourceProjector { source: String, monitor: Option<i32> },
    StartRecord,
    StopRecord,
    StartStream,
    StopStream,
    StartVirtualCam,
    StopVirtualCam,
}

impl Request {
    /// Protocol name of the request, used in logs and errors
    pub fn verb(&self) -> &'static str {
        match self {
            Request::GetSceneList => "GetSceneList",
            Request::SetCurrentProgramScene { .. } => "SetCurrentProgramScene",
            Request::SetCurrentPreviewScene { .. } => "SetCurrentPreviewScene",
            Request::GetStudioModeEnabled => "GetStudioModeEnabled",
            Request::TriggerStudioModeTransition => "TriggerStudioModeTransition",
            Request::SetCurrentSceneTransition { .. } => "SetCurrentSceneTransition",
            Request::GetSceneTransitionList => "GetSceneTransitionList",
            Request::OpenVideoMixProjector { .. } => "OpenVideoMixProjector",
            Request::OpenSourceProjector { .. } => "OpenSourceProjector",
            Request::StartRecord => "StartRecord",
            Request::StopRecord => "StopRecord",
            Request::StartStream => "StartStream",
            Request::StopStream => "StopStream",
            Request::StartVirtualCam => "StartVirtualCam",
            Request::StopVirtualCam => "StopVirtualCam",
        }
    }
}

/// Successful answers to [`Request`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The request carries no payload beyond success
    Done,
    SceneList {
        program: Option<String>,
        preview: Option<String>,
        scenes: Vec<String>,
    },
    StudioMode(bool),
    Transitions {
        current: Option<String>,
        transitions: Vec<String>,
    },
}

/// The underlying signal that ended a control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseReason {
    /// The event stream ended (socket closed, network dropped)
    StreamEnded,
    /// The obs-websocket server announced it is stopping
    ServerStopping,
    /// The obs-websocket server stopped
    ServerStopped,
    /// OBS itself is exiting
    ExitStarted,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::StreamEnded => write!(f, "WebSocket connection closed."),
            CloseReason::ServerStopping | CloseReason::ServerStopped => {
                write!(f, "OBS WebSocket server stopped.")
            }
            CloseReason::ExitStarted => write!(f, "OBS Studio is shutting down."),
        }
    }
}

/// Push notifications from the switcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    ConnectionClosed(CloseReason),
    ProgramSceneChanged(String),
    PreviewSceneChanged(String),
    SceneListChanged,
    StudioModeChanged(bool),
}

/// A push event tagged with the session generation of the channel that
/// produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub generation: u64,
    pub event: RemoteEvent,
}

/// Handed to a connector so the channel it opens can publish push events
/// into the single inbound queue
#[derive(Debug, Clone)]
pub struct EventTap {
    generation: u64,
    sink: mpsc::UnboundedSender<Inbound>,
}

impl EventTap {
    pub fn new(generation: u64, sink: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { generation, sink }
    }

    /// Publish an event. Returns false once the router has gone away.
    pub fn emit(&self, event: RemoteEvent) -> bool {
        self.sink
            .send(Inbound {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// A live control channel to the switcher
#[async_trait]
pub trait SwitcherLink: Send + Sync {
    /// Issue one request. Errors carry the switcher's message verbatim.
    async fn call(&self, request: Request) -> Result<Reply, String>;

    /// Close the channel. Further calls fail.
    async fn close(&self);
}

/// Opens control channels
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
        events: EventTap,
    ) -> Result<Arc<dyn SwitcherLink>, String>;
}
