//! Control layer - session, scene mirror, transitions and event routing

mod outputs;
mod router;
mod session;
mod store;
mod transition;

pub use outputs::{Output, OutputControl};
pub use router::EventRouter;
pub use session::{SessionManager, SessionTimeouts};
pub use store::{SceneCollection, SceneStateStore};
pub use transition::{TakeOutcome, TransitionController, TransitionStyle};

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{CommandError, ConnectionError};
use crate::projector::{Binding, ProjectorLauncher};
use crate::switcher::{Connector, Credential, Endpoint};

/// Connectivity of the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Error => write!(f, "Error"),
        }
    }
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    StatusUpdate {
        state: ConnectionState,
        message: String,
    },
    SceneListUpdate {
        snapshot: SceneCollection,
    },
    ProgramChanged {
        scene: String,
    },
    PreviewChanged {
        scene: String,
    },
    StudioModeChanged {
        enabled: bool,
    },
    TransitionChanged {
        transition: TransitionStyle,
    },
    ProjectorBindings {
        bindings: Vec<Binding>,
    },
}

/// Fan-out of [`Notification`]s to any number of subscribers
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish; having no subscribers is not an error
    pub fn send(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// The operator-facing surface: wires the components together and runs
/// the compound sequences (connect then refresh, disconnect then clear).
/// Connectivity status is published by the [`EventRouter`], not here.
pub struct Director {
    session: Arc<SessionManager>,
    store: Arc<SceneStateStore>,
    transitions: Arc<TransitionController>,
    outputs: OutputControl,
    projectors: ProjectorLauncher,
    notifier: Notifier,
    endpoint: Endpoint,
    credential: Credential,
    open_projectors_on_connect: bool,
}

impl Director {
    /// Build every component. The returned router must be spawned for push
    /// events to be applied.
    pub fn build(
        config: &Config,
        connector: Arc<dyn Connector>,
        notifier: Notifier,
    ) -> (Arc<Self>, EventRouter) {
        let (session, inbound) =
            SessionManager::new(connector, SessionTimeouts::from(&config.session));
        let session = Arc::new(session);
        let store = Arc::new(SceneStateStore::new(session.clone()));
        let transitions = Arc::new(TransitionController::new(
            session.clone(),
            store.clone(),
            config.transitions.clone(),
        ));

        let router = EventRouter::new(
            session.clone(),
            store.clone(),
            transitions.clone(),
            notifier.clone(),
            inbound,
        );

        let director = Arc::new(Self {
            outputs: OutputControl::new(session.clone()),
            projectors: ProjectorLauncher::new(
                session.clone(),
                store.clone(),
                config.projector.monitor_index,
            ),
            session,
            store,
            transitions,
            notifier,
            endpoint: Endpoint::new(config.obs.host.clone(), config.obs.port),
            credential: Credential::new(config.obs.password.clone()),
            open_projectors_on_connect: config.projector.open_on_connect,
        });

        (director, router)
    }

    /// Connect to the configured endpoint
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.connect_to(self.endpoint.clone(), self.credential.clone())
            .await
    }

    /// Connect (or reconnect) and load the initial scene state
    pub async fn connect_to(
        &self,
        endpoint: Endpoint,
        credential: Credential,
    ) -> Result<(), ConnectionError> {
        self.store.clear().await;
        self.transitions.reset();

        if let Err(e) = self.session.connect(endpoint, credential).await {
            self.store.clear().await;
            return Err(e);
        }

        let scenes = match self.refresh_scenes().await {
            Ok(snapshot) => snapshot.scenes().to_vec(),
            Err(_) => Vec::new(),
        };

        if let Err(e) = self.transitions.transitions().await {
            warn!("Could not list transitions: {}", e);
        }

        if self.open_projectors_on_connect {
            let opened = self.projectors.open_all(&scenes).await;
            info!("Opened {} projectors", opened);
        }

        Ok(())
    }

    /// Close the channel and forget the mirrored state
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let result = self.session.disconnect().await;
        self.store.clear().await;
        self.transitions.reset();
        if let Err(e) = &result {
            warn!("Error while disconnecting: {}", e);
        }
        result
    }

    /// Reload the scene list and publish it
    pub async fn refresh_scenes(&self) -> Result<SceneCollection, CommandError> {
        match self.store.refresh().await {
            Ok(snapshot) => {
                self.notifier.send(Notification::SceneListUpdate {
                    snapshot: snapshot.clone(),
                });
                Ok(snapshot)
            }
            Err(e) => {
                warn!("Scene list refresh failed: {}", e);
                self.notifier.send(Notification::StatusUpdate {
                    state: self.session.state(),
                    message: format!("Could not load scenes from OBS: {}", e),
                });
                Err(e)
            }
        }
    }

    pub async fn set_program(&self, scene: &str) -> Result<(), CommandError> {
        self.store.set_program(scene).await
    }

    pub async fn set_preview(&self, scene: &str) -> Result<(), CommandError> {
        self.store.set_preview(scene).await
    }

    pub async fn take(&self) -> Result<TakeOutcome, CommandError> {
        self.transitions.take().await
    }

    pub async fn set_transition_style(&self, style: TransitionStyle) -> Result<(), CommandError> {
        self.transitions.set_transition_style(&style).await?;
        self.notifier
            .send(Notification::TransitionChanged { transition: style });
        Ok(())
    }

    pub async fn transitions(&self) -> Result<Vec<String>, CommandError> {
        self.transitions.transitions().await
    }

    pub async fn studio_mode(&self) -> Result<bool, CommandError> {
        self.transitions.studio_mode().await
    }

    pub async fn start_output(&self, output: Output) -> Result<(), CommandError> {
        self.outputs.start(output).await
    }

    pub async fn stop_output(&self, output: Output) -> Result<(), CommandError> {
        self.outputs.stop(output).await
    }

    pub async fn open_projector(&self, scene: &str) -> Result<(), CommandError> {
        self.projectors.open_projector(scene).await
    }

    /// Open Program, Preview and one projector per known scene
    pub async fn open_all_projectors(&self) -> Result<usize, CommandError> {
        if !self.session.is_connected() {
            return Err(CommandError::NotConnected);
        }
        let scenes = self.store.scene_names().await;
        Ok(self.projectors.open_all(&scenes).await)
    }

    pub async fn snapshot(&self) -> SceneCollection {
        self.store.snapshot().await
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn store(&self) -> &Arc<SceneStateStore> {
        &self.store
    }

    pub fn transition_controller(&self) -> &Arc<TransitionController> {
        &self.transitions
    }
}
