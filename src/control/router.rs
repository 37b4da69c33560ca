//! Inbound event dispatch
//!
//! One task drains the inbound queue in delivery order. Each event causes
//! at most one mirror mutation and at most one outward notification. The
//! same task is the only publisher of connectivity status: it follows the
//! session's state stream, so the last status sent always matches the
//! state the session settled in. The router never opens connections itself.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::switcher::{CloseReason, Inbound, RemoteEvent};

use super::{
    ConnectionState, Notification, Notifier, SceneStateStore, SessionManager,
    TransitionController,
};

pub struct EventRouter {
    session: Arc<SessionManager>,
    store: Arc<SceneStateStore>,
    transitions: Arc<TransitionController>,
    notifier: Notifier,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    states: watch::Receiver<ConnectionState>,
    /// Last status published, to skip repeats
    last_status: Option<(ConnectionState, String)>,
}

impl EventRouter {
    pub fn new(
        session: Arc<SessionManager>,
        store: Arc<SceneStateStore>,
        transitions: Arc<TransitionController>,
        notifier: Notifier,
        inbound: mpsc::UnboundedReceiver<Inbound>,
    ) -> Self {
        let states = session.subscribe();
        Self {
            session,
            store,
            transitions,
            notifier,
            inbound,
            states,
            last_status: None,
        }
    }

    /// Run until the inbound queue or the state stream closes
    pub async fn run(mut self) {
        info!("Event router started");
        loop {
            tokio::select! {
                biased;
                changed = self.states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.publish_status();
                }
                inbound = self.inbound.recv() => {
                    let Some(inbound) = inbound else {
                        break;
                    };
                    self.handle(inbound).await;
                }
            }
        }
        info!("Event router stopped");
    }

    /// Apply one event. Returns the notification it produced, if any.
    pub async fn handle(&mut self, inbound: Inbound) -> Option<Notification> {
        let Inbound { generation, event } = inbound;

        if let RemoteEvent::ConnectionClosed(reason) = event {
            return self.connection_closed(generation, reason).await;
        }

        if !self.session.accepts(generation) {
            debug!("Dropping event from stale channel {}: {:?}", generation, event);
            return None;
        }

        let notification = match event {
            RemoteEvent::ProgramSceneChanged(name) => {
                if self.store.apply_program_changed(&name).await {
                    Notification::ProgramChanged { scene: name }
                } else {
                    debug!("Program moved to unknown scene '{}', refreshing", name);
                    self.refresh().await
                }
            }
            RemoteEvent::PreviewSceneChanged(name) => {
                if self.store.apply_preview_changed(&name).await {
                    Notification::PreviewChanged { scene: name }
                } else {
                    debug!("Preview moved to unknown scene '{}', refreshing", name);
                    self.refresh().await
                }
            }
            RemoteEvent::SceneListChanged => self.refresh().await,
            RemoteEvent::StudioModeChanged(enabled) => {
                self.transitions.note_studio_mode(enabled);
                Notification::StudioModeChanged { enabled }
            }
            RemoteEvent::ConnectionClosed(_) => return None,
        };

        self.notifier.send(notification.clone());
        Some(notification)
    }

    async fn connection_closed(
        &mut self,
        generation: u64,
        reason: CloseReason,
    ) -> Option<Notification> {
        if !self.session.mark_closed(generation, reason).await {
            debug!("Close signal {:?} absorbed", reason);
            return None;
        }

        self.store.clear().await;
        self.transitions.reset();
        self.publish_status()
    }

    /// Publish the session's current state and message unless it repeats
    /// the previous status
    fn publish_status(&mut self) -> Option<Notification> {
        self.states.mark_unchanged();
        let session = self.session.snapshot();
        let status = (session.state, session.message);
        if self.last_status.as_ref() == Some(&status) {
            return None;
        }
        self.last_status = Some(status.clone());

        let (state, message) = status;
        debug!("Status {}: {}", state, message);
        let notification = Notification::StatusUpdate { state, message };
        self.notifier.send(notification.clone());
        Some(notification)
    }

    async fn refresh(&self) -> Notification {
        match self.store.refresh().await {
            Ok(snapshot) => Notification::SceneListUpdate { snapshot },
            Err(e) => {
                warn!("Scene list refresh failed: {}", e);
                Notification::StatusUpdate {
                    state: self.session.state(),
                    message: format!("Could not load scenes from OBS: {}", e),
                }
            }
        }
    }
}
