//! Periodic projector discovery
//!
//! Runs on its own task and never dispatches on the control channel, so a
//! stalled remote call cannot hold up polling. Bindings that can no longer
//! be resolved (discovery failed, session gone) are withdrawn by publishing
//! an empty set once.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ProjectorConfig;
use crate::control::{ConnectionState, Notification, Notifier, SceneStateStore, SessionManager};

use super::{bind, classify, filter_by_keywords, Binding, CaptureSourceProvider};

pub struct ProjectorPoller {
    provider: Arc<dyn CaptureSourceProvider>,
    session: Arc<SessionManager>,
    store: Arc<SceneStateStore>,
    notifier: Notifier,
    keywords: Vec<String>,
    interval: Duration,
    last: Option<Vec<Binding>>,
}

impl ProjectorPoller {
    pub fn new(
        provider: Arc<dyn CaptureSourceProvider>,
        session: Arc<SessionManager>,
        store: Arc<SceneStateStore>,
        notifier: Notifier,
        config: &ProjectorConfig,
    ) -> Self {
        Self {
            provider,
            session,
            store,
            notifier,
            keywords: config.keywords.clone(),
            interval: config.poll_interval(),
            last: None,
        }
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Projector polling every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut states = self.session.subscribe();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(bindings) = self.poll_once().await {
                        self.notifier.send(Notification::ProjectorBindings { bindings });
                    }
                }
                Ok(()) = states.changed() => {
                    let state = *states.borrow_and_update();
                    if state != ConnectionState::Connected {
                        if let Some(bindings) = self.withdraw() {
                            self.notifier.send(Notification::ProjectorBindings { bindings });
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Projector polling stopped");
    }

    /// One discovery cycle. Returns the bindings when they differ from the
    /// previously published set.
    pub async fn poll_once(&mut self) -> Option<Vec<Binding>> {
        if !self.session.is_connected() {
            return self.withdraw();
        }

        let provider = self.provider.clone();
        let sources = match tokio::task::spawn_blocking(move || provider.capture_sources()).await {
            Ok(Ok(sources)) => sources,
            Ok(Err(e)) => {
                warn!("Capture source discovery failed: {:#}", e);
                return self.withdraw();
            }
            Err(e) => {
                warn!("Capture source discovery panicked: {}", e);
                return self.withdraw();
            }
        };

        let sources = filter_by_keywords(sources, &self.keywords);
        let scenes = self.store.scene_names().await;
        let classifications = classify(&sources, &scenes);
        for unmatched in classifications.iter().filter(|c| c.slot.is_none()) {
            debug!("Unmatched capture source '{}'", unmatched.source.raw_name);
        }

        let bindings = bind(&classifications);
        if self.last.as_ref() == Some(&bindings) {
            return None;
        }
        debug!("Projector bindings changed: {} bound", bindings.len());
        self.last = Some(bindings.clone());
        Some(bindings)
    }

    /// Empty set to publish when bindings were showing, otherwise None
    fn withdraw(&mut self) -> Option<Vec<Binding>> {
        match &self.last {
            Some(bindings) if !bindings.is_empty() => {
                debug!("Withdrawing {} projector bindings", bindings.len());
                self.last = Some(Vec::new());
                Some(Vec::new())
            }
            _ => None,
        }
    }
}
