//! Opening OBS projector windows
//!
//! The windows opened here are what discovery later finds and classifies.

use std::sync::Arc;
use tracing::{info, warn};

use crate::control::{SceneStateStore, SessionManager};
use crate::error::{CommandError, ValidationError};
use crate::switcher::{Request, VideoMix};

pub struct ProjectorLauncher {
    session: Arc<SessionManager>,
    store: Arc<SceneStateStore>,
    /// None opens windowed projectors
    monitor: Option<i32>,
}

impl ProjectorLauncher {
    pub fn new(
        session: Arc<SessionManager>,
        store: Arc<SceneStateStore>,
        monitor: Option<i32>,
    ) -> Self {
        Self {
            session,
            store,
            monitor,
        }
    }

    /// Open Program, Preview and one projector per scene. Best effort:
    /// failures are logged and skipped. Returns how many opened.
    pub async fn open_all(&self, scenes: &[String]) -> usize {
        let mut requests = vec![
            Request::OpenVideoMixProjector {
                mix: VideoMix::Program,
                monitor: self.monitor,
            },
            Request::OpenVideoMixProjector {
                mix: VideoMix::Preview,
                monitor: self.monitor,
            },
        ];
        requests.extend(scenes.iter().map(|scene| Request::OpenSourceProjector {
            source: scene.clone(),
            monitor: self.monitor,
        }));

        let mut opened = 0;
        for request in requests {
            let label = describe(&request);
            match self.session.dispatch(request).await {
                Ok(_) => opened += 1,
                Err(e) => warn!("Could not open {} projector: {}", label, e),
            }
        }
        opened
    }

    /// Open a projector for one known scene
    pub async fn open_projector(&self, scene: &str) -> Result<(), CommandError> {
        if !self.session.is_connected() {
            return Err(CommandError::NotConnected);
        }
        if !self.store.snapshot().await.contains(scene) {
            return Err(ValidationError::UnknownScene(scene.to_string()).into());
        }

        self.session
            .dispatch(Request::OpenSourceProjector {
                source: scene.to_string(),
                monitor: self.monitor,
            })
            .await?;
        info!("Opened projector for scene '{}'", scene);
        Ok(())
    }
}

fn describe(request: &Request) -> String {
    match request {
        Request::OpenVideoMixProjector { mix, .. } => format!("{:?}", mix),
        Request::OpenSourceProjector { source, .. } => format!("scene '{}'", source),
        other => other.verb().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SessionTimeouts;
    use crate::switcher::fake::FakeSwitcher;
    use crate::switcher::{Credential, Endpoint};

    async fn launcher(remote: &FakeSwitcher) -> ProjectorLauncher {
        let (session, _inbound) =
            SessionManager::new(Arc::new(remote.connector()), SessionTimeouts::default());
        let session = Arc::new(session);
        session
            .connect(Endpoint::new("localhost", 4455), Credential::none())
            .await
            .unwrap();
        let store = Arc::new(SceneStateStore::new(session.clone()));
        store.refresh().await.unwrap();
        remote.clear_requests();
        ProjectorLauncher::new(session, store, None)
    }

    #[tokio::test]
    async fn test_open_all_is_best_effort() {
        let remote = FakeSwitcher::new(&["Scene A", "Scene B"]);
        let launcher = launcher(&remote).await;
        remote.fail("OpenVideoMixProjector", "no such mix");

        let scenes = vec!["Scene A".to_string(), "Scene B".to_string()];
        assert_eq!(launcher.open_all(&scenes).await, 2);
        assert_eq!(remote.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_open_projector_validates_scene() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        let launcher = launcher(&remote).await;

        assert_eq!(
            launcher.open_projector("Nope").await,
            Err(CommandError::Validation(ValidationError::UnknownScene(
                "Nope".into()
            )))
        );
        assert!(remote.requests().is_empty());

        launcher.open_projector("Scene A").await.unwrap();
        assert_eq!(
            remote.requests(),
            vec![Request::OpenSourceProjector {
                source: "Scene A".into(),
                monitor: None
            }]
        );
    }
}
