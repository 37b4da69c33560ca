//! Local mirror of the switcher's scene state
//!
//! The mirror changes only on confirmed facts: a successful reply to one of
//! our own requests, or a push event. Nothing is written optimistically.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CommandError, DispatchError, ValidationError};
use crate::switcher::{Reply, Request};

use super::SessionManager;

/// Scene names in remote order plus the current program and preview
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SceneCollection {
    scenes: Vec<String>,
    program: Option<String>,
    preview: Option<String>,
}

impl SceneCollection {
    /// Build a collection from a scene-list reply, keeping `previous`'s
    /// preview when the reply does not carry one and that scene still exists.
    pub fn reconcile(
        previous: &SceneCollection,
        scenes: Vec<String>,
        program: Option<String>,
        preview: Option<String>,
    ) -> Self {
        let mut seen = HashSet::new();
        let scenes: Vec<String> = scenes
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();

        let member = |name: Option<String>| name.filter(|n| scenes.contains(n));

        let program = member(program);
        let preview = match preview {
            Some(reported) => member(Some(reported)),
            None => member(previous.preview.clone()),
        };

        Self {
            scenes,
            program,
            preview,
        }
    }

    pub fn scenes(&self) -> &[String] {
        &self.scenes
    }

    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scenes.iter().any(|scene| scene == name)
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// Canonical mirror of the remote scene collection
pub struct SceneStateStore {
    session: Arc<SessionManager>,
    mirror: RwLock<SceneCollection>,
}

impl SceneStateStore {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            mirror: RwLock::new(SceneCollection::default()),
        }
    }

    /// Pull a full snapshot from the switcher and replace the mirror with it
    pub async fn refresh(&self) -> Result<SceneCollection, CommandError> {
        let generation = self.session.generation();

        let Reply::SceneList {
            program,
            preview,
            scenes,
        } = self.session.dispatch(Request::GetSceneList).await?
        else {
            return Err(DispatchError::unexpected_reply("GetSceneList").into());
        };

        // The channel may have gone away while the request was in flight
        if !self.session.accepts(generation) {
            return Err(CommandError::NotConnected);
        }

        let mut mirror = self.mirror.write().await;
        let next = SceneCollection::reconcile(&mirror, scenes, program, preview);
        debug!(
            "Scene list: {} scenes, program={:?}, preview={:?}",
            next.scenes.len(),
            next.program,
            next.preview
        );
        *mirror = next.clone();
        Ok(next)
    }

    /// Put `name` on program. Unknown scenes are rejected locally.
    pub async fn set_program(&self, name: &str) -> Result<(), CommandError> {
        let generation = self.validate(name).await?;

        self.session
            .dispatch(Request::SetCurrentProgramScene {
                scene: name.to_string(),
            })
            .await?;

        self.confirm(generation, |mirror| {
            if mirror.contains(name) {
                mirror.program = Some(name.to_string());
            }
        })
        .await;
        Ok(())
    }

    /// Stage `name` on preview. Unknown scenes are rejected locally.
    pub async fn set_preview(&self, name: &str) -> Result<(), CommandError> {
        let generation = self.validate(name).await?;

        self.session
            .dispatch(Request::SetCurrentPreviewScene {
                scene: name.to_string(),
            })
            .await?;

        self.confirm(generation, |mirror| {
            if mirror.contains(name) {
                mirror.preview = Some(name.to_string());
            }
        })
        .await;
        Ok(())
    }

    /// Record a remote program change. Returns false when the scene is not
    /// in the mirror, meaning the scene list itself is stale.
    pub async fn apply_program_changed(&self, name: &str) -> bool {
        let mut mirror = self.mirror.write().await;
        if !mirror.contains(name) {
            return false;
        }
        mirror.program = Some(name.to_string());
        true
    }

    /// Record a remote preview change. Same contract as
    /// [`apply_program_changed`](Self::apply_program_changed).
    pub async fn apply_preview_changed(&self, name: &str) -> bool {
        let mut mirror = self.mirror.write().await;
        if !mirror.contains(name) {
            return false;
        }
        mirror.preview = Some(name.to_string());
        true
    }

    /// Forget everything; used when the channel goes away
    pub async fn clear(&self) {
        *self.mirror.write().await = SceneCollection::default();
    }

    pub async fn snapshot(&self) -> SceneCollection {
        self.mirror.read().await.clone()
    }

    pub async fn scene_names(&self) -> Vec<String> {
        self.mirror.read().await.scenes.clone()
    }

    async fn validate(&self, name: &str) -> Result<u64, CommandError> {
        if !self.session.is_connected() {
            return Err(CommandError::NotConnected);
        }
        let generation = self.session.generation();
        if !self.mirror.read().await.contains(name) {
            return Err(ValidationError::UnknownScene(name.to_string()).into());
        }
        Ok(generation)
    }

    async fn confirm(&self, generation: u64, apply: impl FnOnce(&mut SceneCollection)) {
        let mut mirror = self.mirror.write().await;
        if self.session.accepts(generation) {
            apply(&mut mirror);
        }
    }
}
