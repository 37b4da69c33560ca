//! Take / Cut / Fade
//!
//! `take()` reads studio mode and then acts on it. The two steps are not
//! atomic: another operator can toggle studio mode or change scenes in
//! between. The mirror is never written from the read, only from confirmed
//! replies and push events, so a stale read can make a take fail but cannot
//! corrupt local state.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::TransitionsConfig;
use crate::error::{CommandError, DispatchError, ValidationError};
use crate::switcher::{Reply, Request};

use super::{SceneStateStore, SessionManager};

/// Transition applied on take
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransitionStyle {
    Cut,
    Fade,
    /// Any other transition, by its remote name
    Named(String),
}

impl fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionStyle::Cut => write!(f, "Cut"),
            TransitionStyle::Fade => write!(f, "Fade"),
            TransitionStyle::Named(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionState {
    Idle,
    TransitionPending,
}

/// Result of a successful take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TakeOutcome {
    /// Studio mode was on but the transition primitive failed, so program
    /// was set directly
    pub fallback: bool,
}

#[derive(Debug, Default)]
struct Observed {
    /// Remote name of the last confirmed transition
    style: Option<String>,
    /// Names from the last transition list query
    available: Vec<String>,
    /// Last studio mode seen; display only, take() always asks the remote
    studio_mode: Option<bool>,
}

/// Executes takes and transition style changes
pub struct TransitionController {
    session: Arc<SessionManager>,
    store: Arc<SceneStateStore>,
    names: TransitionsConfig,
    state: Mutex<TransitionState>,
    observed: Mutex<Observed>,
}

/// Holds `TransitionPending` for the lifetime of one take
struct Pending<'a>(&'a Mutex<TransitionState>);

impl<'a> Pending<'a> {
    fn enter(state: &'a Mutex<TransitionState>) -> Option<Self> {
        let mut current = state.lock().unwrap_or_else(|e| e.into_inner());
        if *current == TransitionState::TransitionPending {
            return None;
        }
        *current = TransitionState::TransitionPending;
        Some(Self(state))
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = TransitionState::Idle;
    }
}

impl TransitionController {
    pub fn new(
        session: Arc<SessionManager>,
        store: Arc<SceneStateStore>,
        names: TransitionsConfig,
    ) -> Self {
        Self {
            session,
            store,
            names,
            state: Mutex::new(TransitionState::Idle),
            observed: Mutex::new(Observed::default()),
        }
    }

    /// Commit the preview scene to program.
    ///
    /// With studio mode on, the studio transition is triggered; if that
    /// fails, program is set directly to the preview scene once and the
    /// outcome reports `fallback`. With studio mode off (or unknown), the
    /// direct set is the normal path.
    pub async fn take(&self) -> Result<TakeOutcome, CommandError> {
        if !self.session.is_connected() {
            return Err(CommandError::NotConnected);
        }

        let snapshot = self.store.snapshot().await;
        let preview = snapshot
            .preview()
            .ok_or(ValidationError::NoPreviewScene)?
            .to_string();
        if snapshot.program() == Some(preview.as_str()) {
            return Err(ValidationError::PreviewIsProgram(preview).into());
        }

        let _pending = Pending::enter(&self.state).ok_or(ValidationError::TransitionPending)?;

        let studio_mode = match self.studio_mode().await {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!("Could not read studio mode, assuming disabled: {}", e);
                false
            }
        };
        debug!("Take '{}' (studio mode: {})", preview, studio_mode);

        if !studio_mode {
            self.store.set_program(&preview).await?;
            info!("Take: '{}' set on program", preview);
            return Ok(TakeOutcome { fallback: false });
        }

        match self
            .session
            .dispatch(Request::TriggerStudioModeTransition)
            .await
        {
            Ok(_) => {
                info!("Take: studio transition to '{}'", preview);
                Ok(TakeOutcome { fallback: false })
            }
            Err(e) => {
                warn!("Studio transition failed ({}), setting program directly", e);
                self.store.set_program(&preview).await?;
                info!("Take: '{}' set on program (fallback)", preview);
                Ok(TakeOutcome { fallback: true })
            }
        }
    }

    /// Select the transition used by subsequent takes. Always dispatched,
    /// even when `style` matches the last known one.
    pub async fn set_transition_style(
        &self,
        style: &TransitionStyle,
    ) -> Result<(), CommandError> {
        let name = self.remote_name(style);
        if name.trim().is_empty() {
            return Err(ValidationError::UnknownTransition(name).into());
        }
        {
            let observed = self.lock_observed();
            if !observed.available.is_empty() && !observed.available.contains(&name) {
                return Err(ValidationError::UnknownTransition(name).into());
            }
        }

        self.session
            .dispatch(Request::SetCurrentSceneTransition {
                transition: name.clone(),
            })
            .await?;

        info!("Transition set to '{}'", name);
        self.lock_observed().style = Some(name);
        Ok(())
    }

    /// Query the transitions the switcher offers and remember them
    pub async fn transitions(&self) -> Result<Vec<String>, CommandError> {
        let Reply::Transitions {
            current,
            transitions,
        } = self.session.dispatch(Request::GetSceneTransitionList).await?
        else {
            return Err(DispatchError::unexpected_reply("GetSceneTransitionList").into());
        };

        let mut observed = self.lock_observed();
        observed.available = transitions.clone();
        if current.is_some() {
            observed.style = current;
        }
        Ok(transitions)
    }

    /// Ask the switcher whether studio mode is on and remember the answer
    pub async fn studio_mode(&self) -> Result<bool, CommandError> {
        match self.session.dispatch(Request::GetStudioModeEnabled).await? {
            Reply::StudioMode(enabled) => {
                self.note_studio_mode(enabled);
                Ok(enabled)
            }
            _ => Err(DispatchError::unexpected_reply("GetStudioModeEnabled").into()),
        }
    }

    /// Resolve a style to the transition name configured for this switcher
    pub fn remote_name(&self, style: &TransitionStyle) -> String {
        match style {
            TransitionStyle::Cut => self.names.cut_name.clone(),
            TransitionStyle::Fade => self.names.fade_name.clone(),
            TransitionStyle::Named(name) => name.clone(),
        }
    }

    /// Map a remote transition name back onto a style
    pub fn style_for(&self, name: &str) -> TransitionStyle {
        if name == self.names.cut_name {
            TransitionStyle::Cut
        } else if name == self.names.fade_name {
            TransitionStyle::Fade
        } else {
            TransitionStyle::Named(name.to_string())
        }
    }

    pub fn last_style(&self) -> Option<TransitionStyle> {
        let observed = self.lock_observed();
        observed.style.as_deref().map(|name| self.style_for(name))
    }

    /// Whether a take is in flight
    pub fn is_pending(&self) -> bool {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) == TransitionState::TransitionPending
    }

    pub fn note_studio_mode(&self, enabled: bool) {
        self.lock_observed().studio_mode = Some(enabled);
    }

    /// Last studio mode reported by a push or a query, if any
    pub fn studio_mode_hint(&self) -> Option<bool> {
        self.lock_observed().studio_mode
    }

    /// Drop everything learned from the previous channel
    pub fn reset(&self) {
        *self.lock_observed() = Observed::default();
    }

    fn lock_observed(&self) -> std::sync::MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(|e| e.into_inner())
    }
}
