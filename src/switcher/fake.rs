//! Scripted in-memory switcher for unit tests.
//!
//! The fake keeps a tiny model of the remote (scene list, program, preview,
//! studio mode, transitions), records every request it receives, and lets a
//! test make individual verbs fail or stall.
//!
//! ```ignore
//! let remote = FakeSwitcher::new(&["Scene A", "Scene B"]);
//! let session = SessionManager::new(Arc::new(remote.connector()), timeouts);
//! remote.fail("TriggerStudioModeTransition", "not in studio mode");
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{
    Connector, Credential, Endpoint, EventTap, RemoteEvent, Reply, Request, SwitcherLink,
};

#[derive(Debug, Default)]
struct RemoteModel {
    scenes: Vec<String>,
    program: Option<String>,
    preview: Option<String>,
    /// Some(..) when GetSceneList reports the preview field
    report_preview: bool,
    studio_mode: bool,
    transitions: Vec<String>,
    current_transition: Option<String>,
    requests: Vec<Request>,
    failures: HashMap<&'static str, String>,
    delays: HashMap<&'static str, Duration>,
    connect_failure: Option<String>,
    connect_delay: Option<Duration>,
    opened: usize,
    closed: usize,
    tap: Option<EventTap>,
}

/// Handle shared between a test and the links it hands out
#[derive(Debug, Clone, Default)]
pub struct FakeSwitcher {
    model: Arc<Mutex<RemoteModel>>,
}

impl FakeSwitcher {
    pub fn new(scenes: &[&str]) -> Self {
        let fake = Self::default();
        {
            let mut model = fake.model.lock().unwrap();
            model.scenes = scenes.iter().map(|s| s.to_string()).collect();
            model.program = model.scenes.first().cloned();
            model.report_preview = true;
            model.transitions = vec!["Cut".to_string(), "Fade".to_string()];
            model.current_transition = Some("Fade".to_string());
        }
        fake
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            remote: self.clone(),
        }
    }

    pub fn set_scenes(&self, scenes: &[&str]) {
        self.model.lock().unwrap().scenes = scenes.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_program(&self, scene: Option<&str>) {
        self.model.lock().unwrap().program = scene.map(str::to_string);
    }

    pub fn set_preview(&self, scene: Option<&str>) {
        self.model.lock().unwrap().preview = scene.map(str::to_string);
    }

    /// Whether GetSceneList carries the preview field at all
    pub fn report_preview(&self, report: bool) {
        self.model.lock().unwrap().report_preview = report;
    }

    pub fn set_studio_mode(&self, enabled: bool) {
        self.model.lock().unwrap().studio_mode = enabled;
    }

    /// Make every request with this verb fail with `message`
    pub fn fail(&self, verb: &'static str, message: &str) {
        self.model
            .lock()
            .unwrap()
            .failures
            .insert(verb, message.to_string());
    }

    /// Make every request with this verb take `delay` before answering
    pub fn stall(&self, verb: &'static str, delay: Duration) {
        self.model.lock().unwrap().delays.insert(verb, delay);
    }

    pub fn fail_connect(&self, message: Option<&str>) {
        self.model.lock().unwrap().connect_failure = message.map(str::to_string);
    }

    pub fn stall_connect(&self, delay: Duration) {
        self.model.lock().unwrap().connect_delay = Some(delay);
    }

    /// Push an event through the most recently opened link
    pub fn push(&self, event: RemoteEvent) -> bool {
        let tap = self.model.lock().unwrap().tap.clone();
        tap.map(|tap| tap.emit(event)).unwrap_or(false)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.model.lock().unwrap().requests.clone()
    }

    pub fn verbs(&self) -> Vec<&'static str> {
        self.requests().iter().map(Request::verb).collect()
    }

    pub fn clear_requests(&self) {
        self.model.lock().unwrap().requests.clear();
    }

    pub fn opened(&self) -> usize {
        self.model.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.model.lock().unwrap().closed
    }

    pub fn program(&self) -> Option<String> {
        self.model.lock().unwrap().program.clone()
    }

    pub fn preview(&self) -> Option<String> {
        self.model.lock().unwrap().preview.clone()
    }

    pub fn current_transition(&self) -> Option<String> {
        self.model.lock().unwrap().current_transition.clone()
    }

    fn answer(&self, request: &Request) -> Result<Reply, String> {
        let mut model = self.model.lock().unwrap();
        if let Some(message) = model.failures.get(request.verb()) {
            return Err(message.clone());
        }

        let reply = match request {
            Request::GetSceneList => Reply::SceneList {
                program: model.program.clone(),
                preview: if model.report_preview {
                    model.preview.clone()
                } else {
                    None
                },
                scenes: model.scenes.clone(),
            },
            Request::SetCurrentProgramScene { scene } => {
                if !model.scenes.contains(scene) {
                    return Err(format!("No source was found by the name of `{}`.", scene));
                }
                model.program = Some(scene.clone());
                Reply::Done
            }
            Request::SetCurrentPreviewScene { scene } => {
                if !model.studio_mode {
                    return Err("Studio mode is not active.".to_string());
                }
                model.preview = Some(scene.clone());
                Reply::Done
            }
            Request::GetStudioModeEnabled => Reply::StudioMode(model.studio_mode),
            Request::TriggerStudioModeTransition => {
                if !model.studio_mode {
                    return Err("Studio mode is not active.".to_string());
                }
                let preview = model.preview.clone();
                model.preview = model.program.take();
                model.program = preview;
                Reply::Done
            }
            Request::SetCurrentSceneTransition { transition } => {
                if !model.transitions.contains(transition) {
                    return Err(format!("No transition was found by the name of `{}`.", transition));
                }
                model.current_transition = Some(transition.clone());
                Reply::Done
            }
            Request::GetSceneTransitionList => Reply::Transitions {
                current: model.current_transition.clone(),
                transitions: model.transitions.clone(),
            },
            _ => Reply::Done,
        };
        Ok(reply)
    }
}

/// [`Connector`] producing [`FakeLink`]s bound to one [`FakeSwitcher`]
#[derive(Debug, Clone)]
pub struct FakeConnector {
    remote: FakeSwitcher,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(
        &self,
        _endpoint: &Endpoint,
        _credential: &Credential,
        events: EventTap,
    ) -> Result<Arc<dyn SwitcherLink>, String> {
        let delay = self.remote.model.lock().unwrap().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut model = self.remote.model.lock().unwrap();
        if let Some(message) = &model.connect_failure {
            return Err(message.clone());
        }
        model.opened += 1;
        model.tap = Some(events);

        Ok(Arc::new(FakeLink {
            remote: self.remote.clone(),
            closed: Mutex::new(false),
        }))
    }
}

/// One fake control channel
#[derive(Debug)]
pub struct FakeLink {
    remote: FakeSwitcher,
    closed: Mutex<bool>,
}

#[async_trait]
impl SwitcherLink for FakeLink {
    async fn call(&self, request: Request) -> Result<Reply, String> {
        if *self.closed.lock().unwrap() {
            return Err("connection closed".to_string());
        }

        let delay = {
            let mut model = self.remote.model.lock().unwrap();
            model.requests.push(request.clone());
            model.delays.get(request.verb()).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.remote.answer(&request)
    }

    async fn close(&self) {
        let mut closed = self.closed.lock().unwrap();
        if !*closed {
            *closed = true;
            self.remote.model.lock().unwrap().closed += 1;
        }
    }
}
