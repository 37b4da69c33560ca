//! obs-websocket (v5) implementation of the switcher seam

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use obws::events::Event;
use obws::requests::ui::{Location, OpenSourceProjector, OpenVideoMixProjector, VideoMixType};
use obws::Client;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    CloseReason, Connector, Credential, Endpoint, EventTap, RemoteEvent, Reply, Request,
    SwitcherLink, VideoMix,
};

/// Opens obs-websocket connections with `obws`
#[derive(Debug, Default, Clone, Copy)]
pub struct ObwsConnector;

#[async_trait]
impl Connector for ObwsConnector {
    async fn open(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
        events: EventTap,
    ) -> Result<Arc<dyn SwitcherLink>, String> {
        let client = Client::connect(&endpoint.host, endpoint.port, credential.reveal())
            .await
            .map_err(|e| e.to_string())?;

        let raw_events = client.events().map_err(|e| e.to_string())?;
        tokio::spawn(forward_events(raw_events, events));

        info!("obs-websocket connection open to {}", endpoint);

        Ok(Arc::new(ObwsLink {
            client: RwLock::new(Some(client)),
        }))
    }
}

/// Forward relevant OBS events into the inbound queue until the stream ends
/// or the router goes away. The end of the stream is itself reported as a
/// closed connection.
async fn forward_events(raw_events: impl Stream<Item = Event> + Send + 'static, tap: EventTap) {
    tokio::pin!(raw_events);

    while let Some(event) = raw_events.next().await {
        if let Some(event) = map_event(event) {
            debug!("OBS event: {:?}", event);
            if !tap.emit(event) {
                return;
            }
        }
    }

    debug!("OBS event stream ended");
    tap.emit(RemoteEvent::ConnectionClosed(CloseReason::StreamEnded));
}

fn map_event(event: Event) -> Option<RemoteEvent> {
    match event {
        Event::CurrentProgramSceneChanged { id, .. } => {
            Some(RemoteEvent::ProgramSceneChanged(id.name))
        }
        Event::CurrentPreviewSceneChanged { id, .. } => {
            Some(RemoteEvent::PreviewSceneChanged(id.name))
        }
        Event::SceneListChanged { .. } | Event::SceneNameChanged { .. } => {
            Some(RemoteEvent::SceneListChanged)
        }
        Event::StudioModeStateChanged { enabled, .. } => {
            Some(RemoteEvent::StudioModeChanged(enabled))
        }
        Event::ExitStarted => Some(RemoteEvent::ConnectionClosed(CloseReason::ExitStarted)),
        Event::ServerStopping => Some(RemoteEvent::ConnectionClosed(CloseReason::ServerStopping)),
        Event::ServerStopped => Some(RemoteEvent::ConnectionClosed(CloseReason::ServerStopped)),
        _ => None,
    }
}

/// A live obs-websocket connection
struct ObwsLink {
    /// Taken out on close; requests share the read side concurrently
    client: RwLock<Option<Client>>,
}

#[async_trait]
impl SwitcherLink for ObwsLink {
    async fn call(&self, request: Request) -> Result<Reply, String> {
        let guard = self.client.read().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| "connection closed".to_string())?;
        execute(client, request).await.map_err(|e| e.to_string())
    }

    async fn close(&self) {
        let client = self.client.write().await.take();
        if let Some(mut client) = client {
            client.disconnect().await;
            debug!("obs-websocket connection closed");
        }
    }
}

fn location(monitor: Option<i32>) -> Option<Location> {
    monitor.map(Location::MonitorIndex)
}

async fn execute(client: &Client, request: Request) -> Result<Reply, obws::error::Error> {
    let reply = match request {
        Request::GetSceneList => {
            let list = client.scenes().list().await?;
            Reply::SceneList {
                program: list.current_program_scene.map(|id| id.name),
                preview: list.current_preview_scene.map(|id| id.name),
                scenes: list.scenes.into_iter().map(|scene| scene.id.name).collect(),
            }
        }
        Request::SetCurrentProgramScene { scene } => {
            client
                .scenes()
                .set_current_program_scene(scene.as_str())
                .await?;
            Reply::Done
        }
        Request::SetCurrentPreviewScene { scene } => {
            client
                .scenes()
                .set_current_preview_scene(scene.as_str())
                .await?;
            Reply::Done
        }
        Request::GetStudioModeEnabled => Reply::StudioMode(client.ui().studio_mode_enabled().await?),
        Request::TriggerStudioModeTransition => {
            client.transitions().trigger().await?;
            Reply::Done
        }
        Request::SetCurrentSceneTransition { transition } => {
            client.transitions().set_current(&transition).await?;
            Reply::Done
        }
        Request::GetSceneTransitionList => {
            let list = client.transitions().list().await?;
            Reply::Transitions {
                current: list.current_scene_transition.map(|id| id.name),
                transitions: list
                    .transitions
                    .into_iter()
                    .map(|transition| transition.id.name)
                    .collect(),
            }
        }
        Request::OpenVideoMixProjector { mix, monitor } => {
            let r#type = match mix {
                VideoMix::Program => VideoMixType::Program,
                VideoMix::Preview => VideoMixType::Preview,
            };
            client
                .ui()
                .open_video_mix_projector(OpenVideoMixProjector {
                    r#type,
                    location: location(monitor),
                })
                .await?;
            Reply::Done
        }
        Request::OpenSourceProjector { source, monitor } => {
            client
                .ui()
                .open_source_projector(OpenSourceProjector {
                    source: source.as_str().into(),
                    location: location(monitor),
                })
                .await?;
            Reply::Done
        }
        Request::StartRecord => {
            client.recording().start().await?;
            Reply::Done
        }
        Request::StopRecord => {
            client.recording().stop().await?;
            Reply::Done
        }
        Request::StartStream => {
            client.streaming().start().await?;
            Reply::Done
        }
        Request::StopStream => {
            client.streaming().stop().await?;
            Reply::Done
        }
        Request::StartVirtualCam => {
            client.virtual_cam().start().await?;
            Reply::Done
        }
        Request::StopVirtualCam => {
            client.virtual_cam().stop().await?;
            Reply::Done
        }
    };

    Ok(reply)
}
