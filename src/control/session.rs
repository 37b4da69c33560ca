//! Control channel ownership
//!
//! The [`SessionManager`] is the only holder of the live [`SwitcherLink`].
//! Connect and disconnect are serialized so there is never more than one
//! channel, and each channel gets a fresh generation number so push events
//! from a superseded channel can be told apart from current ones.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{CommandError, ConnectionError, DispatchError};
use crate::switcher::{
    CloseReason, Connector, Credential, Endpoint, EventTap, Inbound, Reply, Request,
    SwitcherLink,
};

use super::ConnectionState;

/// Bounds applied to every remote interaction
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl From<&SessionConfig> for SessionTimeouts {
    fn from(config: &SessionConfig) -> Self {
        Self {
            request: config.request_timeout(),
            connect: config.connect_timeout(),
        }
    }
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Connection bookkeeping, mutated only by [`SessionManager`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: ConnectionState,
    pub endpoint: Option<Endpoint>,
    /// Incremented whenever a channel is opened or retired
    pub generation: u64,
    /// Failure text of the last connect attempt, if it failed
    pub last_error: Option<String>,
    /// Operator-facing line describing how the current state was reached
    pub message: String,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            endpoint: None,
            generation: 0,
            last_error: None,
            message: "Disconnected.".to_string(),
        }
    }
}

/// Owns the control channel and dispatches requests over it
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    timeouts: SessionTimeouts,
    /// Serializes connect/disconnect/close handling
    lifecycle: AsyncMutex<()>,
    link: RwLock<Option<Arc<dyn SwitcherLink>>>,
    session: Mutex<Session>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::UnboundedSender<Inbound>,
}

impl SessionManager {
    /// Create a manager and the receiving end of the inbound event queue.
    /// Every channel this manager opens publishes into that queue.
    pub fn new(
        connector: Arc<dyn Connector>,
        timeouts: SessionTimeouts,
    ) -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        let manager = Self {
            connector,
            timeouts,
            lifecycle: AsyncMutex::new(()),
            link: RwLock::new(None),
            session: Mutex::new(Session::default()),
            state_tx,
            events_tx,
        };

        (manager, events_rx)
    }

    /// Open a channel to `endpoint`. An existing channel is closed first.
    pub async fn connect(
        &self,
        endpoint: Endpoint,
        credential: Credential,
    ) -> Result<(), ConnectionError> {
        let _lifecycle = self.lifecycle.lock().await;

        if let Some(previous) = self.link.write().await.take() {
            debug!("Closing previous channel before reconnecting");
            previous.close().await;
        }

        let generation = self.update(|session| {
            session.generation += 1;
            session.state = ConnectionState::Connecting;
            session.endpoint = Some(endpoint.clone());
            session.last_error = None;
            session.message = format!("Connecting to {}...", endpoint);
            session.generation
        });

        info!("Connecting to OBS at {} (generation {})", endpoint, generation);

        let tap = EventTap::new(generation, self.events_tx.clone());
        let opened = tokio::time::timeout(
            self.timeouts.connect,
            self.connector.open(&endpoint, &credential, tap),
        )
        .await;

        let failure = match opened {
            Ok(Ok(link)) => {
                *self.link.write().await = Some(link);
                self.update(|session| {
                    session.state = ConnectionState::Connected;
                    session.message = format!("Connected to OBS Studio at {}.", endpoint);
                });
                info!("Connected to OBS at {}", endpoint);
                return Ok(());
            }
            Ok(Err(message)) => message,
            Err(_) => format!(
                "Timed out connecting to {} after {} ms",
                endpoint,
                self.timeouts.connect.as_millis()
            ),
        };

        warn!("Connection to {} failed: {}", endpoint, failure);
        self.update(|session| {
            // Events of the failed attempt must not be applied
            session.generation += 1;
            session.state = ConnectionState::Error;
            session.message = format!(
                "ERROR: {}. Check the connection settings.",
                failure.trim_end_matches('.')
            );
            session.last_error = Some(failure.clone());
        });
        Err(ConnectionError::new(failure))
    }

    /// Close the channel. Succeeds without doing anything when there is none.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let _lifecycle = self.lifecycle.lock().await;

        let link = self.link.write().await.take();
        let Some(link) = link else {
            if self.state() != ConnectionState::Disconnected {
                self.update(|session| {
                    session.state = ConnectionState::Disconnected;
                    session.message = "Disconnected from OBS Studio.".to_string();
                });
            }
            return Ok(());
        };

        self.update(|session| {
            session.generation += 1;
            session.state = ConnectionState::Disconnected;
            session.message = "Disconnected from OBS Studio.".to_string();
        });
        link.close().await;
        info!("Disconnected from OBS");
        Ok(())
    }

    /// Retire the channel of `generation` after the remote closed it.
    ///
    /// Returns true only when this call moved the session to
    /// Disconnected; repeated or stale close signals return false.
    pub async fn mark_closed(&self, generation: u64, reason: CloseReason) -> bool {
        let _lifecycle = self.lifecycle.lock().await;

        let current = {
            let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            session.generation == generation && session.state != ConnectionState::Disconnected
        };
        if !current {
            return false;
        }

        let link = self.link.write().await.take();
        self.update(|session| {
            session.generation += 1;
            session.state = ConnectionState::Disconnected;
            session.message = reason.to_string();
        });
        if let Some(link) = link {
            link.close().await;
        }
        info!("OBS closed the connection (generation {}): {}", generation, reason);
        true
    }

    /// Issue one request, bounded by the request timeout.
    ///
    /// Fails with [`CommandError::NotConnected`] without touching the
    /// network when there is no connected channel.
    pub async fn dispatch(&self, request: Request) -> Result<Reply, CommandError> {
        if self.state() != ConnectionState::Connected {
            return Err(CommandError::NotConnected);
        }
        let link = self
            .link
            .read()
            .await
            .clone()
            .ok_or(CommandError::NotConnected)?;

        let verb = request.verb();
        debug!("-> {:?}", request);

        match tokio::time::timeout(self.timeouts.request, link.call(request)).await {
            Ok(Ok(reply)) => {
                debug!("<- {} ok", verb);
                Ok(reply)
            }
            Ok(Err(message)) => {
                debug!("<- {} failed: {}", verb, message);
                Err(DispatchError::protocol(verb, message).into())
            }
            Err(_) => {
                warn!("{} timed out", verb);
                Err(DispatchError::timeout(verb, self.timeouts.request).into())
            }
        }
    }

    /// Current connectivity state
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Generation of the current channel
    pub fn generation(&self) -> u64 {
        self.snapshot().generation
    }

    /// Whether a push event or reply obtained under `generation` still
    /// describes the live channel
    pub fn accepts(&self, generation: u64) -> bool {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session.generation == generation && session.state == ConnectionState::Connected
    }

    pub fn snapshot(&self) -> Session {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Subscribe to connectivity changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn update<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let result = f(&mut session);
        let state = session.state;
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchFailure;
    use crate::switcher::fake::FakeSwitcher;
    use crate::switcher::RemoteEvent;

    fn manager(remote: &FakeSwitcher) -> (Arc<SessionManager>, mpsc::UnboundedReceiver<Inbound>) {
        let timeouts = SessionTimeouts {
            request: Duration::from_millis(200),
            connect: Duration::from_millis(500),
        };
        let (manager, inbound) = SessionManager::new(Arc::new(remote.connector()), timeouts);
        (Arc::new(manager), inbound)
    }

    fn endpoint() -> Endpoint {
        Endpoint::new("localhost", 4455)
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        let (session, _inbound) = manager(&remote);
        let mut states = session.subscribe();

        session.connect(endpoint(), Credential::none()).await.unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(remote.closed(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_when_disconnected_is_noop() {
        let remote = FakeSwitcher::new(&[]);
        let (session, _inbound) = manager(&remote);
        session.disconnect().await.unwrap();
        session.disconnect().await.unwrap();
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(remote.closed(), 0);
    }

    #[tokio::test]
    async fn test_reconnect_closes_previous_channel() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        let (session, _inbound) = manager(&remote);

        session.connect(endpoint(), Credential::none()).await.unwrap();
        let first = session.generation();
        session.connect(endpoint(), Credential::none()).await.unwrap();

        assert_eq!(remote.opened(), 2);
        assert_eq!(remote.closed(), 1);
        assert!(session.generation() > first);
        assert!(!session.accepts(first));
    }

    #[tokio::test]
    async fn test_connect_failure_returns_message_verbatim() {
        let remote = FakeSwitcher::new(&[]);
        remote.fail_connect(Some("Authentication failed."));
        let (session, _inbound) = manager(&remote);

        let err = session
            .connect(endpoint(), Credential::new(Some("wrong".into())))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Authentication failed.");
        assert_eq!(session.state(), ConnectionState::Error);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.last_error.as_deref(), Some("Authentication failed."));
        assert_eq!(
            snapshot.message,
            "ERROR: Authentication failed. Check the connection settings."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let remote = FakeSwitcher::new(&[]);
        remote.stall_connect(Duration::from_secs(60));
        let (session, _inbound) = manager(&remote);

        let err = session.connect(endpoint(), Credential::none()).await.unwrap_err();
        assert!(err.message.contains("Timed out"));
        assert_eq!(session.state(), ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_dispatch_while_disconnected_sends_nothing() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        let (session, _inbound) = manager(&remote);

        let err = session.dispatch(Request::GetSceneList).await.unwrap_err();
        assert_eq!(err, CommandError::NotConnected);
        assert!(remote.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_has_protocol_error_shape() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        let (session, _inbound) = manager(&remote);
        session.connect(endpoint(), Credential::none()).await.unwrap();

        remote.stall("GetSceneList", Duration::from_secs(30));
        let timed_out = session.dispatch(Request::GetSceneList).await.unwrap_err();

        remote.stall("GetSceneList", Duration::ZERO);
        remote.fail("GetSceneList", "boom");
        let rejected = session.dispatch(Request::GetSceneList).await.unwrap_err();

        match (timed_out, rejected) {
            (CommandError::Dispatch(a), CommandError::Dispatch(b)) => {
                assert_eq!(a.kind, DispatchFailure::Timeout);
                assert_eq!(b.kind, DispatchFailure::Protocol);
                assert_eq!(a.verb, b.verb);
            }
            other => panic!("unexpected errors: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mark_closed_is_idempotent() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        let (session, _inbound) = manager(&remote);
        session.connect(endpoint(), Credential::none()).await.unwrap();
        let generation = session.generation();

        assert!(session.mark_closed(generation, CloseReason::ServerStopping).await);
        assert!(!session.mark_closed(generation, CloseReason::StreamEnded).await);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.snapshot().message, "OBS WebSocket server stopped.");
    }

    #[tokio::test]
    async fn test_stale_close_does_not_affect_new_channel() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        let (session, _inbound) = manager(&remote);
        session.connect(endpoint(), Credential::none()).await.unwrap();
        let old = session.generation();
        session.connect(endpoint(), Credential::none()).await.unwrap();

        assert!(!session.mark_closed(old, CloseReason::StreamEnded).await);
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_events_are_tagged_with_generation() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        let (session, mut inbound) = manager(&remote);
        session.connect(endpoint(), Credential::none()).await.unwrap();

        assert!(remote.push(RemoteEvent::SceneListChanged));
        let event = inbound.recv().await.unwrap();
        assert_eq!(event.generation, session.generation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interleaved_connect_disconnect_settles_on_last_outcome() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        remote.stall_connect(Duration::from_millis(100));
        let (session, _inbound) = manager(&remote);

        let connecting = tokio::spawn({
            let session = session.clone();
            async move { session.connect(endpoint(), Credential::none()).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(session.state(), ConnectionState::Connecting);

        // Waits for the pending connect to settle, then closes it
        session.disconnect().await.unwrap();
        connecting.await.unwrap().unwrap();

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(remote.opened(), remote.closed());
    }
}
