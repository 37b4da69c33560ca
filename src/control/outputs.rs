//! Recording, streaming and virtual camera toggles
//!
//! Plain pass-through: no local state is kept, OBS is the only record of
//! whether an output is running.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::error::CommandError;
use crate::switcher::Request;

use super::SessionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Output {
    Record,
    Stream,
    VirtualCam,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Record => write!(f, "recording"),
            Output::Stream => write!(f, "streaming"),
            Output::VirtualCam => write!(f, "virtual camera"),
        }
    }
}

pub struct OutputControl {
    session: Arc<SessionManager>,
}

impl OutputControl {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn start(&self, output: Output) -> Result<(), CommandError> {
        let request = match output {
            Output::Record => Request::StartRecord,
            Output::Stream => Request::StartStream,
            Output::VirtualCam => Request::StartVirtualCam,
        };
        self.session.dispatch(request).await?;
        info!("Started {}", output);
        Ok(())
    }

    pub async fn stop(&self, output: Output) -> Result<(), CommandError> {
        let request = match output {
            Output::Record => Request::StopRecord,
            Output::Stream => Request::StopStream,
            Output::VirtualCam => Request::StopVirtualCam,
        };
        self.session.dispatch(request).await?;
        info!("Stopped {}", output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SessionTimeouts;
    use crate::switcher::fake::FakeSwitcher;
    use crate::switcher::{Credential, Endpoint};

    #[tokio::test]
    async fn test_outputs_pass_through() {
        let remote = FakeSwitcher::new(&["Scene A"]);
        let (session, _inbound) =
            SessionManager::new(Arc::new(remote.connector()), SessionTimeouts::default());
        let session = Arc::new(session);
        let outputs = OutputControl::new(session.clone());

        assert_eq!(outputs.start(Output::Record).await, Err(CommandError::NotConnected));

        session
            .connect(Endpoint::new("localhost", 4455), Credential::none())
            .await
            .unwrap();
        outputs.start(Output::Record).await.unwrap();
        outputs.stop(Output::Stream).await.unwrap();
        outputs.start(Output::VirtualCam).await.unwrap();
        assert_eq!(
            remote.verbs(),
            vec!["StartRecord", "StopStream", "StartVirtualCam"]
        );
    }
}
