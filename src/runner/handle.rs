use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

use super::RunOutcome;

/// A run executing on a background task. Completion is delivered once.
#[derive(Debug)]
pub struct RunHandle {
    token: CancellationToken,
    done: oneshot::Receiver<Result<RunOutcome>>,
}

impl RunHandle {
    pub(crate) fn new(token: CancellationToken, done: oneshot::Receiver<Result<RunOutcome>>) -> Self {
        Self { token, done }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub async fn wait(self) -> Result<RunOutcome> {
        self.done
            .await
            .map_err(|_| Error::Execution("run task stopped before reporting".to_string()))?
    }
}
