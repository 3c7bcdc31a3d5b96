use std::sync::Arc;

use anyhow::{Context, Result};
use ruse_shared::{http::HttpResponse, uri::RUri};
use tokio::sync::oneshot;
use tracing::info;

use crate::{
    driver::{BlockingDriver, CallbackDriver, DeliveryMode},
    error::EngineError,
    transport::Transport,
    verify::{Expectation, Verifier},
};

/// One (request, verify) unit in an ordered test sequence.
#[derive(Debug, Clone)]
pub struct Stage {
    pub uri: RUri,
    pub mode: DeliveryMode,
    pub expect: Expectation,
}

impl Stage {
    pub fn new(uri: RUri, mode: DeliveryMode, expect: Expectation) -> Self {
        Self { uri, mode, expect }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainReport {
    pub stages_run: usize,
}

/// Executes stages strictly in order: a stage's verification fully resolves
/// before the next stage's request is issued. Holds no redirect logic. A
/// verification failure aborts the remaining stages; finalization runs on
/// both the success and the failure exit.
pub struct ChainRunner {
    verifier: Verifier,
    stages: Vec<Stage>,
    blocking: BlockingDriver,
    callback: CallbackDriver,
    teardown: Vec<Box<dyn FnOnce() + Send>>,
}

impl ChainRunner {
    pub fn new(transport: Arc<Transport>, verifier: Verifier) -> Self {
        Self {
            verifier,
            stages: Vec::new(),
            blocking: BlockingDriver::new(transport.clone()),
            callback: CallbackDriver::new(transport),
            teardown: Vec::new(),
        }
    }

    pub fn push_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.push_stage(stage);
        self
    }

    /// Registered teardown runs once the chain finishes, pass or fail.
    pub fn on_finalize(&mut self, f: impl FnOnce() + Send + 'static) {
        self.teardown.push(Box::new(f));
    }

    pub async fn run(mut self) -> Result<ChainReport> {
        let outcome = self.run_stages().await;
        self.finalize();
        outcome
    }

    async fn run_stages(&self) -> Result<ChainReport> {
        for (index, stage) in self.stages.iter().enumerate() {
            info!("stage {index}: {} via {:?}", stage.uri, stage.mode);
            let response = self
                .issue(stage)
                .await
                .with_context(|| format!("stage {index} request to {}", stage.uri))?;
            self.verifier
                .verify(&response, &stage.expect)
                .map_err(|mismatches| EngineError::StageFailed {
                    stage: index,
                    mismatches,
                })?;
            info!("stage {index} verified");
        }
        Ok(ChainReport {
            stages_run: self.stages.len(),
        })
    }

    async fn issue(&self, stage: &Stage) -> Result<HttpResponse, EngineError> {
        match stage.mode {
            DeliveryMode::Blocking => {
                let driver = self.blocking.clone();
                let uri = stage.uri.clone();
                tokio::task::spawn_blocking(move || driver.get(uri))
                    .await
                    .map_err(|_| EngineError::WorkerLost)?
            }
            DeliveryMode::Callback => {
                let (tx, rx) = oneshot::channel();
                self.callback.open(
                    stage.uri.clone(),
                    None,
                    Box::new(move |outcome| {
                        let _ = tx.send(outcome);
                    }),
                );
                rx.await.map_err(|_| EngineError::WorkerLost)?
            }
        }
    }

    fn finalize(&mut self) {
        for teardown in self.teardown.drain(..) {
            teardown();
        }
        info!("chain finalized");
    }
}
