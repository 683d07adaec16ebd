use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Cannot parse URL")]
    InvalidUrl,
    #[error("Transport error")]
    Transport(#[from] reqwest::Error),
    #[error("Cannot provision target: {0}")]
    Provision(String),
    #[error("Probe task failed")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Probe task terminated without reporting a result")]
    LostProbe,
    #[error("Run exceeded the deadline of {0:?}")]
    Deadline(Duration),
}
