use thiserror::Error;

use crate::fault::FaultEvent;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Process-fatal fault: {0}")]
    Fatal(Box<FaultEvent>),
}
