use std::path::PathBuf;
use thiserror::Error;

/// Failure while adding rules to the engine.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("rule path {} is not valid UTF-8", .0.display())]
    InvalidPath(PathBuf),

    #[error(transparent)]
    Rules(#[from] zentinel_modsec::Error),
}

/// Failure while evaluating a request, distinct from an interruption.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transaction {id} failed while processing {stage}: {source}")]
    Transaction {
        id: String,
        stage: &'static str,
        #[source]
        source: zentinel_modsec::Error,
    },
}
