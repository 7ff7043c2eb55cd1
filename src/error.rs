use std::{io, result};
use thiserror::Error;

pub type Result<T> = result::Result<T, ShaderGraphError>;

#[derive(Debug, Error)]
pub enum ShaderGraphError {
    #[error("could not load graph `{function}` from `{file}`: {reason}")]
    GraphLoad {
        file: String,
        function: String,
        reason: String,
    },
    #[error(
        "graph `{parent}` (parameter hash {parameter_hash}) references graph `{archive_name}`, which could not be resolved"
    )]
    UnresolvedGraphReference {
        archive_name: String,
        parent: String,
        parameter_hash: u64,
    },
    #[error(
        "graph `{parent}` (parameter hash {parameter_hash}) references function `{archive_name}`, whose signature could not be resolved"
    )]
    UnresolvedSignatureReference {
        archive_name: String,
        parent: String,
        parameter_hash: u64,
    },
    #[error("while instantiating `{instantiation}` (parameter hash {parameter_hash}): {source}")]
    Generation {
        instantiation: String,
        parameter_hash: u64,
        #[source]
        source: Box<ShaderGraphError>,
    },
    #[error(
        "`{scaffold_name}` would name both `{existing}` (parameter hash {existing_hash}) and `{archive_name}` (parameter hash {parameter_hash})"
    )]
    ScaffoldNameCollision {
        scaffold_name: String,
        existing: String,
        existing_hash: u64,
        archive_name: String,
        parameter_hash: u64,
    },
    #[error("invalid `NodeId`")]
    InvalidNodeId,
    #[error("invalid `Edge`")]
    InvalidEdge,
    #[error("input `{0}` is already connected")]
    SlotOccupied(String),
    #[error("graph `{0}` contains a cycle")]
    CyclicGraph(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("function `{function}` has no parameter named `{parameter}`")]
    UnknownParameter { function: String, parameter: String },
    #[error("signature mismatch in `{function}`: {message}")]
    SignatureMismatch { function: String, message: String },
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },
    #[error("instantiation was cancelled")]
    Cancelled,
    #[error("an instantiation worker panicked")]
    WorkerPanicked,
    #[error("poisoned lock")]
    PoisonError,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl<T> From<std::sync::PoisonError<T>> for ShaderGraphError {
    fn from(_: std::sync::PoisonError<T>) -> ShaderGraphError {
        Self::PoisonError
    }
}
