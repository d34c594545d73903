use audita_types::{ContentHash, EvidenceError};

/// Recording a node would close a cycle in the provenance graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provenance cycle: recording {output} would close the path {}", render_path(.path))]
pub struct CycleError {
    pub output: ContentHash,
    /// Hashes along the offending path, starting and ending at `output`.
    pub path: Vec<ContentHash>,
}

fn render_path(path: &[ContentHash]) -> String {
    path.iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Storage backend errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("input evidence {0} is not recorded")]
    UnknownInput(ContentHash),

    #[error("evidence {0} not found")]
    NotFound(ContentHash),

    #[error("evidence integrity check failed: {0}")]
    Integrity(#[from] EvidenceError),

    #[error("replay failed for method '{method_id}': {detail}")]
    Replay { method_id: String, detail: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
