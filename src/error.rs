use thiserror::Error;

/// Error kinds for the solver. Configuration problems abort at startup,
/// everything else aborts the current run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("degenerate geometry: {0}")]
    GeometryDegenerate(String),

    #[error("underdetermined stencil for cell {cell} on rank {rank}: {donors} fluid donors")]
    StencilUnderdetermined {
        cell: usize,
        rank: usize,
        donors: usize,
    },

    #[error("linear solve diverged for \"{system}\": {detail}")]
    LinearSolveDiverged { system: String, detail: String },

    #[error("communication failure: {0}")]
    CommunicationFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
