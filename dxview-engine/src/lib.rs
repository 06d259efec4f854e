pub mod dimension;
pub mod geometry;
pub mod hatch;
pub mod palette;
pub mod scene;
pub mod stats;
pub mod style;
pub mod text;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, Clone, PartialEq)]
    pub enum EngineError {
        #[error("block `{block}` exceeds the nesting limit of {limit}")]
        RecursionLimitExceeded { block: String, limit: usize },
        #[error("entity type {kind} is not supported")]
        UnsupportedEntity { kind: String },
        #[error("failed to derive {kind} geometry: {reason}")]
        GeometryDerivationFailure { kind: &'static str, reason: String },
        #[error("block `{name}` is not defined")]
        MissingBlock { name: String },
        #[error("block `{block}` requests {requested} instances, over the limit of {limit}")]
        InstanceLimitExceeded {
            block: String,
            requested: u64,
            limit: usize,
        },
    }

    impl EngineError {
        #[inline]
        pub fn geometry(kind: &'static str, reason: impl Into<String>) -> Self {
            EngineError::GeometryDerivationFailure {
                kind,
                reason: reason.into(),
            }
        }
    }
}

pub use errors::EngineError;
pub use scene::{DrawItem, Primitive, RenderOptions, RenderOutput, RenderReport, render_document};
pub use stats::{DocumentStatistics, document_statistics};
