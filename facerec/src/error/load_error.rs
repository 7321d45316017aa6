use facerec_core::FaceCoreError;
use thiserror::Error;

/// Persisted database state that cannot be trusted.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Face core error: {0}")]
    FaceCoreError(#[from] FaceCoreError),

    #[error("No algorithm enabled: nothing to read from the data file")]
    NoAlgorithms,

    #[error("Manifest line {line} is malformed: '{content}'")]
    MalformedManifestLine { line: usize, content: String },

    #[error("Manifest lists {manifest} images but the stored projections have {projections} columns")]
    ImageCountMismatch { manifest: usize, projections: usize },

    #[error("{algorithm} basis has {basis} columns but the mean face has {mean} rows")]
    BasisMismatch {
        algorithm: &'static str,
        basis: usize,
        mean: usize,
    },

    #[error("{algorithm} projections have {rows} rows but the basis has {components} components")]
    ProjectionMismatch {
        algorithm: &'static str,
        rows: usize,
        components: usize,
    },

    #[error("Data file has {0} unread bytes: the enabled algorithms do not match the saved ones")]
    TrailingData(u64),
}
