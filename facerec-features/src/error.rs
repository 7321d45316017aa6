use facerec_core::FaceCoreError;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, FeatureError>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Face core error: {0}")]
    FaceCoreError(#[from] FaceCoreError),

    #[error("{0} model has not been computed or loaded")]
    NotComputed(&'static str),

    #[error("Invalid component selection: {0}")]
    InvalidComponents(String),

    #[error("Training data has no variance: all eigenvalues are non-positive")]
    NoVariance,

    #[error("Invalid training input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for FeatureError {
    fn from(e: std::io::Error) -> Self {
        FeatureError::FaceCoreError(FaceCoreError::IoError(e))
    }
}
