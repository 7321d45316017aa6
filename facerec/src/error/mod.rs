mod load_error;

pub use load_error::LoadError;

use derive_more::From;
use facerec_core::FaceCoreError;
use facerec_features::FeatureError;

pub type Result<T> = core::result::Result<T, FaceRecError>;

#[derive(Debug, From)]
pub enum FaceRecError {
    // -- Externals
    #[from]
    Io(std::io::Error),

    #[from]
    FaceCoreError(FaceCoreError),

    #[from]
    FeatureError(FeatureError),

    #[from]
    Image(image::ImageError),

    #[from]
    Json(serde_json::Error),

    #[from]
    LoadError(LoadError),

    // -- Orchestration
    EmptyTrainingSet(String),

    InvalidImageName(String),

    MissingLayer(&'static str),

    NotTrained,
}

// region:    --- Error Boilerplate

impl core::fmt::Display for FaceRecError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for FaceRecError {}

// endregion: --- Error Boilerplate
