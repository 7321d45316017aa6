//! `facerec-features`: subspace-learning layers for face recognition.
//!
//! A [`FeatureLayer`] learns a projection basis from training columns and
//! maps new columns into that space. PCA and the identity layer live here;
//! discriminant (LDA) and independent-component (ICA) layers plug in through
//! the same trait.

pub mod error;
pub mod layers;

pub use error::{FeatureError, Result};
pub use layers::{
    identity::IdentityLayer,
    pca::PcaLayer,
    ComponentCount, FeatureLayer, PcaConfig,
};

// Re-export the core types layers are written against
pub use facerec_core::{FaceCoreError, Matrix};
