//! Face recognition over a database of labelled face images.
//!
//! A [`Database`] is trained from an [`ImageSource`], persisted to a
//! manifest plus a binary data file, and queried one image at a time or in
//! bulk with per-algorithm accuracy.

pub mod config;
pub mod database;
pub mod entry;
pub mod error;
pub mod source;

pub use config::{AlgorithmKind, AlgorithmMetrics, Algorithms, TrainingConfig};
pub use database::{
    nearest_neighbor, AlgorithmAccuracy, Database, Match, QueryResult, RecognitionReport,
    TrainedAlgorithm,
};
pub use entry::{class_of, is_same_class, ImageEntry};
pub use error::{FaceRecError, LoadError, Result};
pub use source::{FsImageSource, ImageSource, MemoryImageSource};

pub use facerec_core::{Matrix, Metric, NumericPolicy, PixelBuffer};
pub use facerec_features::{ComponentCount, FeatureLayer, PcaConfig};

/// Byte count rendered with a binary unit, e.g. `1.50 KB`.
pub fn human_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit = units[0];
    for &u in &units[1..] {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = u;
    }
    format!("{:.2} {}", size, unit)
}
