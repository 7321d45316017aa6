use crate::error::{FeatureError, Result};
use facerec_core::Matrix;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io::{Read, Write};

// --- Layer Trait Definition ---

/// A subspace-learning stage: learns a projection from training columns and
/// maps new columns into the learned feature space.
///
/// Implementations are driven through `Box<dyn FeatureLayer>` by the
/// database, which owns mean removal and persistence of projections.
pub trait FeatureLayer: Debug {
    /// Short label used in logs and reports, e.g. `"PCA"`.
    fn name(&self) -> &'static str;

    /// Learns the layer from `x` (one training sample per column).
    ///
    /// `labels[j]` is the class of column `j`, in `0..num_classes`. Returns
    /// the learned projection basis (`x.rows() x k`, one basis vector per
    /// column), or `None` when the layer has no basis of its own.
    fn compute(&mut self, x: &Matrix, labels: &[usize], num_classes: usize) -> Result<Option<Matrix>>;

    /// Maps columns of `x` into the feature space.
    fn project(&self, x: &Matrix) -> Result<Matrix>;

    fn save(&self, w: &mut dyn Write) -> Result<()>;

    fn load(&mut self, r: &mut dyn Read) -> Result<()>;

    /// Human-readable summary of the learned model.
    fn describe(&self) -> String;

    // Shared checks, callable from implementations.
    fn validate_inputs(&self, x: &Matrix, labels: &[usize], num_classes: usize) -> Result<()> {
        if labels.len() != x.cols() {
            return Err(FeatureError::InvalidInput(format!(
                "{} labels for {} training columns",
                labels.len(),
                x.cols()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= num_classes) {
            return Err(FeatureError::InvalidInput(format!(
                "label {} is outside 0..{}",
                bad, num_classes
            )));
        }
        Ok(())
    }
}

// --- Layer Implementations ---

pub mod identity;
pub mod pca;

// --- Layer Parameter Definitions ---

/// How many principal components a PCA layer keeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ComponentCount {
    /// Every component with a numerically positive eigenvalue.
    #[default]
    Auto,
    /// The `k` leading components, capped by the number of positive eigenvalues.
    Fixed(usize),
    /// The fewest leading components whose eigenvalues reach this fraction
    /// of the total variance, in `(0, 1]`.
    Energy(f64),
}

/// Principal Component Analysis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PcaConfig {
    pub components: ComponentCount,
}

impl PcaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(components: ComponentCount) -> Self {
        Self { components }
    }

    /// Number of components to keep from `eigenvalues`, sorted descending and all positive.
    pub(crate) fn select(&self, eigenvalues: &[f64]) -> Result<usize> {
        let available = eigenvalues.len();
        match self.components {
            ComponentCount::Auto => Ok(available),
            ComponentCount::Fixed(0) => Err(FeatureError::InvalidComponents(
                "at least one component is required".to_string(),
            )),
            ComponentCount::Fixed(k) => {
                if k > available {
                    log::warn!("Requested {} components, only {} available", k, available);
                }
                Ok(k.min(available))
            }
            ComponentCount::Energy(f) if !(f > 0.0 && f <= 1.0) => Err(
                FeatureError::InvalidComponents(format!("energy fraction {} is outside (0, 1]", f)),
            ),
            ComponentCount::Energy(f) => {
                let total: f64 = eigenvalues.iter().sum();
                let mut acc = 0.0;
                for (i, &l) in eigenvalues.iter().enumerate() {
                    acc += l;
                    if acc >= f * total {
                        return Ok(i + 1);
                    }
                }
                Ok(available)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_components() {
        let values = [6.0, 3.0, 1.0];
        assert_eq!(PcaConfig::new().select(&values).unwrap(), 3);
        let fixed = PcaConfig::with_params(ComponentCount::Fixed(2));
        assert_eq!(fixed.select(&values).unwrap(), 2);
        let capped = PcaConfig::with_params(ComponentCount::Fixed(10));
        assert_eq!(capped.select(&values).unwrap(), 3);
        let energy = PcaConfig::with_params(ComponentCount::Energy(0.9));
        assert_eq!(energy.select(&values).unwrap(), 2);
        let all = PcaConfig::with_params(ComponentCount::Energy(1.0));
        assert_eq!(all.select(&values).unwrap(), 3);
    }

    #[test]
    fn test_select_rejects_bad_params() {
        let values = [1.0];
        assert!(PcaConfig::with_params(ComponentCount::Fixed(0)).select(&values).is_err());
        assert!(PcaConfig::with_params(ComponentCount::Energy(0.0)).select(&values).is_err());
        assert!(PcaConfig::with_params(ComponentCount::Energy(1.5)).select(&values).is_err());
        assert!(PcaConfig::with_params(ComponentCount::Energy(f64::NAN)).select(&values).is_err());
    }
}
