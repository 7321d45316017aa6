use facerec_core::{Metric, NumericPolicy};
use facerec_features::PcaConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The recognition algorithms a database can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmKind {
    Pca,
    Lda,
    Ica,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 3] = [AlgorithmKind::Pca, AlgorithmKind::Lda, AlgorithmKind::Ica];

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmKind::Pca => "PCA",
            AlgorithmKind::Lda => "LDA",
            AlgorithmKind::Ica => "ICA",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which algorithms are trained, persisted and used for recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Algorithms {
    pub pca: bool,
    pub lda: bool,
    pub ica: bool,
}

impl Default for Algorithms {
    fn default() -> Self {
        Self {
            pca: true,
            lda: false,
            ica: false,
        }
    }
}

impl Algorithms {
    pub fn new(pca: bool, lda: bool, ica: bool) -> Self {
        Self { pca, lda, ica }
    }

    pub fn is_enabled(&self, kind: AlgorithmKind) -> bool {
        match kind {
            AlgorithmKind::Pca => self.pca,
            AlgorithmKind::Lda => self.lda,
            AlgorithmKind::Ica => self.ica,
        }
    }

    /// The PCA basis is learned whenever any algorithm is enabled, since LDA builds on it.
    pub fn needs_pca_basis(&self) -> bool {
        self.pca || self.lda || self.ica
    }

    /// Flags from names such as `["pca", "lda"]`; unknown names are logged and skipped.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut algorithms = Self::new(false, false, false);
        for name in names {
            match name.to_ascii_lowercase().as_str() {
                "pca" => algorithms.pca = true,
                "lda" => algorithms.lda = true,
                "ica" => algorithms.ica = true,
                other => log::warn!("Unknown algorithm '{}' ignored", other),
            }
        }
        algorithms
    }

    pub fn enabled(&self) -> impl Iterator<Item = AlgorithmKind> + '_ {
        AlgorithmKind::ALL.into_iter().filter(|k| self.is_enabled(*k))
    }
}

/// Distance metric used by each algorithm's nearest-neighbor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmMetrics {
    pub pca: Metric,
    pub lda: Metric,
    pub ica: Metric,
}

impl Default for AlgorithmMetrics {
    fn default() -> Self {
        Self {
            pca: Metric::L2,
            lda: Metric::L2,
            ica: Metric::Cosine,
        }
    }
}

impl AlgorithmMetrics {
    pub fn get(&self, kind: AlgorithmKind) -> Metric {
        match kind {
            AlgorithmKind::Pca => self.pca,
            AlgorithmKind::Lda => self.lda,
            AlgorithmKind::Ica => self.ica,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrainingConfig {
    pub algorithms: Algorithms,
    pub pca: PcaConfig,
    pub metrics: AlgorithmMetrics,
    pub policy: NumericPolicy,
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithms(mut self, algorithms: Algorithms) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn with_pca(mut self, pca: PcaConfig) -> Self {
        self.pca = pca;
        self
    }

    pub fn with_metric(mut self, kind: AlgorithmKind, metric: Metric) -> Self {
        match kind {
            AlgorithmKind::Pca => self.metrics.pca = metric,
            AlgorithmKind::Lda => self.metrics.lda = metric,
            AlgorithmKind::Ica => self.metrics.ica = metric,
        }
        self
    }

    pub fn with_policy(mut self, policy: NumericPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::new();
        assert_eq!(config.algorithms.enabled().collect::<Vec<_>>(), vec![AlgorithmKind::Pca]);
        assert_eq!(config.metrics.get(AlgorithmKind::Lda), Metric::L2);
        assert_eq!(config.metrics.get(AlgorithmKind::Ica), Metric::Cosine);
        assert_eq!(config.policy, NumericPolicy::Strict);
    }

    #[test]
    fn test_builders() {
        let config = TrainingConfig::new()
            .with_algorithms(Algorithms::new(false, true, false))
            .with_metric(AlgorithmKind::Lda, Metric::Cosine)
            .with_policy(NumericPolicy::Propagate);
        assert!(config.algorithms.needs_pca_basis());
        assert!(!config.algorithms.is_enabled(AlgorithmKind::Pca));
        assert_eq!(config.metrics.lda, Metric::Cosine);
        assert!(!Algorithms::new(false, false, false).needs_pca_basis());
    }

    #[test]
    fn test_from_names() {
        assert_eq!(Algorithms::from_names(["PCA", "ica"]), Algorithms::new(true, false, true));
        assert_eq!(Algorithms::from_names(["svm"]), Algorithms::new(false, false, false));
    }
}
