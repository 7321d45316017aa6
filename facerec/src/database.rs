use crate::config::{AlgorithmKind, TrainingConfig};
use crate::entry::{base_name, class_of, dense_labels, is_same_class, ImageEntry};
use crate::error::{FaceRecError, LoadError, Result};
use crate::source::{enumerate, ImageSource};
use facerec_core::{
    image::load_column_from_image, io, linalg, Matrix, Metric, NumericPolicy, PixelBuffer,
};
use facerec_features::{FeatureLayer, PcaLayer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

/// The learned state of one algorithm: `w_tr` maps a mean-removed image
/// column into feature space, `p` holds the training images already mapped
/// there (one column per training entry).
#[derive(Debug, Clone)]
pub struct TrainedAlgorithm {
    pub w_tr: Matrix,
    pub p: Matrix,
}

/// Closest training entry for one algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub algorithm: AlgorithmKind,
    pub index: usize,
    pub name: String,
    pub class_id: usize,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub name: String,
    /// Class parsed from the query's file name, if it follows the convention.
    pub class_id: Option<usize>,
    pub matches: Vec<Match>,
    /// `correct[i]` tells whether `matches[i]` has the query's class.
    pub correct: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmAccuracy {
    pub algorithm: AlgorithmKind,
    pub num_correct: usize,
    pub total: usize,
    /// Percent correct; 0 for an empty query set.
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionReport {
    pub queries: Vec<QueryResult>,
    pub accuracy: Vec<AlgorithmAccuracy>,
}

impl RecognitionReport {
    pub fn accuracy_of(&self, kind: AlgorithmKind) -> Option<&AlgorithmAccuracy> {
        self.accuracy.iter().find(|a| a.algorithm == kind)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Index of the column of `p` closest to column 0 of `query`, and its distance.
///
/// Linear scan: the first column seeds the running minimum and only a
/// strictly smaller distance replaces it, so ties resolve to the earliest
/// column.
pub fn nearest_neighbor(
    p: &Matrix,
    query: &Matrix,
    metric: Metric,
    policy: NumericPolicy,
) -> Result<(usize, f64)> {
    let mut best = (0, metric.distance_with(query, 0, p, 0, policy)?);
    for j in 1..p.cols() {
        let d = metric.distance_with(query, 0, p, j, policy)?;
        if d < best.1 {
            best = (j, d);
        }
    }
    Ok(best)
}

/// Maps a collection of images to the columns of one matrix.
///
/// Every image must have the size of the first.
fn image_matrix(source: &dyn ImageSource, entries: &[ImageEntry]) -> Result<Matrix> {
    let first = source.read(&entries[0].name)?;
    let mut x = Matrix::zeros(first.len(), entries.len())?;
    load_column_from_image(&mut x, 0, &first)?;
    for (j, entry) in entries.iter().enumerate().skip(1) {
        let image = source.read(&entry.name)?;
        load_column_from_image(&mut x, j, &image)?;
    }
    Ok(x)
}

/// A trained (or loaded) face database.
#[derive(Debug)]
pub struct Database {
    config: TrainingConfig,
    entries: Vec<ImageEntry>,
    num_classes: usize,
    mean_face: Option<Matrix>,
    pca: Option<TrainedAlgorithm>,
    lda: Option<TrainedAlgorithm>,
    ica: Option<TrainedAlgorithm>,
    lda_layer: Option<Box<dyn FeatureLayer>>,
    ica_layer: Option<Box<dyn FeatureLayer>>,
}

impl Database {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            num_classes: 0,
            mean_face: None,
            pca: None,
            lda: None,
            ica: None,
            lda_layer: None,
            ica_layer: None,
        }
    }

    /// Supplies the discriminant layer. It is trained on the PCA projections.
    pub fn with_lda_layer(mut self, layer: Box<dyn FeatureLayer>) -> Self {
        self.lda_layer = Some(layer);
        self
    }

    /// Supplies the independent-component layer. It is trained on the mean-removed images.
    pub fn with_ica_layer(mut self, layer: Box<dyn FeatureLayer>) -> Self {
        self.ica_layer = Some(layer);
        self
    }

    // --- Getters ---

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn num_images(&self) -> usize {
        self.entries.len()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Pixels per image, `None` before training or loading.
    pub fn num_dimensions(&self) -> Option<usize> {
        self.mean_face.as_ref().map(|m| m.rows())
    }

    pub fn mean_face(&self) -> Option<&Matrix> {
        self.mean_face.as_ref()
    }

    pub fn algorithm(&self, kind: AlgorithmKind) -> Option<&TrainedAlgorithm> {
        match kind {
            AlgorithmKind::Pca => self.pca.as_ref(),
            AlgorithmKind::Lda => self.lda.as_ref(),
            AlgorithmKind::Ica => self.ica.as_ref(),
        }
    }

    // --- Training ---

    /// Learns every enabled algorithm from the images under `path`.
    pub fn train(&mut self, source: &dyn ImageSource, path: &Path) -> Result<()> {
        let start = Instant::now();
        let algorithms = self.config.algorithms;
        if algorithms.lda && self.lda_layer.is_none() {
            return Err(FaceRecError::MissingLayer("LDA"));
        }
        if algorithms.ica && self.ica_layer.is_none() {
            return Err(FaceRecError::MissingLayer("ICA"));
        }

        let (entries, num_classes) = enumerate(source, path)?;
        if entries.is_empty() {
            return Err(FaceRecError::EmptyTrainingSet(path.display().to_string()));
        }
        log::info!(
            "Training on {} images in {} classes from {}",
            entries.len(),
            num_classes,
            path.display()
        );

        // Mean-removed image matrix X
        let mut x = image_matrix(source, &entries)?;
        let mean_face = x.mean_column();
        x.subtract_columns(&mean_face)?;
        let (labels, _) = dense_labels(&entries);
        log::debug!("X: {}x{}", x.rows(), x.cols());

        let mut pca = None;
        let mut lda = None;
        let mut ica = None;

        if algorithms.needs_pca_basis() {
            log::info!("Computing PCA representation...");
            let mut layer = PcaLayer::with_params(self.config.pca.clone());
            layer.compute(&x, &labels, num_classes)?;
            log::debug!("{}", layer.describe());
            let p = layer.project(&x)?;
            let w_tr = linalg::transpose(layer.w.as_ref().ok_or(FaceRecError::NotTrained)?);
            pca = Some(TrainedAlgorithm { w_tr, p });
        }

        if let (true, Some(layer), Some(base)) = (algorithms.lda, self.lda_layer.as_mut(), pca.as_ref()) {
            log::info!("Computing LDA representation with {}...", layer.name());
            // The layer sees PCA space; compose so that w_tr applies to pixels
            let w_tr = match layer.compute(&base.p, &labels, num_classes)? {
                Some(w_lda) => linalg::product_transposed(&w_lda, &base.w_tr)?,
                None => base.w_tr.copy(),
            };
            let p = linalg::product(&w_tr, &x)?;
            lda = Some(TrainedAlgorithm { w_tr, p });
        }

        if let (true, Some(layer)) = (algorithms.ica, self.ica_layer.as_mut()) {
            log::info!("Computing ICA representation with {}...", layer.name());
            let w_tr = match layer.compute(&x, &labels, num_classes)? {
                Some(w_ica) => linalg::transpose(&w_ica),
                None => Matrix::identity(x.rows())?,
            };
            let p = linalg::product(&w_tr, &x)?;
            ica = Some(TrainedAlgorithm { w_tr, p });
        }

        self.entries = entries;
        self.num_classes = num_classes;
        self.mean_face = Some(mean_face);
        self.pca = pca;
        self.lda = lda;
        self.ica = ica;
        x.release();

        log::info!("Training: {:.3}s", start.elapsed().as_secs_f64());
        Ok(())
    }

    // --- Persistence ---

    /// Writes the manifest (`<class_id> <name>` per line) and the matrix data.
    ///
    /// The data file holds the mean face followed by `w_tr`, `p` for PCA,
    /// LDA and ICA in that order, each present only when trained.
    pub fn save(&self, manifest_path: &Path, data_path: &Path) -> Result<()> {
        let mean_face = self.mean_face.as_ref().ok_or(FaceRecError::NotTrained)?;

        let mut manifest = BufWriter::new(File::create(manifest_path)?);
        for entry in &self.entries {
            writeln!(manifest, "{} {}", entry.class_id, entry.name)?;
        }
        manifest.flush()?;

        let mut data = BufWriter::new(File::create(data_path)?);
        io::write_binary(mean_face, &mut data)?;
        for trained in [&self.pca, &self.lda, &self.ica].into_iter().flatten() {
            io::write_binary(&trained.w_tr, &mut data)?;
            io::write_binary(&trained.p, &mut data)?;
        }
        data.flush()?;

        log::info!(
            "Saved {} entries to {} and {}",
            self.entries.len(),
            manifest_path.display(),
            data_path.display()
        );
        Ok(())
    }

    /// Reads a database written by [`Database::save`].
    ///
    /// `config.algorithms` must name the same algorithms that were saved.
    pub fn load(manifest_path: &Path, data_path: &Path, config: TrainingConfig) -> Result<Self> {
        let algorithms = config.algorithms;
        if !algorithms.needs_pca_basis() {
            return Err(LoadError::NoAlgorithms.into());
        }

        let mut data = BufReader::new(File::open(data_path)?);
        let mean_face = io::read_binary(&mut data).map_err(LoadError::from)?;
        let dims = mean_face.rows();

        let mut read_algorithm = |kind: AlgorithmKind| -> Result<TrainedAlgorithm> {
            let w_tr = io::read_binary(&mut data).map_err(LoadError::from)?;
            let p = io::read_binary(&mut data).map_err(LoadError::from)?;
            if w_tr.cols() != dims {
                return Err(LoadError::BasisMismatch {
                    algorithm: kind.name(),
                    basis: w_tr.cols(),
                    mean: dims,
                }
                .into());
            }
            if p.rows() != w_tr.rows() {
                return Err(LoadError::ProjectionMismatch {
                    algorithm: kind.name(),
                    rows: p.rows(),
                    components: w_tr.rows(),
                }
                .into());
            }
            Ok(TrainedAlgorithm { w_tr, p })
        };

        let pca = Some(read_algorithm(AlgorithmKind::Pca)?);
        let lda = if algorithms.lda { Some(read_algorithm(AlgorithmKind::Lda)?) } else { None };
        let ica = if algorithms.ica { Some(read_algorithm(AlgorithmKind::Ica)?) } else { None };

        let mut rest = Vec::new();
        data.read_to_end(&mut rest)?;
        if !rest.is_empty() {
            return Err(LoadError::TrailingData(rest.len() as u64).into());
        }

        let entries = read_manifest(manifest_path)?;
        for trained in [&pca, &lda, &ica].into_iter().flatten() {
            if trained.p.cols() != entries.len() {
                return Err(LoadError::ImageCountMismatch {
                    manifest: entries.len(),
                    projections: trained.p.cols(),
                }
                .into());
            }
        }
        let (_, num_classes) = dense_labels(&entries);

        log::info!(
            "Loaded {} entries in {} classes, {} pixels per image",
            entries.len(),
            num_classes,
            dims
        );
        Ok(Self {
            config,
            entries,
            num_classes,
            mean_face: Some(mean_face),
            pca,
            lda,
            ica,
            lda_layer: None,
            ica_layer: None,
        })
    }

    // --- Recognition ---

    fn recognized(&self) -> impl Iterator<Item = (AlgorithmKind, &TrainedAlgorithm)> + '_ {
        self.config
            .algorithms
            .enabled()
            .filter_map(|kind| self.algorithm(kind).map(|t| (kind, t)))
    }

    /// Matches one query image against every enabled algorithm.
    pub fn recognize_image(&self, image: &PixelBuffer<u8>) -> Result<Vec<Match>> {
        let mean_face = self.mean_face.as_ref().ok_or(FaceRecError::NotTrained)?;
        let mut t = Matrix::zeros(mean_face.rows(), 1)?;
        load_column_from_image(&mut t, 0, image)?;
        t.subtract(mean_face)?;

        self.recognized()
            .map(|(kind, trained)| {
                let p_test = linalg::product(&trained.w_tr, &t)?;
                let metric = self.config.metrics.get(kind);
                let (index, distance) = nearest_neighbor(&trained.p, &p_test, metric, self.config.policy)?;
                let entry = &self.entries[index];
                Ok(Match {
                    algorithm: kind,
                    index,
                    name: entry.name.clone(),
                    class_id: entry.class_id,
                    distance,
                })
            })
            .collect()
    }

    /// Recognizes every image under `path` and tallies per-algorithm accuracy.
    pub fn recognize(&self, source: &dyn ImageSource, path: &Path) -> Result<RecognitionReport> {
        let start = Instant::now();
        if self.mean_face.is_none() {
            return Err(FaceRecError::NotTrained);
        }
        let names = source.list(path)?;

        let mut queries = Vec::with_capacity(names.len());
        let mut num_correct: Vec<(AlgorithmKind, usize)> =
            self.recognized().map(|(kind, _)| (kind, 0)).collect();

        for name in names {
            let image = source.read(&name)?;
            let matches = self.recognize_image(&image)?;
            let correct: Vec<bool> = matches.iter().map(|m| is_same_class(&m.name, &name)).collect();

            log::debug!("test image: '{}'", base_name(&name));
            for (m, ok) in matches.iter().zip(&correct) {
                log::debug!("       {}: '{}'", m.algorithm, base_name(&m.name));
                if *ok {
                    if let Some(slot) = num_correct.iter_mut().find(|slot| slot.0 == m.algorithm) {
                        slot.1 += 1;
                    }
                }
            }

            queries.push(QueryResult {
                class_id: class_of(&name),
                name,
                matches,
                correct,
            });
        }

        let total = queries.len();
        let accuracy = num_correct
            .into_iter()
            .map(|(algorithm, num_correct)| {
                let accuracy = if total == 0 {
                    0.0
                } else {
                    100.0 * num_correct as f64 / total as f64
                };
                log::info!(
                    "{}: {} / {} matched, {:.2}%",
                    algorithm,
                    num_correct,
                    total,
                    accuracy
                );
                AlgorithmAccuracy {
                    algorithm,
                    num_correct,
                    total,
                    accuracy,
                }
            })
            .collect();

        log::info!("Recognition: {:.3}s", start.elapsed().as_secs_f64());
        Ok(RecognitionReport { queries, accuracy })
    }
}

fn read_manifest(path: &Path) -> Result<Vec<ImageEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = line
            .split_once(' ')
            .and_then(|(class, name)| Some(ImageEntry::new(name, class.parse().ok()?)));
        match parsed {
            Some(entry) => entries.push(entry),
            None => {
                return Err(LoadError::MalformedManifestLine {
                    line: i + 1,
                    content: line,
                }
                .into())
            }
        }
    }
    Ok(entries)
}
