// src/nearest_neighbor.rs

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use log::{debug, info};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::error::{LearnError, Result};
use crate::metric::{Metric, PNorm};
use crate::Label;

const SNAPSHOT_FORMAT: &str = "nearest-neighbor";
const SNAPSHOT_VERSION: u32 = 1;

/// Memorized training data.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrainingSet {
    /// Shape: (n_features, n_observations)
    observations: Array2<f64>,
    labels: Vec<Label>,
}

#[derive(Serialize)]
struct SnapshotRef<'a, M> {
    format: &'a str,
    version: u32,
    metric_kind: &'a str,
    metric: &'a M,
    training: &'a TrainingSet,
}

#[derive(Deserialize)]
struct Snapshot<M> {
    format: String,
    version: u32,
    metric_kind: String,
    metric: M,
    training: TrainingSet,
}

/// Nearest-neighbor classifier.
///
/// Training stores a copy of the labeled observations. A query receives the
/// label of the training observation at minimum distance under the injected
/// metric; when several are equally close, the lowest column index wins.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use pca_classify::{Classifier, NearestNeighbor, PNorm};
///
/// // Two observations in two dimensions, one per column.
/// let observations = array![[0.0, 10.0], [0.0, 10.0]];
/// let mut nn = NearestNeighbor::with_metric(PNorm::manhattan());
/// nn.train(observations.view(), &[3, 7]).unwrap();
/// assert_eq!(nn.predict(array![9.0, 8.0].view()).unwrap(), 7);
/// ```
#[derive(Debug, Clone)]
pub struct NearestNeighbor<M: Metric = PNorm> {
    metric: M,
    training: Option<TrainingSet>,
}

impl NearestNeighbor<PNorm> {
    /// Creates an untrained classifier using the Euclidean distance.
    pub fn new() -> Self {
        Self::with_metric(PNorm::euclidean())
    }

    /// Loads a classifier previously written with `save_model`.
    pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_model_with_metric(path)
    }
}

impl Default for NearestNeighbor<PNorm> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Metric> NearestNeighbor<M> {
    /// Creates an untrained classifier using `metric`.
    pub fn with_metric(metric: M) -> Self {
        Self {
            metric,
            training: None,
        }
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    pub fn is_trained(&self) -> bool {
        self.training.is_some()
    }

    /// Number of memorized observations (0 before training).
    pub fn n_observations(&self) -> usize {
        self.training
            .as_ref()
            .map_or(0, |t| t.observations.ncols())
    }

    /// Feature dimension of the training set, if trained.
    pub fn n_features(&self) -> Option<usize> {
        self.training.as_ref().map(|t| t.observations.nrows())
    }

    fn trained(&self) -> Result<&TrainingSet> {
        self.training.as_ref().ok_or(LearnError::NotTrained)
    }

    /// Returns the column index of the closest training observation and its
    /// distance to `query`.
    ///
    /// Scans columns `0..m` in order and only replaces the current best on a
    /// strictly smaller distance, so ties resolve to the first index.
    ///
    /// # Errors
    /// `NotTrained` before `train`; `DimensionMismatch` if `query` does not have
    /// the training feature dimension.
    pub fn nearest(&self, query: ArrayView1<f64>) -> Result<(usize, f64)> {
        let training = self.trained()?;
        let n_features = training.observations.nrows();
        if query.len() != n_features {
            return Err(LearnError::dimension_mismatch(
                "query vector",
                n_features,
                query.len(),
            ));
        }

        let mut best: Option<(usize, f64)> = None;
        for index in 0..training.observations.ncols() {
            let distance = self
                .metric
                .distance(query, training.observations.column(index))?;
            best = match best {
                Some((_, best_distance)) if !(distance < best_distance || best_distance.is_nan()) => best,
                _ => Some((index, distance)),
            };
        }
        best.ok_or_else(|| LearnError::empty("training set has no observations"))
    }

    fn check_training_input(observations: &ArrayView2<f64>, labels: &[Label]) -> Result<()> {
        let (n_features, n_observations) = observations.dim();
        if labels.len() != n_observations {
            return Err(LearnError::dimension_mismatch(
                "training labels",
                n_observations,
                labels.len(),
            ));
        }
        if n_observations == 0 {
            return Err(LearnError::empty("training set has no observations"));
        }
        if n_features == 0 {
            return Err(LearnError::empty("training observations have zero features"));
        }
        Ok(())
    }
}

impl<M> NearestNeighbor<M>
where
    M: Metric + Serialize + DeserializeOwned,
{
    fn from_snapshot(snapshot: Snapshot<M>) -> Result<Self> {
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(LearnError::Persistence(format!(
                "expected a '{}' model, found '{}'",
                SNAPSHOT_FORMAT, snapshot.format
            )));
        }
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LearnError::Persistence(format!(
                "unsupported nearest-neighbor model version {}",
                snapshot.version
            )));
        }
        if snapshot.metric_kind != snapshot.metric.kind() {
            return Err(LearnError::Persistence(format!(
                "model was saved with a '{}' metric but is being loaded as '{}'",
                snapshot.metric_kind,
                snapshot.metric.kind()
            )));
        }
        Self::check_training_input(&snapshot.training.observations.view(), &snapshot.training.labels)
            .map_err(|e| LearnError::Persistence(format!("saved training set is invalid: {}", e)))?;

        Ok(Self {
            metric: snapshot.metric,
            training: Some(snapshot.training),
        })
    }

    /// Saves the trained classifier to a file using bincode.
    ///
    /// # Errors
    /// `NotTrained` if there is nothing to save, or an I/O / encoding error.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Loads a classifier whose metric type is `M`.
    pub fn load_model_with_metric<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let snapshot: Snapshot<M> =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .map_err(|e| LearnError::Persistence(format!("failed to decode classifier: {}", e)))?;
        Self::from_snapshot(snapshot)
    }
}

impl<M> Classifier for NearestNeighbor<M>
where
    M: Metric + Serialize + DeserializeOwned,
{
    fn train(&mut self, observations: ArrayView2<f64>, labels: &[Label]) -> Result<()> {
        Self::check_training_input(&observations, labels)?;
        self.training = Some(TrainingSet {
            observations: observations.to_owned(),
            labels: labels.to_vec(),
        });
        debug!(
            "Stored {} training observations with {} features.",
            observations.ncols(),
            observations.nrows()
        );
        Ok(())
    }

    fn predict(&self, observation: ArrayView1<f64>) -> Result<Label> {
        let (index, _) = self.nearest(observation)?;
        let training = self.trained()?;
        training
            .labels
            .get(index)
            .copied()
            .ok_or_else(|| LearnError::dimension_mismatch("training labels", index + 1, training.labels.len()))
    }

    /// Predicts all columns in parallel; the output keeps column order.
    fn test(&self, observations: ArrayView2<f64>) -> Result<Vec<Label>> {
        let training = self.trained()?;
        let n_features = training.observations.nrows();
        if observations.nrows() != n_features {
            return Err(LearnError::dimension_mismatch(
                "test observations",
                n_features,
                observations.nrows(),
            ));
        }

        let start = Instant::now();
        let labels = observations
            .axis_iter(Axis(1))
            .into_par_iter()
            .map(|column| self.predict(column))
            .collect::<Result<Vec<Label>>>()?;
        info!(
            "Classified {} observations against {} training observations in {:?}",
            labels.len(),
            training.observations.ncols(),
            start.elapsed()
        );
        Ok(labels)
    }

    fn save(&self, mut writer: &mut dyn Write) -> Result<()> {
        let training = self.trained()?;
        let snapshot = SnapshotRef {
            format: SNAPSHOT_FORMAT,
            version: SNAPSHOT_VERSION,
            metric_kind: self.metric.kind(),
            metric: &self.metric,
            training,
        };
        bincode::serde::encode_into_std_write(&snapshot, &mut writer, bincode::config::standard())
            .map_err(|e| LearnError::Persistence(format!("failed to encode classifier: {}", e)))?;
        Ok(())
    }

    fn load(&mut self, mut reader: &mut dyn Read) -> Result<()> {
        let snapshot: Snapshot<M> =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .map_err(|e| LearnError::Persistence(format!("failed to decode classifier: {}", e)))?;
        *self = Self::from_snapshot(snapshot)?;
        Ok(())
    }
}
