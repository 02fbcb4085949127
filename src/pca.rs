// Principal component analysis (PCA) with selectable output dimension

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::dimensionality::select_dimension;
use crate::error::{LearnError, Result};
use crate::linalg_backends::{BackendSVD, LinAlgBackendProvider};

const SNAPSHOT_FORMAT: &str = "pca";
const SNAPSHOT_VERSION: u32 = 1;

/// How `solve` decides how many principal components to keep.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DimensionSelection {
    /// Keep exactly this many leading components.
    FixedCount(usize),
    /// Keep the fewest components whose cumulative share of the variance is at
    /// least this fraction, or all components if the target is never reached.
    FixedVariability(f64),
    /// Maximize the profile likelihood of a signal-plus-isotropic-noise model.
    #[default]
    Auto,
}

impl DimensionSelection {
    /// Checks the mode parameter.
    ///
    /// # Errors
    /// `InvalidConfiguration` for a zero count or a variability outside `(0, 1]`.
    pub fn validate(self) -> Result<Self> {
        match self {
            DimensionSelection::FixedCount(0) => Err(LearnError::invalid_config(
                "dimensions",
                "at least one component must be retained",
            )),
            DimensionSelection::FixedVariability(v) if !(v > 0.0 && v <= 1.0) => {
                Err(LearnError::invalid_config(
                    "percent_variability",
                    format!("{} is not a fraction in (0, 1]", v),
                ))
            }
            valid => Ok(valid),
        }
    }
}

/// Result of a `solve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Solution {
    /// Rows are the leading eigenvectors. Shape: (k, n_features)
    projection: Array2<f64>,
    /// Covariance eigenvalues in descending order. Shape: (d)
    eigenvalues: Array1<f64>,
    /// Mean of the training observations. Shape: (n_features)
    mean: Array1<f64>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format: &'a str,
    version: u32,
    selection: DimensionSelection,
    dimensions: usize,
    percent_variability: f64,
    solution: &'a Solution,
}

#[derive(Deserialize)]
struct Snapshot {
    format: String,
    version: u32,
    selection: DimensionSelection,
    dimensions: usize,
    percent_variability: f64,
    solution: Solution,
}

/// Principal component analysis engine.
///
/// Datasets are `(n_features, n_observations)` matrices: each column is one
/// observation. `solve` computes the eigen-structure of the data and stores a
/// `(k, n_features)` projection matrix; `project` applies it.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use pca_classify::Pca;
///
/// // Four observations in two dimensions, almost on a line.
/// let data = array![[1.0, 2.0, 3.0, 4.0], [1.1, 1.9, 3.2, 3.9]];
/// let mut pca = Pca::with_dimensions(1).unwrap();
/// pca.solve(data.view()).unwrap();
/// assert_eq!(pca.project(data.view(), false).unwrap().dim(), (1, 4));
/// assert!(pca.percent_variability() > 0.99);
/// ```
#[derive(Debug, Clone)]
pub struct Pca {
    selection: DimensionSelection,
    num_reduced_dimensions: usize,
    percent_variability: f64,
    solution: Option<Solution>,
}

impl Default for Pca {
    fn default() -> Self {
        Self::new()
    }
}

impl Pca {
    /// Creates a PCA that chooses its dimension automatically.
    pub fn new() -> Self {
        Self {
            selection: DimensionSelection::Auto,
            num_reduced_dimensions: 0,
            percent_variability: 0.0,
            solution: None,
        }
    }

    /// Creates a PCA that keeps exactly `dimensions` components.
    pub fn with_dimensions(dimensions: usize) -> Result<Self> {
        Self::with_selection(DimensionSelection::FixedCount(dimensions))
    }

    /// Creates a PCA that keeps at least `variability` of the variance.
    pub fn with_variability(variability: f64) -> Result<Self> {
        Self::with_selection(DimensionSelection::FixedVariability(variability))
    }

    pub fn with_selection(selection: DimensionSelection) -> Result<Self> {
        let mut pca = Self::new();
        pca.configure(selection)?;
        Ok(pca)
    }

    /// Switches to a fixed number of components and discards any solution.
    pub fn set_dimensions(&mut self, dimensions: usize) -> Result<()> {
        self.configure(DimensionSelection::FixedCount(dimensions))
    }

    /// Switches to a variability target and discards any solution.
    pub fn set_percent_variability(&mut self, variability: f64) -> Result<()> {
        self.configure(DimensionSelection::FixedVariability(variability))
    }

    /// Switches to automatic selection and discards any solution.
    pub fn set_auto_dimension(&mut self) {
        self.selection = DimensionSelection::Auto;
        self.num_reduced_dimensions = 0;
        self.percent_variability = 0.0;
        self.solution = None;
    }

    fn configure(&mut self, selection: DimensionSelection) -> Result<()> {
        let selection = selection.validate()?;
        let (dimensions, variability) = match selection {
            DimensionSelection::FixedCount(k) => (k, 0.0),
            DimensionSelection::FixedVariability(v) => (0, v),
            DimensionSelection::Auto => (0, 0.0),
        };
        self.selection = selection;
        self.num_reduced_dimensions = dimensions;
        self.percent_variability = variability;
        self.solution = None;
        Ok(())
    }

    pub fn selection(&self) -> DimensionSelection {
        self.selection
    }

    /// Number of retained components after `solve`; before it, the configured
    /// count (or 0 when none is configured).
    pub fn dimensions(&self) -> usize {
        self.num_reduced_dimensions
    }

    /// Fraction of variance retained after `solve`; before it, the configured
    /// target (or 0 when none is configured).
    pub fn percent_variability(&self) -> f64 {
        self.percent_variability
    }

    pub fn is_solved(&self) -> bool {
        self.solution.is_some()
    }

    /// The `(k, n_features)` projection matrix, if solved.
    pub fn projection_matrix(&self) -> Option<&Array2<f64>> {
        self.solution.as_ref().map(|s| &s.projection)
    }

    /// Covariance eigenvalues of the training data in descending order, if solved.
    pub fn eigenvalues(&self) -> Option<&Array1<f64>> {
        self.solution.as_ref().map(|s| &s.eigenvalues)
    }

    /// Mean observation of the training data, if solved.
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.solution.as_ref().map(|s| &s.mean)
    }

    /// Cumulative variability `c_k` for `k = 1..=d`, if solved.
    pub fn variability_curve(&self) -> Option<Array1<f64>> {
        self.solution.as_ref().map(|s| cumulative_variability(&s.eigenvalues))
    }

    /// Computes the projection for `dataset` according to the selection mode.
    ///
    /// The data is centered on its mean, decomposed with an SVD of its
    /// transpose, and the eigenvalues `S_i^2 / N` drive the choice of `k`.
    /// Any previous solution is replaced; on error the model is unchanged.
    ///
    /// * `dataset` - shape (n_features, n_observations), at least two observations.
    ///
    /// # Errors
    /// `EmptyDataset` for fewer than two observations or zero features;
    /// `NumericalSingularity` if the data has no variance or automatic
    /// selection finds no usable split; `InvalidConfiguration` if a fixed count
    /// exceeds the number of available components.
    pub fn solve(&mut self, dataset: ArrayView2<f64>) -> Result<()> {
        let (n_features, n_samples) = dataset.dim();
        if n_features == 0 || n_samples == 0 {
            return Err(LearnError::empty("dataset has zero features or zero observations"));
        }
        if n_samples < 2 {
            return Err(LearnError::empty("PCA needs at least 2 observations"));
        }

        let start = Instant::now();
        let mean = dataset
            .mean_axis(Axis(1))
            .ok_or_else(|| LearnError::empty("failed to compute the dataset mean"))?;

        // Observations as rows: (n_samples, n_features)
        let mut centered = dataset.t().to_owned();
        centered -= &mean;

        let svd = LinAlgBackendProvider.svd_into(centered, false, true)?;
        let vt = svd
            .vt
            .ok_or_else(|| LearnError::Decomposition("SVD returned no right singular vectors".into()))?;
        let d = svd.s.len().min(vt.nrows());
        let eigenvalues = svd.s.slice(s![..d]).mapv(|sv| sv * sv / n_samples as f64);
        debug!(
            "Decomposed {}x{} centered data into {} eigenvalues in {:?}",
            n_samples,
            n_features,
            d,
            start.elapsed()
        );

        let total_variance = eigenvalues.sum();
        if !(total_variance > 0.0) || !total_variance.is_finite() {
            return Err(LearnError::NumericalSingularity {
                reason: format!("total variance of the data is {}", total_variance),
            });
        }
        let curve = cumulative_variability(&eigenvalues);

        let k = match self.selection {
            DimensionSelection::FixedCount(k) => {
                if k > d {
                    return Err(LearnError::invalid_config(
                        "dimensions",
                        format!("{} components requested but the data supports {}", k, d),
                    ));
                }
                k
            }
            DimensionSelection::FixedVariability(target) => {
                match curve.iter().position(|&c| c >= target) {
                    Some(index) => index + 1,
                    None => {
                        warn!(
                            "Variability target {} is unattainable (max {}); keeping all {} components.",
                            target,
                            curve[d - 1],
                            d
                        );
                        d
                    }
                }
            }
            DimensionSelection::Auto => select_dimension(&eigenvalues.to_vec(), n_samples)?,
        };

        let projection = vt.slice(s![..k, ..]).to_owned();
        self.num_reduced_dimensions = k;
        self.percent_variability = curve[k - 1];
        self.solution = Some(Solution {
            projection,
            eigenvalues,
            mean,
        });

        info!(
            "Solved PCA ({:?}) on {} observations x {} features in {:?}: kept {} components, {:.4} of variance.",
            self.selection,
            n_samples,
            n_features,
            start.elapsed(),
            k,
            self.percent_variability
        );
        Ok(())
    }

    fn solved(&self) -> Result<&Solution> {
        self.solution.as_ref().ok_or(LearnError::NotSolved)
    }

    /// Applies the projection to the columns of `matrix`.
    ///
    /// Forward (`reverse == false`) maps `(n_features, m)` to `(k, m)`;
    /// reverse maps `(k, m)` back to `(n_features, m)` with the transpose.
    /// The mean is neither subtracted nor added back.
    ///
    /// # Errors
    /// `NotSolved` before `solve`; `DimensionMismatch` for a wrong row count.
    pub fn project(&self, matrix: ArrayView2<f64>, reverse: bool) -> Result<Array2<f64>> {
        let projection = &self.solved()?.projection;
        if reverse {
            check_rows("reverse projection input", projection.nrows(), matrix.nrows())?;
            Ok(projection.t().dot(&matrix))
        } else {
            check_rows("projection input", projection.ncols(), matrix.nrows())?;
            Ok(projection.dot(&matrix))
        }
    }

    /// Single-vector form of `project`.
    pub fn project_vector(&self, vector: ArrayView1<f64>, reverse: bool) -> Result<Array1<f64>> {
        let projection = &self.solved()?.projection;
        if reverse {
            check_rows("reverse projection input", projection.nrows(), vector.len())?;
            Ok(projection.t().dot(&vector))
        } else {
            check_rows("projection input", projection.ncols(), vector.len())?;
            Ok(projection.dot(&vector))
        }
    }

    /// Writes the solved model to `writer` using bincode.
    ///
    /// # Errors
    /// `NotSolved` if there is no solution, or an encoding error.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        let snapshot = SnapshotRef {
            format: SNAPSHOT_FORMAT,
            version: SNAPSHOT_VERSION,
            selection: self.selection,
            dimensions: self.num_reduced_dimensions,
            percent_variability: self.percent_variability,
            solution: self.solved()?,
        };
        bincode::serde::encode_into_std_write(&snapshot, writer, bincode::config::standard())
            .map_err(|e| LearnError::Persistence(format!("failed to encode PCA model: {}", e)))?;
        Ok(())
    }

    /// Reads a model written by `save` and checks it for consistency.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let snapshot: Snapshot = bincode::serde::decode_from_std_read(reader, bincode::config::standard())
            .map_err(|e| LearnError::Persistence(format!("failed to decode PCA model: {}", e)))?;
        Self::from_snapshot(snapshot)
    }

    /// Saves the solved model to a file.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Loads a model previously written with `save_model`.
    pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        Self::load(&mut reader)
    }

    fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(LearnError::Persistence(format!(
                "expected a '{}' model, found '{}'",
                SNAPSHOT_FORMAT, snapshot.format
            )));
        }
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LearnError::Persistence(format!(
                "unsupported PCA model version {}",
                snapshot.version
            )));
        }
        let selection = snapshot
            .selection
            .validate()
            .map_err(|e| LearnError::Persistence(format!("saved selection mode is invalid: {}", e)))?;

        let solution = snapshot.solution;
        let (k, n_features) = solution.projection.dim();
        if k == 0 || k != snapshot.dimensions {
            return Err(LearnError::Persistence(format!(
                "projection has {} rows but the model records {} dimensions",
                k, snapshot.dimensions
            )));
        }
        if solution.mean.len() != n_features || solution.eigenvalues.len() < k {
            return Err(LearnError::Persistence(format!(
                "inconsistent model shapes: projection {}x{}, mean {}, eigenvalues {}",
                k,
                n_features,
                solution.mean.len(),
                solution.eigenvalues.len()
            )));
        }
        if !(0.0..=1.0).contains(&snapshot.percent_variability) {
            return Err(LearnError::Persistence(format!(
                "recorded variability {} is not a fraction",
                snapshot.percent_variability
            )));
        }

        Ok(Self {
            selection,
            num_reduced_dimensions: k,
            percent_variability: snapshot.percent_variability,
            solution: Some(solution),
        })
    }
}

fn check_rows(context: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(LearnError::dimension_mismatch(context, expected, actual));
    }
    Ok(())
}

/// Cumulative share of the total variance, `c_k = Σ_{i<=k} λ_i / Σ_i λ_i`.
fn cumulative_variability(eigenvalues: &Array1<f64>) -> Array1<f64> {
    let total = eigenvalues.sum();
    let mut running = 0.0;
    eigenvalues
        .iter()
        .map(|&l| {
            running += l;
            // Rounding can push the last entries a hair past 1.
            (running / total).min(1.0)
        })
        .collect()
}
