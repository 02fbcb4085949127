// src/classifier.rs

use std::io::{Read, Write};

use ndarray::{ArrayView1, ArrayView2, Axis};

use crate::error::{LearnError, Result};
use crate::Label;

/// Supervised classifier over column-major observation matrices.
///
/// Observation matrices have shape `(n_features, n_observations)`: column `i`
/// is observation `i` and is index-aligned with `labels[i]`.
pub trait Classifier {
    /// Replaces any previous state with the given labeled dataset.
    ///
    /// On error the previous state is left untouched.
    fn train(&mut self, observations: ArrayView2<f64>, labels: &[Label]) -> Result<()>;

    /// Predicts the label of a single observation.
    fn predict(&self, observation: ArrayView1<f64>) -> Result<Label>;

    /// Predicts every column of `observations`, preserving column order.
    fn test(&self, observations: ArrayView2<f64>) -> Result<Vec<Label>> {
        observations
            .axis_iter(Axis(1))
            .map(|column| self.predict(column))
            .collect()
    }

    /// Runs `test` and returns the fraction of predictions that differ from
    /// `true_labels`, a value in `[0, 1]`.
    ///
    /// When `predicted` is given it receives the full predicted sequence.
    fn validate(
        &self,
        observations: ArrayView2<f64>,
        true_labels: &[Label],
        predicted: Option<&mut Vec<Label>>,
    ) -> Result<f64> {
        let n_observations = observations.ncols();
        if true_labels.len() != n_observations {
            return Err(LearnError::dimension_mismatch(
                "validation labels",
                n_observations,
                true_labels.len(),
            ));
        }
        if n_observations == 0 {
            return Err(LearnError::empty("validation set has no observations"));
        }

        let predictions = self.test(observations)?;
        let errors = predictions
            .iter()
            .zip(true_labels)
            .filter(|(p, t)| p != t)
            .count();

        if let Some(out) = predicted {
            *out = predictions;
        }
        Ok(errors as f64 / n_observations as f64)
    }

    /// Writes the complete trained state to `writer`.
    fn save(&self, writer: &mut dyn Write) -> Result<()>;

    /// Restores state previously written by `save`.
    ///
    /// Predictions after a successful load are identical to those made
    /// before the save.
    fn load(&mut self, reader: &mut dyn Read) -> Result<()>;
}
