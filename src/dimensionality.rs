// src/dimensionality.rs
//
// Automatic choice of the number of principal components by maximizing the
// profile likelihood of a signal-plus-isotropic-noise model of the spectrum
// (Minka, "Automatic choice of dimensionality for PCA", NIPS 2000).

use std::f64::consts::{LN_2, PI};
use std::fmt;

use log::{debug, trace, warn};
use statrs::function::gamma::ln_gamma;

use crate::error::{LearnError, Result};

/// Relative gap below which two eigenvalues count as equal.
const TIE_TOLERANCE: f64 = 1e-10;

/// Why a candidate split of the spectrum has no finite likelihood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Degeneracy {
    /// A retained eigenvalue is not strictly positive.
    NonPositiveSignal { index: usize },
    /// The mean of the discarded eigenvalues is not strictly positive.
    NonPositiveTail,
    /// A retained eigenvalue equals a discarded one, so the split point falls
    /// inside an eigenspace.
    EqualEigenvalues { i: usize, j: usize },
    NonFinite,
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degeneracy::NonPositiveSignal { index } => {
                write!(f, "retained eigenvalue {} is not positive", index + 1)
            }
            Degeneracy::NonPositiveTail => f.write_str("noise variance of the tail is not positive"),
            Degeneracy::EqualEigenvalues { i, j } => {
                write!(f, "eigenvalues {} and {} coincide", i + 1, j + 1)
            }
            Degeneracy::NonFinite => f.write_str("likelihood is not finite"),
        }
    }
}

/// Log profile likelihood of keeping the top `k` eigenvalues.
///
/// `eigenvalues` must be sorted in descending order and `1 <= k < d`.
pub(crate) fn log_likelihood(
    eigenvalues: &[f64],
    k: usize,
    n_samples: usize,
) -> std::result::Result<f64, Degeneracy> {
    let d = eigenvalues.len();
    debug_assert!(k >= 1 && k < d);
    let n = n_samples as f64;
    let kf = k as f64;
    let df = d as f64;

    if let Some(index) = eigenvalues[..k].iter().position(|&l| !(l > 0.0)) {
        return Err(Degeneracy::NonPositiveSignal { index });
    }

    // Prior over the k-dimensional subspace (uniform on the Stiefel manifold).
    let mut p_u = -kf * LN_2;
    for i in 1..=k {
        let half = (df - i as f64 + 1.0) / 2.0;
        p_u += ln_gamma(half) - half * PI.ln();
    }

    let p_signal = -n / 2.0 * eigenvalues[..k].iter().map(|l| l.ln()).sum::<f64>();

    let v = eigenvalues[k..].iter().sum::<f64>() / (d - k) as f64;
    if !(v > 0.0) {
        return Err(Degeneracy::NonPositiveTail);
    }
    let p_tail = -n * (df - kf) / 2.0 * v.ln();

    // Free parameters of a k-dimensional subspace embedded in d dimensions.
    let m = df * kf - kf * (kf - 1.0) / 2.0;
    let p_params = (m + kf) / 2.0 * (2.0 * PI).ln();

    let estimate = |idx: usize| if idx < k { eigenvalues[idx] } else { v };
    let mut log_det_az = 0.0;
    for i in 0..k {
        for j in (i + 1)..d {
            if tied(eigenvalues[i], eigenvalues[j]) {
                if j < k {
                    // Rotations within a retained eigenspace leave the likelihood flat.
                    continue;
                }
                return Err(Degeneracy::EqualEigenvalues { i, j });
            }
            let term = (1.0 / estimate(j) - 1.0 / estimate(i)) * (eigenvalues[i] - eigenvalues[j]);
            if !(term > 0.0) {
                return Err(Degeneracy::EqualEigenvalues { i, j });
            }
            log_det_az += term.ln() + n.ln();
        }
    }

    let likelihood = p_u + p_signal + p_tail + p_params - log_det_az / 2.0 - kf / 2.0 * n.ln();
    if likelihood.is_finite() {
        Ok(likelihood)
    } else {
        Err(Degeneracy::NonFinite)
    }
}

fn tied(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs())
}

/// Profile likelihood for every candidate `k` in `0..d`.
///
/// Entry 0 is always `-inf`; degenerate candidates are also `-inf` and are
/// reported with `warn!`.
pub fn profile_likelihood(eigenvalues: &[f64], n_samples: usize) -> Vec<f64> {
    let d = eigenvalues.len();
    let mut scores = vec![f64::NEG_INFINITY; d];
    for k in 1..d {
        match log_likelihood(eigenvalues, k, n_samples) {
            Ok(score) => {
                trace!("Profile likelihood for k={}: {}", k, score);
                scores[k] = score;
            }
            Err(reason) => warn!("Skipping k={} in automatic dimension selection: {}", k, reason),
        }
    }
    scores
}

/// Returns the number of components that maximizes the profile likelihood.
///
/// Ties resolve to the smaller `k`. A one-dimensional spectrum selects 1.
///
/// # Errors
/// `EmptyDataset` for an empty spectrum; `NumericalSingularity` when every
/// candidate split is degenerate.
pub fn select_dimension(eigenvalues: &[f64], n_samples: usize) -> Result<usize> {
    let d = eigenvalues.len();
    if d == 0 {
        return Err(LearnError::empty("eigenvalue spectrum is empty"));
    }
    if d == 1 {
        debug!("Single eigenvalue; automatic selection keeps 1 component.");
        return Ok(1);
    }

    let scores = profile_likelihood(eigenvalues, n_samples);
    let mut best: Option<(usize, f64)> = None;
    for (k, &score) in scores.iter().enumerate().skip(1) {
        if !score.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((k, score));
        }
    }

    match best {
        Some((k, score)) => {
            debug!("Automatic selection chose k={} (log-likelihood {:.4}).", k, score);
            Ok(k)
        }
        None => Err(LearnError::NumericalSingularity {
            reason: format!(
                "every candidate split of the {}-value spectrum is degenerate",
                d
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_is_negative_infinity() {
        let scores = profile_likelihood(&[9.0, 4.0, 1.2, 1.0, 0.8], 200);
        assert_eq!(scores.len(), 5);
        assert_eq!(scores[0], f64::NEG_INFINITY);
        assert!(scores[1..].iter().all(|s| s.is_finite()));
    }

    #[test]
    fn dominant_eigenvalues_are_selected() {
        let spectrum = [120.0, 80.0, 1.1, 1.05, 1.0, 0.97, 0.95, 0.9];
        assert_eq!(select_dimension(&spectrum, 500).unwrap(), 2);
    }

    #[test]
    fn degenerate_splits_are_skipped() {
        // Splitting inside the run of equal values makes the Jacobian term vanish.
        let spectrum = [9.0, 4.0, 1.0, 1.0, 1.0];
        let scores = profile_likelihood(&spectrum, 100);
        assert!(scores[1].is_finite());
        assert!(scores[2].is_finite());
        assert_eq!(scores[3], f64::NEG_INFINITY);
        assert_eq!(scores[4], f64::NEG_INFINITY);
        assert_eq!(select_dimension(&spectrum, 100).unwrap(), 2);
        assert_eq!(
            log_likelihood(&spectrum, 3, 100),
            Err(Degeneracy::EqualEigenvalues { i: 2, j: 3 })
        );
    }

    #[test]
    fn fully_degenerate_spectrum_is_an_error() {
        assert!(matches!(
            select_dimension(&[1.0, 1.0, 1.0], 50),
            Err(LearnError::NumericalSingularity { .. })
        ));
        assert!(matches!(
            select_dimension(&[5.0, 0.0, 0.0], 50),
            Err(LearnError::NumericalSingularity { .. })
        ));
    }

    #[test]
    fn equal_retained_eigenvalues_are_selectable() {
        let spectrum = [50.0, 50.0, 1.1, 1.05, 1.0, 0.97, 0.95, 0.9];
        // Splitting between the two equal leading values is still degenerate.
        assert_eq!(
            log_likelihood(&spectrum, 1, 500),
            Err(Degeneracy::EqualEigenvalues { i: 0, j: 1 })
        );
        let scores = profile_likelihood(&spectrum, 500);
        assert_eq!(scores[1], f64::NEG_INFINITY);
        assert!(scores[2..].iter().all(|s| s.is_finite()));
        assert_eq!(select_dimension(&spectrum, 500).unwrap(), 2);

        // A tie broken only by rounding behaves the same way.
        let rounded = [50.0 * (1.0 + 4e-16), 50.0, 1.1, 1.05, 1.0, 0.97, 0.95, 0.9];
        assert!(matches!(
            log_likelihood(&rounded, 1, 500),
            Err(Degeneracy::EqualEigenvalues { i: 0, j: 1 })
        ));
        assert_eq!(select_dimension(&rounded, 500).unwrap(), 2);

        let triple = [50.0, 50.0, 50.0, 1.1, 1.05, 1.0, 0.97, 0.95, 0.9];
        assert_eq!(select_dimension(&triple, 500).unwrap(), 3);
    }

    #[test]
    fn tiny_spectra() {
        assert!(matches!(select_dimension(&[], 10), Err(LearnError::EmptyDataset { .. })));
        assert_eq!(select_dimension(&[3.0], 10).unwrap(), 1);
    }
}
