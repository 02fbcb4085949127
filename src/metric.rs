// src/metric.rs

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::{LearnError, Result};

/// A distance between two equal-length vectors.
///
/// Implementations hold immutable configuration only, so a single instance can
/// be shared by any number of classifiers and worker threads.
pub trait Metric: Send + Sync {
    /// Identifier written next to the metric configuration in saved models.
    fn kind(&self) -> &'static str;

    /// Returns the non-negative distance between `a` and `b`.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if the vectors differ in length.
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64>;
}

/// Order of a p-norm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormOrder {
    /// `(Σ|x_i - y_i|^p)^(1/p)` for `p >= 1`.
    Finite(u32),
    /// Largest absolute coordinate difference.
    Infinity,
    /// Smallest absolute coordinate difference.
    NegativeInfinity,
}

impl fmt::Display for NormOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormOrder::Finite(p) => write!(f, "{}", p),
            NormOrder::Infinity => f.write_str("inf"),
            NormOrder::NegativeInfinity => f.write_str("-inf"),
        }
    }
}

impl FromStr for NormOrder {
    type Err = LearnError;

    /// Accepts `"inf"`, `"-inf"` or a positive integer.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "inf" => Ok(NormOrder::Infinity),
            "-inf" => Ok(NormOrder::NegativeInfinity),
            other => {
                let p: u32 = other.parse().map_err(|_| {
                    LearnError::invalid_config(
                        "norm_order",
                        format!("'{}' is neither 'inf', '-inf' nor a positive integer", s),
                    )
                })?;
                PNorm::check_order(NormOrder::Finite(p))
            }
        }
    }
}

/// The p-norm family of distances.
///
/// `p = 1` is the Manhattan distance and `p = 2` the Euclidean distance.
/// The default order is 2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NormOrder", into = "NormOrder")]
pub struct PNorm {
    order: NormOrder,
}

impl PNorm {
    /// Creates a finite p-norm.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` when `p == 0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use pca_classify::{Metric, PNorm};
    ///
    /// let manhattan = PNorm::new(1).unwrap();
    /// let d = manhattan.distance(array![0.0, 0.0].view(), array![1.0, 2.0].view()).unwrap();
    /// assert_eq!(d, 3.0);
    /// assert!(PNorm::new(0).is_err());
    /// ```
    pub fn new(p: u32) -> Result<Self> {
        Self::with_order(NormOrder::Finite(p))
    }

    pub fn with_order(order: NormOrder) -> Result<Self> {
        Ok(Self {
            order: Self::check_order(order)?,
        })
    }

    pub fn manhattan() -> Self {
        Self {
            order: NormOrder::Finite(1),
        }
    }

    pub fn euclidean() -> Self {
        Self {
            order: NormOrder::Finite(2),
        }
    }

    pub fn infinity() -> Self {
        Self {
            order: NormOrder::Infinity,
        }
    }

    pub fn negative_infinity() -> Self {
        Self {
            order: NormOrder::NegativeInfinity,
        }
    }

    pub fn order(&self) -> NormOrder {
        self.order
    }

    fn check_order(order: NormOrder) -> Result<NormOrder> {
        match order {
            NormOrder::Finite(0) => Err(LearnError::invalid_config(
                "norm_order",
                "p must be positive; a zero-order norm is undefined",
            )),
            valid => Ok(valid),
        }
    }
}

impl Default for PNorm {
    fn default() -> Self {
        Self::euclidean()
    }
}

impl TryFrom<NormOrder> for PNorm {
    type Error = LearnError;

    fn try_from(order: NormOrder) -> Result<Self> {
        Self::with_order(order)
    }
}

impl From<PNorm> for NormOrder {
    fn from(metric: PNorm) -> Self {
        metric.order
    }
}

impl Metric for PNorm {
    fn kind(&self) -> &'static str {
        "p-norm"
    }

    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
        if a.len() != b.len() {
            return Err(LearnError::dimension_mismatch(
                "p-norm distance",
                a.len(),
                b.len(),
            ));
        }
        if a.is_empty() {
            return Ok(0.0);
        }

        let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
        let distance = match self.order {
            NormOrder::Finite(1) => diffs.sum::<f64>(),
            NormOrder::Finite(2) => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            NormOrder::Finite(p) => {
                let powered: f64 = match i32::try_from(p) {
                    Ok(exp) => diffs.map(|d| d.powi(exp)).sum(),
                    Err(_) => diffs.map(|d| d.powf(p as f64)).sum(),
                };
                powered.powf(1.0 / p as f64)
            }
            NormOrder::Infinity => diffs.fold(0.0, f64::max),
            NormOrder::NegativeInfinity => diffs.fold(f64::INFINITY, f64::min),
        };
        Ok(distance)
    }
}
