// Dimensionality reduction and nearest-neighbor classification

#![doc = include_str!("../README.md")]

pub mod classifier;
pub mod dimensionality;
pub mod error;
pub mod linalg_backends;
pub mod metric;
pub mod nearest_neighbor;
pub mod pca;


pub use classifier::Classifier;
pub use error::{LearnError, Result};
pub use metric::{Metric, NormOrder, PNorm};
pub use nearest_neighbor::NearestNeighbor;
pub use pca::{DimensionSelection, Pca};

/// Class identifier attached to each observation.
pub type Label = u32;
