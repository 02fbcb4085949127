// src/linalg_backends.rs

use ndarray::{Array1, Array2};

use crate::error::{LearnError, Result};

/// Output of a Singular Value Decomposition.
#[derive(Debug)]
pub struct SVDOutput {
    pub u: Option<Array2<f64>>,
    /// Singular values in descending order.
    pub s: Array1<f64>,
    /// Right singular vectors as rows.
    pub vt: Option<Array2<f64>>,
}

/// Trait for Singular Value Decomposition.
pub trait BackendSVD {
    fn svd_into(&self, matrix: Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput>;
}

// --- ndarray-linalg (LAPACK) backend ---
use ndarray_linalg::SVDInto as NdLinalgSVDInto;

#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

impl BackendSVD for NdarrayLinAlgBackend {
    fn svd_into(&self, matrix: Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput> {
        let (u, s, vt) = matrix
            .svd_into(compute_u, compute_v)
            .map_err(|e| LearnError::Decomposition(format!("LAPACK SVD failed: {}", e)))?;
        Ok(SVDOutput { u, s, vt })
    }
}

// --- faer backend ---
#[cfg(feature = "backend_faer")]
mod faer_specific_code {
    use super::{BackendSVD, SVDOutput};
    use crate::error::{LearnError, Result};
    use bytemuck::Pod;
    use faer::linalg::solvers::Svd as FaerSolverSvd;
    use faer::traits::num_traits::Zero;
    use faer::traits::ComplexField;
    use faer::MatRef;
    use ndarray::{Array1, Array2, ShapeBuilder};

    #[derive(Debug, Default, Copy, Clone)]
    pub struct FaerLinAlgBackend;

    fn faer_mat_to_ndarray<F: ComplexField + Copy + Pod + Zero>(faer_mat: MatRef<'_, F>) -> Array2<F> {
        let nrows = faer_mat.nrows();
        let ncols = faer_mat.ncols();
        Array2::from_shape_fn((nrows, ncols).f(), |(i, j)| faer_mat[(i, j)])
    }

    fn faer_col_to_ndarray_vec<F: ComplexField + Copy + Pod + Zero>(faer_col: faer::ColRef<'_, F>) -> Array1<F> {
        Array1::from_shape_fn(faer_col.nrows(), |i| faer_col[i])
    }

    impl BackendSVD for FaerLinAlgBackend {
        fn svd_into(&self, matrix: Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput> {
            let (nrows, ncols) = matrix.dim();
            if matrix.is_empty() {
                let k_dim = nrows.min(ncols);
                return Ok(SVDOutput {
                    u: if compute_u { Some(Array2::zeros((nrows, k_dim))) } else { None },
                    s: Array1::zeros(k_dim),
                    vt: if compute_v { Some(Array2::zeros((k_dim, ncols))) } else { None },
                });
            }

            // faer views need contiguous storage; a standard-layout copy always is.
            let contiguous = matrix.as_standard_layout();
            let slice = contiguous.as_slice().ok_or_else(|| {
                LearnError::Decomposition(format!(
                    "failed to view {}x{} matrix as a row-major slice",
                    nrows, ncols
                ))
            })?;
            let faer_mat_ref = MatRef::from_row_major_slice(slice, nrows, ncols);

            let svd = FaerSolverSvd::new_thin(faer_mat_ref)
                .map_err(|e| LearnError::Decomposition(format!("faer SVD failed: {:?}", e)))?;

            let s = faer_col_to_ndarray_vec(svd.S().column_vector());
            let u = if compute_u {
                Some(faer_mat_to_ndarray(svd.U().as_ref()))
            } else {
                None
            };
            let vt = if compute_v {
                Some(faer_mat_to_ndarray(svd.V().as_ref()).t().into_owned())
            } else {
                None
            };
            Ok(SVDOutput { u, s, vt })
        }
    }
}

/// Dispatches to the backend selected by Cargo features.
#[derive(Debug, Default, Copy, Clone)]
pub struct LinAlgBackendProvider;

impl BackendSVD for LinAlgBackendProvider {
    fn svd_into(&self, matrix: Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput> {
        #[cfg(feature = "backend_faer")]
        {
            faer_specific_code::FaerLinAlgBackend.svd_into(matrix, compute_u, compute_v)
        }
        #[cfg(not(feature = "backend_faer"))]
        {
            NdarrayLinAlgBackend.svd_into(matrix, compute_u, compute_v)
        }
    }
}
