//! damage-assess: post-processing for texture-based building damage mapping
//!
//! Turns GLCM texture difference maps into binary damage masks, validates them
//! against a randomly sampled ground-truth grid, and attributes damage to
//! building footprints and IDP camps.

pub mod types;
pub mod config;
pub mod io;
pub mod core;
#[cfg(feature = "gdal")]
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    BinaryMask, BoundingBox, DamageError, DamageResult, Fid, GeoMask, GeoRaster, GeoTransform,
    Raster, MASK_NODATA,
};

pub use config::WorkspaceConfig;
pub use crate::core::{compute_metrics, AccuracyAssessor, LabelPairs, Metric, Metrics, ModelMetrics};
#[cfg(feature = "gdal")]
pub use pipeline::Pipeline;

#[cfg(feature = "python")]
mod python {
    use crate::core::{self, accuracy};
    use crate::types::DamageError;
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use std::collections::BTreeMap;

    fn to_py_err(e: DamageError) -> PyErr {
        match e {
            DamageError::OutOfDomainLabel { .. } | DamageError::DivisionUndefined => {
                PyErr::new::<PyValueError, _>(e.to_string())
            }
            other => PyErr::new::<PyRuntimeError, _>(other.to_string()),
        }
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyMetrics>()?;
        m.add_function(wrap_pyfunction!(compute_metrics, m)?)?;
        m.add_function(wrap_pyfunction!(binarize, m)?)?;
        m.add_function(wrap_pyfunction!(remove_isolated_pixels, m)?)?;
        m.add_function(wrap_pyfunction!(normalize, m)?)?;
        Ok(())
    }

    /// Python wrapper for Metrics; undefined values surface as None
    #[pyclass(name = "Metrics")]
    struct PyMetrics {
        inner: accuracy::Metrics,
    }

    #[pymethods]
    impl PyMetrics {
        #[getter]
        fn true_positive(&self) -> u64 {
            self.inner.confusion.true_positive
        }

        #[getter]
        fn false_positive(&self) -> u64 {
            self.inner.confusion.false_positive
        }

        #[getter]
        fn false_negative(&self) -> u64 {
            self.inner.confusion.false_negative
        }

        #[getter]
        fn true_negative(&self) -> u64 {
            self.inner.confusion.true_negative
        }

        #[getter]
        fn overall_accuracy(&self) -> f64 {
            self.inner.overall_accuracy
        }

        #[getter]
        fn precision(&self) -> Option<f64> {
            self.inner.precision.value()
        }

        #[getter]
        fn recall(&self) -> Option<f64> {
            self.inner.recall.value()
        }

        #[getter]
        fn f1_score(&self) -> Option<f64> {
            self.inner.f1_score.value()
        }

        #[getter]
        fn specificity(&self) -> Option<f64> {
            self.inner.specificity.value()
        }

        #[getter]
        fn omission_error(&self) -> Option<f64> {
            self.inner.omission_error.value()
        }

        #[getter]
        fn commission_error(&self) -> Option<f64> {
            self.inner.commission_error.value()
        }

        #[getter]
        fn kappa(&self) -> Option<f64> {
            self.inner.kappa.value()
        }

        fn __repr__(&self) -> String {
            format!(
                "Metrics(overall_accuracy={:.4}, kappa={:?})",
                self.inner.overall_accuracy,
                self.inner.kappa.value()
            )
        }
    }

    /// Accuracy metrics from a {fid: (truth, predicted)} mapping
    #[pyfunction]
    fn compute_metrics(pairs: BTreeMap<i64, (i64, i64)>) -> PyResult<PyMetrics> {
        let inner = accuracy::compute_metrics(&pairs).map_err(to_py_err)?;
        Ok(PyMetrics { inner })
    }

    #[pyfunction]
    fn binarize<'py>(
        py: Python<'py>,
        raster: PyReadonlyArray2<f32>,
        threshold: f32,
    ) -> PyResult<&'py PyArray2<u8>> {
        let mask = core::binarize(&raster.as_array().to_owned(), threshold).map_err(to_py_err)?;
        Ok(mask.into_pyarray(py))
    }

    #[pyfunction]
    fn remove_isolated_pixels<'py>(py: Python<'py>, mask: PyReadonlyArray2<u8>) -> &'py PyArray2<u8> {
        core::remove_isolated_pixels(&mask.as_array().to_owned()).into_pyarray(py)
    }

    #[pyfunction]
    fn normalize<'py>(py: Python<'py>, raster: PyReadonlyArray2<f32>) -> PyResult<&'py PyArray2<f32>> {
        let normalized = core::Normalizer::new()
            .normalize(&raster.as_array().to_owned())
            .map_err(to_py_err)?;
        Ok(normalized.into_pyarray(py))
    }
}
