use ndarray::{ArrayView3, ArrayViewMut3};

use super::{in_batch, BatchEngine, Location};
use crate::{lu::lu_inverse, EigError, Result, Scalar};

/// Portable engine: sequential LU and substitution against the identity, host memory only
#[derive(Debug, Default)]
pub struct GenericEngine {
    initialized: bool,
}

impl GenericEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchEngine for GenericEngine {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn destroy(&mut self) {
        self.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn supports(&self, location: Location) -> bool {
        location == Location::Host
    }

    fn batch_invert<S: Scalar>(&self, mut out: ArrayViewMut3<S>, input: ArrayView3<S>) -> Result<()> {
        if !self.initialized {
            return Err(EigError::BackendNotInitialized);
        }
        for (b, (mut inv, a)) in out.outer_iter_mut().zip(input.outer_iter()).enumerate() {
            let res = lu_inverse(a.to_owned()).map_err(|e| in_batch(e, b))?;
            inv.assign(&res);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, Array3};

    use super::*;

    #[test]
    fn host_only() {
        let engine = GenericEngine::new();
        assert!(engine.supports(Location::Host));
        assert!(!engine.supports(Location::Device));
    }

    #[test]
    fn inverts_in_order() {
        let mut engine = GenericEngine::new();
        engine.init().unwrap();
        let input = array![[[1.0f32, 2.], [3., 4.]], [[2., 0.], [0., 8.]]];
        let mut out = Array3::zeros((2, 2, 2));
        engine.batch_invert(out.view_mut(), input.view()).unwrap();
        assert_abs_diff_eq!(out.index_axis(ndarray::Axis(0), 0), array![[-2., 1.], [1.5, -0.5]], epsilon = 1e-5);
        assert_abs_diff_eq!(
            input.index_axis(ndarray::Axis(0), 1).dot(&out.index_axis(ndarray::Axis(0), 1)),
            Array2::eye(2),
            epsilon = 1e-6
        );
    }
}
