//! Batched dense linear algebra for the small matrices of the projected problem
//!
//! A [`BlasLapack`] context owns one engine. The native engine runs every matrix of a batch on
//! its own worker pool; the generic engine is a portable sequential fallback. Which one is used
//! is an explicit part of the context configuration, and can be flipped with
//! [`BlasLapack::set_native`].
//!
//! ```rust
//! use ndarray::{array, Array3};
//! use krylov_eigensolve::blas_lapack::{BlasConfig, BlasLapack};
//! use krylov_eigensolve::{Location, Precision};
//!
//! let mut blas = BlasLapack::new(BlasConfig::default());
//! blas.init().unwrap();
//!
//! let input = array![[[4.0f64, 0.], [0., 2.]]];
//! let mut out = Array3::zeros((1, 2, 2));
//! let flops = blas
//!     .batch_invert_matrix(out.view_mut(), input.view(), 2, 1, Precision::Double, Location::Host)
//!     .unwrap();
//! assert_eq!(out, array![[[0.25, 0.], [0., 0.5]]]);
//! assert!(flops > 0);
//! ```

mod generic;
mod native;

use ndarray::{ArrayView3, ArrayViewMut3};
use num_traits::ToPrimitive;

use crate::{lu::inversion_flops, EigError, Result, Scalar};

pub use crate::scalar::Precision;
pub use generic::GenericEngine;
pub use native::NativeEngine;

/// Memory space the batch lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Location {
    Host,
    Device,
}

/// Configuration of a [`BlasLapack`] context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlasConfig {
    /// Use the native engine, otherwise the generic one
    pub native: bool,
    /// Worker threads of the native engine, 0 picks the rayon default
    pub threads: usize,
}

impl Default for BlasConfig {
    fn default() -> Self {
        Self {
            native: true,
            threads: 0,
        }
    }
}

/// An engine inverting batches of square matrices
pub trait BatchEngine {
    fn name(&self) -> &'static str;

    /// Acquire the execution context. Calling it again on an initialised engine is a no-op.
    fn init(&mut self) -> Result<()>;

    /// Release the execution context. Safe to call repeatedly, or without a prior `init`.
    fn destroy(&mut self);

    fn is_initialized(&self) -> bool;

    fn supports(&self, location: Location) -> bool;

    /// Invert every `input[b]` into `out[b]`. Shapes are validated by the caller.
    fn batch_invert<S: Scalar>(&self, out: ArrayViewMut3<S>, input: ArrayView3<S>) -> Result<()>;
}

/// The closed set of engines a context can run
#[derive(Debug)]
pub enum Engine {
    Native(NativeEngine),
    Generic(GenericEngine),
}

impl Engine {
    fn from_config(config: &BlasConfig) -> Self {
        if config.native {
            Engine::Native(NativeEngine::new(config.threads))
        } else {
            Engine::Generic(GenericEngine::new())
        }
    }
}

impl BatchEngine for Engine {
    fn name(&self) -> &'static str {
        match self {
            Engine::Native(e) => e.name(),
            Engine::Generic(e) => e.name(),
        }
    }

    fn init(&mut self) -> Result<()> {
        match self {
            Engine::Native(e) => e.init(),
            Engine::Generic(e) => e.init(),
        }
    }

    fn destroy(&mut self) {
        match self {
            Engine::Native(e) => e.destroy(),
            Engine::Generic(e) => e.destroy(),
        }
    }

    fn is_initialized(&self) -> bool {
        match self {
            Engine::Native(e) => e.is_initialized(),
            Engine::Generic(e) => e.is_initialized(),
        }
    }

    fn supports(&self, location: Location) -> bool {
        match self {
            Engine::Native(e) => e.supports(location),
            Engine::Generic(e) => e.supports(location),
        }
    }

    fn batch_invert<S: Scalar>(&self, out: ArrayViewMut3<S>, input: ArrayView3<S>) -> Result<()> {
        match self {
            Engine::Native(e) => e.batch_invert(out, input),
            Engine::Generic(e) => e.batch_invert(out, input),
        }
    }
}

/// Context of the batched dense backend
///
/// Created uninitialised; [`init`](BlasLapack::init) acquires the engine context and
/// [`destroy`](BlasLapack::destroy) (or dropping the value) releases it.
#[derive(Debug)]
pub struct BlasLapack {
    config: BlasConfig,
    engine: Engine,
}

impl BlasLapack {
    pub fn new(config: BlasConfig) -> Self {
        Self {
            engine: Engine::from_config(&config),
            config,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        if !self.engine.is_initialized() {
            log::debug!("{}initialising {} blas engine", crate::logging::prefix(), self.engine.name());
        }
        self.engine.init()
    }

    pub fn destroy(&mut self) {
        if self.engine.is_initialized() {
            log::debug!("{}releasing {} blas engine", crate::logging::prefix(), self.engine.name());
        }
        self.engine.destroy()
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_initialized()
    }

    /// Whether the native engine is selected
    pub fn use_native(&self) -> bool {
        self.config.native
    }

    /// Select the native (`true`) or generic engine
    ///
    /// The previous engine is released. If it was initialised the new one is initialised in
    /// its place.
    pub fn set_native(&mut self, native: bool) -> Result<()> {
        if native == self.config.native {
            return Ok(());
        }
        let was_initialized = self.engine.is_initialized();
        self.engine.destroy();
        self.config.native = native;
        self.engine = Engine::from_config(&self.config);
        if was_initialized {
            self.engine.init()?;
        }
        Ok(())
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Invert `batch` matrices of size `n x n` from `input` into `out`
    ///
    /// `precision` and `location` describe the data and are checked against the element type
    /// and the engine. Returns the number of floating point operations performed.
    pub fn batch_invert_matrix<S: Scalar>(
        &self,
        out: ArrayViewMut3<S>,
        input: ArrayView3<S>,
        n: usize,
        batch: usize,
        precision: Precision,
        location: Location,
    ) -> Result<u64> {
        if precision != S::PRECISION {
            return Err(EigError::UnsupportedPrecision {
                expected: precision,
                actual: S::PRECISION,
            });
        }
        let expected = (batch, n, n);
        for actual in [input.dim(), out.dim()] {
            if actual != expected {
                return Err(EigError::WrongShape { expected, actual });
            }
        }
        if !self.engine.supports(location) {
            return Err(EigError::UnsupportedLocation {
                backend: self.engine.name(),
                location,
            });
        }
        if !self.engine.is_initialized() {
            return Err(EigError::BackendNotInitialized);
        }

        log::trace!(
            "{}{} engine inverting {} matrices of size {}",
            crate::logging::prefix(),
            self.engine.name(),
            batch,
            n
        );
        self.engine.batch_invert(out, input)?;

        let flops = inversion_flops(n, precision.is_complex()) * batch as f64;
        Ok(flops.round().to_u64().unwrap_or(u64::MAX))
    }
}

impl Drop for BlasLapack {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Invert a batch with a default configured context, created and released around the call
pub fn batch_invert_matrix<S: Scalar>(
    out: ArrayViewMut3<S>,
    input: ArrayView3<S>,
    n: usize,
    batch: usize,
    precision: Precision,
    location: Location,
) -> Result<u64> {
    let mut blas = BlasLapack::new(BlasConfig::default());
    blas.init()?;
    blas.batch_invert_matrix(out, input, n, batch, precision, location)
}

/// Attach the batch index to an error raised by a single matrix kernel
pub(crate) fn in_batch(err: EigError, batch: usize) -> EigError {
    match err {
        EigError::Singular { pivot, .. } => EigError::Singular { batch, pivot },
        other => other,
    }
}
