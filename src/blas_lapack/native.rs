use ndarray::{ArrayView3, ArrayViewMut3};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::{in_batch, BatchEngine, Location};
use crate::{
    lu::{getrf, getri},
    EigError, Result, Scalar,
};

/// Parallel engine: LU followed by in-place inversion, one matrix per task on a dedicated pool
///
/// The worker pool is the engine context; it lives between `init` and `destroy`.
#[derive(Debug)]
pub struct NativeEngine {
    threads: usize,
    pool: Option<ThreadPool>,
}

impl NativeEngine {
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            pool: None,
        }
    }

    /// Worker count of the live pool
    pub fn current_num_threads(&self) -> Option<usize> {
        self.pool.as_ref().map(|p| p.current_num_threads())
    }
}

impl BatchEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn init(&mut self) -> Result<()> {
        if self.pool.is_none() {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .thread_name(|i| format!("blas-native-{}", i))
                .build()
                .map_err(|e| EigError::BackendInit(e.to_string()))?;
            self.pool = Some(pool);
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.pool = None;
    }

    fn is_initialized(&self) -> bool {
        self.pool.is_some()
    }

    fn supports(&self, _location: Location) -> bool {
        true
    }

    fn batch_invert<S: Scalar>(&self, mut out: ArrayViewMut3<S>, input: ArrayView3<S>) -> Result<()> {
        let pool = self.pool.as_ref().ok_or(EigError::BackendNotInitialized)?;

        let tasks: Vec<_> = out
            .outer_iter_mut()
            .zip(input.outer_iter())
            .enumerate()
            .collect();

        let results: Vec<Result<()>> = pool.install(|| {
            tasks
                .into_par_iter()
                .map(|(b, (mut inv, a))| {
                    inv.assign(&a);
                    let mut piv = vec![0; a.nrows()];
                    getrf(&mut inv, &mut piv).map_err(|e| in_batch(e, b))?;
                    getri(&mut inv, &piv);
                    Ok(())
                })
                .collect()
        });

        // Report the first failing matrix of the batch
        results.into_iter().collect()
    }
}
