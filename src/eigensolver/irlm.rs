//! Implicitly Restarted Lanczos Method
//!
//! The Lanczos recurrence builds an orthonormal basis `V` of a Krylov space of a Hermitian
//! operator together with the tridiagonal projection `T = V^H A V`. Once the basis holds `n_kr`
//! vectors the Ritz pairs of `T` are checked for convergence. Converged wanted pairs are locked
//! into the leading Krylov vectors; everything else is compressed back to `n_ev` vectors without
//! applying the operator again.

use ndarray::{Array1, Array2};
use num_complex::Complex;
use num_traits::{Float, Zero};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{
    block_orthogonalise, cheby_op, check_kspace, compress_basis, compute_svd, mat_vec,
    next_residual, permute_leading, project_out, rayleigh_ritz, start_vector, EigenSolver,
    SolveReport, SolveStatus,
};
use crate::{
    blas_lapack::{BlasConfig, BlasLapack},
    field::inner,
    logging,
    norm::Norm,
    operator::LinearOperator,
    qr::shifted_qr_sweep,
    tridiagonal::Tridiagonal,
    EigError, EigParam, RealScalar, Result, Scalar,
};

/// Phase of the restarted Lanczos iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrlmState {
    /// No basis vector yet
    Empty,
    /// Extending the basis one Lanczos step at a time
    Growing,
    /// Basis complete, Ritz pairs of the projection computed
    Projected,
    /// Applying implicit shifts and truncating the basis
    Restarting,
    Converged,
    Exhausted,
}

/// Ritz pairs of the projection
struct RitzPairs<R> {
    theta: Array1<R>,
    /// Eigenvectors of the projection, one per column
    y: Array2<R>,
    /// Indices into `theta`, most wanted first
    order: Vec<usize>,
}

/// Implicitly restarted Lanczos solver for Hermitian operator products
///
/// Built by [`create`](super::create) from validated parameters. With `block_ortho` set the
/// solver owns an initialised [`BlasLapack`] context for the Gram matrix inversions, released
/// when the solver is dropped.
///
/// The recurrence runs on a single vector, so of a repeated eigenvalue only one eigenvector is
/// found: a diagonal operator with `50` twice yields `[50, 48, 47]` for the three largest.
pub struct Irlm<'a, S: Scalar> {
    op: &'a dyn LinearOperator<S>,
    param: EigParam<S::Real>,
    dim: usize,
    blas: Option<BlasLapack>,
    state: IrlmState,
    tri: Tridiagonal<S::Real>,
    /// Unit residual direction of the current factorisation
    residual: Array1<S>,
    residual_norm: S::Real,
    locks: Vec<bool>,
    matvecs: usize,
}

impl<'a, S: Scalar> Irlm<'a, S> {
    pub(crate) fn new(param: EigParam<S::Real>, op: &'a dyn LinearOperator<S>) -> Result<Self> {
        let dim = param.validate(op.shape())?;
        let blas = if param.block_ortho {
            let mut blas = BlasLapack::new(BlasConfig {
                native: param.native_blas,
                threads: param.blas_threads,
            });
            blas.init()?;
            Some(blas)
        } else {
            None
        };

        Ok(Irlm {
            op,
            dim,
            blas,
            state: IrlmState::Empty,
            tri: Tridiagonal::with_capacity(param.n_kr),
            residual: Array1::zeros(dim),
            residual_norm: S::Real::zero(),
            locks: vec![false; param.n_kr],
            matvecs: 0,
            param,
        })
    }

    pub fn state(&self) -> IrlmState {
        self.state
    }

    /// Lock flags of the Krylov vectors; the locked vectors always form a prefix
    pub fn locked(&self) -> &[bool] {
        &self.locks
    }

    pub fn n_locked(&self) -> usize {
        self.locks.iter().take_while(|&&l| l).count()
    }

    /// Projection of the operator onto the active basis
    pub fn tridiagonal(&self) -> &Tridiagonal<S::Real> {
        &self.tri
    }

    fn set_state(&mut self, state: IrlmState) {
        if self.state != state {
            log::trace!("{}irlm: {:?} -> {:?}", logging::prefix(), self.state, state);
            self.state = state;
        }
    }

    /// The operator the recurrence runs on: the selected product, or its Chebyshev filter
    fn apply(&mut self, out: &mut Array1<S>, input: &Array1<S>) -> Result<()> {
        match &self.param.poly {
            Some(poly) => {
                self.matvecs += poly.degree;
                cheby_op(self.op, out.view_mut(), input.view(), self.param.mat_vec, poly)
            }
            None => {
                self.matvecs += 1;
                mat_vec(self.op, out.view_mut(), input.view(), self.param.mat_vec)
            }
        }
    }

    /// Extend the active basis, which starts at `kspace[base]`, by its vector `j`
    ///
    /// For `j > 0` the stored residual becomes the new basis vector and its norm the coupling to
    /// the previous one. The new residual is re-orthogonalised against every preceding Krylov
    /// vector, locked ones included.
    fn lanczos_step<R: Rng>(
        &mut self,
        kspace: &mut [Array1<S>],
        base: usize,
        j: usize,
        rng: &mut R,
    ) -> Result<()> {
        let idx = base + j;
        let coupling = if j > 0 {
            kspace[idx].assign(&self.residual);
            Some(self.residual_norm)
        } else {
            None
        };

        let mut w = Array1::zeros(self.dim);
        self.apply(&mut w, &kspace[idx])?;

        let alpha = inner(&kspace[idx], &w).real();
        w.scaled_add(S::from_real(-alpha), &kspace[idx]);
        if let Some(beta) = coupling {
            w.scaled_add(S::from_real(-beta), &kspace[idx - 1]);
        }

        match &self.blas {
            Some(blas) => block_orthogonalise(blas, kspace, std::slice::from_mut(&mut w), idx + 1)?,
            None => {
                project_out(&kspace[..=idx], &mut w);
            }
        }

        let beta = w.norm_l2();
        if !alpha.is_finite() || !beta.is_finite() {
            return Err(EigError::NonFinite { index: idx });
        }
        self.tri.extend(coupling, alpha);
        log::trace!(
            "{}lanczos step {}: alpha = {:e}, beta = {:e}",
            logging::prefix(),
            idx,
            alpha,
            beta
        );

        let scale = self.tri.norm();
        let (residual, norm) = next_residual(&kspace[..=idx], w, beta, scale, rng);
        self.residual = residual;
        self.residual_norm = norm;
        Ok(())
    }

    /// Extend the active basis `kspace[nlock..nlock + m]` until the Krylov space is full
    fn grow<R: Rng>(
        &mut self,
        kspace: &mut [Array1<S>],
        nlock: usize,
        mut m: usize,
        rng: &mut R,
    ) -> Result<usize> {
        while nlock + m < self.param.n_kr {
            self.lanczos_step(kspace, nlock, m, rng)?;
            m += 1;
        }
        Ok(m)
    }

    fn ritz_pairs(&self) -> Result<RitzPairs<S::Real>> {
        let (theta, y) = self.tri.eigh()?;
        let values: Vec<Complex<S::Real>> = theta
            .iter()
            .map(|&t| Complex::new(t, S::Real::zero()))
            .collect();
        let order = self.param.selection_spectrum().wanted_order(&values);
        Ok(RitzPairs { theta, y, order })
    }

    /// Ritz pairs among the `wanted` leading ones whose residual estimate passes the tolerance
    fn converged(&self, ritz: &RitzPairs<S::Real>, wanted: usize) -> Vec<usize> {
        let eps = S::Real::epsilon();
        let tol = self.param.tol;
        let last = Tridiagonal::last_components(&ritz.y);
        ritz.order[..wanted]
            .iter()
            .copied()
            .filter(|&i| self.residual_norm * last[i].abs() < tol * ritz.theta[i].abs().max(eps))
            .collect()
    }

    /// Compress the active basis `kspace[nlock..nlock + m]` after locking the `converged` Ritz
    /// pairs in front of it, returning the new active length `n_ev - nlock - converged.len()`
    ///
    /// Without new locks the unwanted Ritz values are applied as implicit shifts. Locking rotates
    /// the projection instead: the converged Ritz vectors become locked basis vectors and the
    /// most wanted remaining Ritz vectors are rotated so that their projection is tridiagonal
    /// with the coupling to the residual in its last row. Both keep the factorisation
    /// `A V = V T + beta f e_k^T` and an orthonormal basis to rounding.
    fn restart<R: Rng>(
        &mut self,
        kspace: &mut [Array1<S>],
        nlock: usize,
        m: usize,
        ritz: &RitzPairs<S::Real>,
        converged: &[usize],
        rng: &mut R,
    ) -> Result<usize> {
        let nlock_new = nlock + converged.len();
        let k = self.param.n_ev - nlock_new;
        let active = nlock..nlock + m;

        let (f, norm) = if converged.is_empty() {
            let shifts: Vec<S::Real> = ritz.order[k..].iter().map(|&i| ritz.theta[i]).collect();
            let (t, q) = implicit_shifts(&self.tri, &shifts)?;
            let f = compress_basis(
                &mut kspace[active],
                &self.residual,
                self.residual_norm,
                &t,
                &q,
                k,
            );
            self.tri.load_dense(&t, k);
            let norm = f.norm_l2();
            (f, norm)
        } else {
            let kept: Vec<usize> = ritz
                .order
                .iter()
                .copied()
                .filter(|i| !converged.contains(i))
                .take(k)
                .collect();
            let theta: Vec<S::Real> = kept.iter().map(|&i| ritz.theta[i]).collect();
            let last = Tridiagonal::last_components(&ritz.y);
            let b: Array1<S::Real> = kept.iter().map(|&i| last[i]).collect();
            let (t, p) = diagonal_to_tridiagonal(&theta, &b, rng);
            let z = Array2::from_shape_fn((m, k), |(r, c)| ritz.y[(r, kept[c])]).dot(&p);

            let locked = ritz_vectors(&kspace[active.clone()], &ritz.y, converged);
            let rest = ritz_vectors(&kspace[active], &z, &(0..k).collect::<Vec<_>>());
            for (slot, x) in kspace[nlock..].iter_mut().zip(locked.iter().chain(&rest)) {
                slot.assign(x);
            }
            self.locks[nlock..nlock_new].iter_mut().for_each(|l| *l = true);
            self.tri.load_dense(&t, k);

            // A V Y p = V Y p t + beta f (b^T p), where b^T p vanishes but for its last entry
            let coupling = self.residual_norm * b.dot(&p.column(k - 1));
            let f = self.residual.mapv(|x| x * S::from_real(coupling));
            (f, coupling.abs())
        };

        let scale = self.tri.norm();
        let (residual, norm) = next_residual(&kspace[..nlock_new + k], f, norm, scale, rng);
        self.residual = residual;
        self.residual_norm = norm;
        Ok(k)
    }
}

/// `x_i = V y_i` for the selected columns of `y`
fn ritz_vectors<S: Scalar>(
    basis: &[Array1<S>],
    y: &Array2<S::Real>,
    columns: &[usize],
) -> Vec<Array1<S>> {
    columns
        .iter()
        .map(|&i| {
            let mut x = Array1::<S>::zeros(basis[0].len());
            for (j, v) in basis.iter().enumerate() {
                x.scaled_add(S::from_real(y[(j, i)]), v);
            }
            x
        })
        .collect()
}

/// Apply one shifted QR sweep per shift to the dense form of `tri`, returning the transformed
/// projection and the accumulated rotation
pub(crate) fn implicit_shifts<R: RealScalar>(
    tri: &Tridiagonal<R>,
    shifts: &[R],
) -> Result<(Array2<R>, Array2<R>)> {
    let mut t = tri.to_dense();
    let mut q = Array2::eye(tri.dim());
    for &mu in shifts {
        shifted_qr_sweep(&mut t, &mut q, mu)?;
    }
    Ok((t, q))
}

/// Orthogonal `p` with `p^T diag(theta) p` tridiagonal and `b^T p` vanishing but for its last
/// entry, returned together with the rotated matrix
///
/// Lanczos with full reorthogonalisation on the diagonal matrix, started from `b`, with the
/// basis stored in reverse order.
fn diagonal_to_tridiagonal<R: RealScalar, G: Rng>(
    theta: &[R],
    b: &Array1<R>,
    rng: &mut G,
) -> (Array2<R>, Array2<R>) {
    let k = theta.len();
    let scale = theta.iter().fold(R::zero(), |acc, t| acc.max(t.abs()));
    let mut basis: Vec<Array1<R>> = Vec::with_capacity(k);
    let (mut q, _) = next_residual(&basis, b.clone(), b.norm_l2(), R::one(), rng);
    let mut coupling = R::zero();
    for j in 0..k {
        let mut w = Array1::from_shape_fn(k, |i| theta[i] * q[i]);
        let alpha = w.dot(&q);
        w.scaled_add(-alpha, &q);
        if let Some(prev) = basis.last() {
            w.scaled_add(-coupling, prev);
        }
        basis.push(q);
        if j + 1 == k {
            break;
        }
        project_out(&basis, &mut w);
        let norm = w.norm_l2();
        let (next, beta) = next_residual(&basis, w, norm, scale, rng);
        q = next;
        coupling = beta;
    }

    let p = Array2::from_shape_fn((k, k), |(i, j)| basis[k - 1 - j][i]);
    let t = p.t().dot(&Array2::from_diag(&Array1::from(theta.to_vec()))).dot(&p);
    (t, p)
}

impl<'a, S: Scalar> EigenSolver<S> for Irlm<'a, S> {
    fn solve(
        &mut self,
        kspace: &mut [Array1<S>],
        evals: &mut Vec<Complex<S::Real>>,
    ) -> Result<SolveReport<S::Real>> {
        let EigParam { n_conv, n_kr, .. } = self.param;
        check_kspace(kspace, n_kr, self.dim)?;

        evals.clear();
        self.tri.clear();
        self.locks.iter_mut().for_each(|l| *l = false);
        self.matvecs = 0;
        self.state = IrlmState::Empty;

        if n_conv == 0 {
            self.set_state(IrlmState::Converged);
            return Ok(SolveReport {
                status: SolveStatus::Converged,
                restarts: 0,
                matvecs: 0,
                residuals: Vec::new(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.param.seed);
        start_vector(&mut kspace[0], &mut rng);

        let mut nlock = 0;
        let mut m = 0;
        let mut restarts = 0;

        let status = loop {
            self.set_state(IrlmState::Growing);
            m = self.grow(kspace, nlock, m, &mut rng)?;

            self.set_state(IrlmState::Projected);
            let ritz = self.ritz_pairs()?;
            let converged = self.converged(&ritz, n_conv - nlock);
            let nlock_new = nlock + converged.len();
            log::debug!(
                "{}irlm restart {}: {} new converged, {} of {} locked, residual {:e}",
                logging::prefix(),
                restarts,
                converged.len(),
                nlock_new,
                n_conv,
                self.residual_norm
            );

            if nlock_new >= n_conv || restarts >= self.param.max_restarts {
                let locked = ritz_vectors(&kspace[nlock..nlock + m], &ritz.y, &converged);
                for (slot, x) in kspace[nlock..nlock_new].iter_mut().zip(&locked) {
                    slot.assign(x);
                }
                self.locks[nlock..nlock_new].iter_mut().for_each(|l| *l = true);
                nlock = nlock_new;

                break if nlock >= n_conv {
                    self.set_state(IrlmState::Converged);
                    SolveStatus::Converged
                } else {
                    self.set_state(IrlmState::Exhausted);
                    SolveStatus::Exhausted { converged: nlock }
                };
            }

            self.set_state(IrlmState::Restarting);
            m = self.restart(kspace, nlock, m, &ritz, &converged, &mut rng)?;
            nlock = nlock_new;
            restarts += 1;
        };

        let kind = self.param.mat_vec;
        let (values, mut residuals) = rayleigh_ritz(self.op, &kspace[..nlock], kind)?;
        self.matvecs += nlock;
        evals.extend(values);
        let order = self.param.spectrum.wanted_order(evals);
        permute_leading(kspace, evals, &mut residuals, &order);

        if self.param.compute_svd {
            compute_svd(
                self.op,
                kspace,
                evals,
                &mut residuals,
                &self.param,
                self.param.poly.is_some(),
            )?;
        }

        match status {
            SolveStatus::Converged => log::info!(
                "{}irlm: {} eigenpairs converged after {} restarts and {} matvecs",
                logging::prefix(),
                nlock,
                restarts,
                self.matvecs
            ),
            SolveStatus::Exhausted { converged } => log::warn!(
                "{}irlm: restart budget of {} spent with {} of {} eigenpairs converged",
                logging::prefix(),
                self.param.max_restarts,
                converged,
                n_conv
            ),
        }

        Ok(SolveReport {
            status,
            restarts,
            matvecs: self.matvecs,
            residuals,
        })
    }

    fn param(&self) -> &EigParam<S::Real> {
        &self.param
    }
}
