//! Eigensolver contract, the primitives shared by its implementations and the factory
//!
//! Every algorithm works on a caller owned Krylov space `&mut [Array1<S>]`. Converged
//! eigenvectors end up in its leading entries and the matching eigenvalues in the `evals`
//! output, most wanted first.
//!
//! ```rust
//! use ndarray::Array1;
//! use num_complex::Complex64;
//! use krylov_eigensolve::eigensolver::{self, EigenSolver};
//! use krylov_eigensolve::{operator::DiagonalOperator, EigParam, Spectrum};
//!
//! let op = DiagonalOperator::new(Array1::linspace(1., 40., 40));
//! let param = EigParam::new(3, 6, 16).tol(1e-9).spectrum(Spectrum::SmallestReal);
//!
//! let mut solver = eigensolver::create_deflation(&param, &op, "defl: ").unwrap();
//! let mut kspace = vec![Array1::zeros(40); 16];
//! let mut evals: Vec<Complex64> = Vec::new();
//! solver.solve(&mut kspace, &mut evals).unwrap();
//! assert!((evals[0].re - 1.).abs() < 1e-7);
//! ```

mod deflation;
mod external;
mod iram;
mod irlm;
mod svd;

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use num_complex::Complex;
use num_traits::{Float, NumCast, Zero};
use rand::Rng;

use crate::{
    blas_lapack::BlasLapack,
    field::{inner, random_vector},
    logging,
    norm::Norm,
    operator::{check_len, LinearOperator},
    params::PolyParam,
    EigError, EigParam, Location, MatVecKind, Result, Scalar, SolverKind,
};

pub use deflation::DeflationSolver;
pub use external::{EigenPackage, ExternalBridge, PackageOutput, PackageRequest};
pub use iram::Iram;
pub use irlm::{Irlm, IrlmState};
pub use svd::compute_svd;

/// How a solve ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// All requested eigenpairs converged
    Converged,
    /// The restart budget ran out with `converged` pairs found
    Exhausted { converged: usize },
}

impl SolveStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, SolveStatus::Converged)
    }
}

/// Outcome of a successful solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport<R> {
    pub status: SolveStatus,
    pub restarts: usize,
    /// Applications of the selected operator product
    pub matvecs: usize,
    /// `|A v - lambda v|` of every returned eigenpair
    pub residuals: Vec<R>,
}

/// A solver bound to an operator and a parameter set
pub trait EigenSolver<S: Scalar> {
    /// Compute the eigenpairs requested by [`param`](EigenSolver::param)
    ///
    /// `kspace` must hold at least `n_kr` vectors of the operator dimension. A non-zero first
    /// vector is used as the starting guess, otherwise a seeded random vector is drawn. On
    /// return `kspace[..evals.len()]` holds the eigenvectors matching `evals`.
    fn solve(
        &mut self,
        kspace: &mut [Array1<S>],
        evals: &mut Vec<Complex<S::Real>>,
    ) -> Result<SolveReport<S::Real>>;

    fn param(&self) -> &EigParam<S::Real>;
}

/// The closed set of solvers produced by the factory functions
pub enum Solver<'a, S: Scalar> {
    Irlm(Irlm<'a, S>),
    Iram(Iram<'a, S>),
    External(ExternalBridge<'a, S>),
    Deflation(DeflationSolver<'a, S>),
}

impl<'a, S: Scalar> EigenSolver<S> for Solver<'a, S> {
    fn solve(
        &mut self,
        kspace: &mut [Array1<S>],
        evals: &mut Vec<Complex<S::Real>>,
    ) -> Result<SolveReport<S::Real>> {
        match self {
            Solver::Irlm(s) => s.solve(kspace, evals),
            Solver::Iram(s) => s.solve(kspace, evals),
            Solver::External(s) => s.solve(kspace, evals),
            Solver::Deflation(s) => s.solve(kspace, evals),
        }
    }

    fn param(&self) -> &EigParam<S::Real> {
        match self {
            Solver::Irlm(s) => s.param(),
            Solver::Iram(s) => s.param(),
            Solver::External(s) => s.param(),
            Solver::Deflation(s) => s.param(),
        }
    }
}

/// Build the solver selected by `param.solver`
///
/// The parameters are validated against the operator here, so a returned solver only fails on
/// the Krylov space it is handed or on numerical trouble.
pub fn create<'a, S, O>(param: &EigParam<S::Real>, op: &'a O) -> Result<Solver<'a, S>>
where
    S: Scalar,
    O: LinearOperator<S> + 'a,
{
    param.validate(op.shape())?;
    match param.solver {
        SolverKind::Irlm => Ok(Solver::Irlm(Irlm::new(param.clone(), op)?)),
        SolverKind::Iram => Ok(Solver::Iram(Iram::new(param.clone(), op)?)),
        SolverKind::External => Err(EigError::MissingPackage),
    }
}

/// Like [`create`], handing `package` to the external bridge when `param.solver` selects it
pub fn create_with_package<'a, S, O>(
    param: &EigParam<S::Real>,
    op: &'a O,
    package: Box<dyn EigenPackage<S> + 'a>,
) -> Result<Solver<'a, S>>
where
    S: Scalar,
    O: LinearOperator<S> + 'a,
{
    match param.solver {
        SolverKind::External => {
            param.validate(op.shape())?;
            Ok(Solver::External(ExternalBridge::new(param.clone(), op, package)?))
        }
        _ => create(param, op),
    }
}

/// Wrap the solver selected by `param.solver` into a [`DeflationSolver`] whose diagnostics are
/// tagged with `prefix`
pub fn create_deflation<'a, S, O>(
    param: &EigParam<S::Real>,
    op: &'a O,
    prefix: impl Into<String>,
) -> Result<Solver<'a, S>>
where
    S: Scalar,
    O: LinearOperator<S> + 'a,
{
    let inner = create(param, op)?;
    Ok(Solver::Deflation(DeflationSolver::new(Box::new(inner), op, prefix)))
}

/// Like [`create_deflation`], handing `package` to the external bridge when `param.solver`
/// selects it
pub fn create_deflation_with_package<'a, S, O>(
    param: &EigParam<S::Real>,
    op: &'a O,
    package: Box<dyn EigenPackage<S> + 'a>,
    prefix: impl Into<String>,
) -> Result<Solver<'a, S>>
where
    S: Scalar,
    O: LinearOperator<S> + 'a,
{
    let inner = create_with_package(param, op, package)?;
    Ok(Solver::Deflation(DeflationSolver::new(Box::new(inner), op, prefix)))
}

/// Apply the operator product `kind` to `input`
///
/// `M^H M` and `M M^H` go through a temporary of the intermediate dimension.
pub fn mat_vec<S, O>(op: &O, mut out: ArrayViewMut1<S>, input: ArrayView1<S>, kind: MatVecKind) -> Result<()>
where
    S: Scalar,
    O: LinearOperator<S> + ?Sized,
{
    let (rows, cols) = op.shape();
    check_len(kind.domain_dim((rows, cols)), input.len())?;
    check_len(kind.range_dim((rows, cols)), out.len())?;

    match kind {
        MatVecKind::M => op.apply(out, input),
        MatVecKind::Mdag => op.apply_adjoint(out, input),
        MatVecKind::MdagM => {
            let mut tmp = Array1::zeros(rows);
            op.apply(tmp.view_mut(), input)?;
            op.apply_adjoint(out.view_mut(), tmp.view())
        }
        MatVecKind::MMdag => {
            let mut tmp = Array1::zeros(cols);
            op.apply_adjoint(tmp.view_mut(), input)?;
            op.apply(out.view_mut(), tmp.view())
        }
    }
}

/// Apply the degree `d` Chebyshev polynomial `T_d(d1 A + d2)` of the operator product `kind`
///
/// The affine map sends `[a_min, a_max]` to `[-1, 1]`, where `|T_d| <= 1`; eigenvalues outside
/// of the interval are amplified. Costs exactly `d` applications of `kind`.
pub fn cheby_op<S, O>(
    op: &O,
    mut out: ArrayViewMut1<S>,
    input: ArrayView1<S>,
    kind: MatVecKind,
    poly: &PolyParam<S::Real>,
) -> Result<()>
where
    S: Scalar,
    O: LinearOperator<S> + ?Sized,
{
    if poly.degree == 0 {
        out.assign(&input);
        return Ok(());
    }

    let two: S::Real = NumCast::from(2.).unwrap();
    let width = poly.a_max - poly.a_min;
    let d1 = S::from_real(two / width);
    let d2 = S::from_real(-(poly.a_max + poly.a_min) / width);

    // x -> d1 A x + d2 x
    let mapped = |x: ArrayView1<S>| -> Result<Array1<S>> {
        let mut ax = Array1::zeros(x.len());
        mat_vec(op, ax.view_mut(), x, kind)?;
        ax.mapv_inplace(|a| a * d1);
        ax.scaled_add(d2, &x);
        Ok(ax)
    };

    let mut prev = input.to_owned();
    let mut curr = mapped(input)?;
    for _ in 1..poly.degree {
        let mut next = mapped(curr.view())?;
        next.mapv_inplace(|x| x * S::from_real(two));
        next -= &prev;
        prev = std::mem::replace(&mut curr, next);
    }

    out.assign(&curr);
    Ok(())
}

/// Remove from `v` its components along the orthonormal `basis`, returning the accumulated
/// coefficients `<b_j, v>`
///
/// Modified Gram-Schmidt, repeated while a pass shrinks the norm below `1/sqrt(2)` of its
/// entry value (at most three passes).
pub fn project_out<S: Scalar>(basis: &[Array1<S>], v: &mut Array1<S>) -> Array1<S> {
    let mut coeffs = Array1::<S>::zeros(basis.len());
    let threshold: S::Real = NumCast::from(std::f64::consts::FRAC_1_SQRT_2).unwrap();

    let mut norm = v.norm_l2();
    for _ in 0..MAX_PASSES {
        for (b, c) in basis.iter().zip(coeffs.iter_mut()) {
            let proj = inner(b, v);
            v.scaled_add(-proj, b);
            *c += proj;
        }
        let after = v.norm_l2();
        if after >= threshold * norm {
            break;
        }
        norm = after;
    }
    coeffs
}

const MAX_PASSES: usize = 3;

/// Orthogonalise every entry of `vectors` against the first `count` vectors of `basis`
pub fn orthogonalise<S: Scalar>(basis: &[Array1<S>], vectors: &mut [Array1<S>], count: usize) -> Result<()> {
    let basis = leading(basis, count)?;
    for v in vectors.iter_mut() {
        if let Some(b) = basis.first() {
            check_len(b.len(), v.len())?;
        }
        project_out(basis, v);
    }
    Ok(())
}

/// Block form of [`orthogonalise`]: `r -= V (V^H V)^-1 V^H r` with the Gram matrix inverted by
/// the batched backend
pub fn block_orthogonalise<S: Scalar>(
    blas: &BlasLapack,
    basis: &[Array1<S>],
    vectors: &mut [Array1<S>],
    count: usize,
) -> Result<()> {
    let basis = leading(basis, count)?;
    if count == 0 {
        return Ok(());
    }
    let dim = basis[0].len();

    let mut v = Array2::<S>::zeros((dim, count));
    for (mut col, b) in v.columns_mut().into_iter().zip(basis) {
        col.assign(b);
    }
    let vh = v.t().mapv(|x| x.conj());
    let gram = vh.dot(&v).insert_axis(Axis(0));
    let mut gram_inv = ndarray::Array3::<S>::zeros((1, count, count));
    blas.batch_invert_matrix(gram_inv.view_mut(), gram.view(), count, 1, S::PRECISION, Location::Host)?;
    let gram_inv = gram_inv.index_axis_move(Axis(0), 0);

    let threshold: S::Real = NumCast::from(std::f64::consts::FRAC_1_SQRT_2).unwrap();
    for r in vectors.iter_mut() {
        check_len(dim, r.len())?;
        let mut norm = r.norm_l2();
        for _ in 0..MAX_PASSES {
            let coeffs = gram_inv.dot(&vh.dot(&*r));
            *r -= &v.dot(&coeffs);
            let after = r.norm_l2();
            if after >= threshold * norm {
                break;
            }
            norm = after;
        }
    }
    Ok(())
}

/// `out_i = sum_j evec_j <evec_j, in_i> / lambda_j`
///
/// Applied to a right hand side this is the exact solution restricted to the known eigenspace,
/// so `in_i - A out_i` carries no component along any `evec_j`.
pub fn deflate<S: Scalar>(
    out: &mut [Array1<S>],
    input: &[Array1<S>],
    evecs: &[Array1<S>],
    evals: &[Complex<S::Real>],
) -> Result<()> {
    check_len(input.len(), out.len())?;
    check_len(evecs.len(), evals.len())?;
    if let Some(index) = evals.iter().position(|l| !(l.norm() > S::Real::zero()) || !l.norm().is_finite()) {
        return Err(EigError::ZeroEigenvalue { index });
    }

    for (o, x) in out.iter_mut().zip(input) {
        check_len(x.len(), o.len())?;
        o.fill(S::zero());
        for (v, lambda) in evecs.iter().zip(evals) {
            check_len(x.len(), v.len())?;
            let c = inner(v, x) / S::from_complex(*lambda);
            o.scaled_add(c, v);
        }
    }
    Ok(())
}

fn leading<S>(basis: &[Array1<S>], count: usize) -> Result<&[Array1<S>]> {
    basis.get(..count).ok_or(EigError::KrylovSpaceTooSmall {
        expected: count,
        actual: basis.len(),
    })
}

/// Check the Krylov space handed to a solve
pub(crate) fn check_kspace<S>(kspace: &[Array1<S>], n_kr: usize, dim: usize) -> Result<()> {
    if kspace.len() < n_kr {
        return Err(EigError::KrylovSpaceTooSmall {
            expected: n_kr,
            actual: kspace.len(),
        });
    }
    kspace.iter().try_for_each(|v| check_len(dim, v.len()))
}

/// Rotate the active basis onto the leading `k` columns of `q` after implicit shifts
///
/// `h` is the shifted projection and `residual` the unit residual with norm `beta`. Returns the
/// unnormalised residual `V q_k h[k, k-1] + beta f q[m-1, k-1]` of the compressed factorisation.
pub(crate) fn compress_basis<S, Q>(
    basis: &mut [Array1<S>],
    residual: &Array1<S>,
    beta: S::Real,
    h: &Array2<Q>,
    q: &Array2<Q>,
    k: usize,
) -> Array1<S>
where
    S: Scalar,
    Q: Scalar<Real = S::Real>,
{
    let m = basis.len();
    let dim = residual.len();
    let lift = |x: Q| S::from_complex(x.to_complex());

    let combine = |col: usize| {
        let mut out = Array1::<S>::zeros(dim);
        for (j, v) in basis.iter().enumerate() {
            out.scaled_add(lift(q[(j, col)]), v);
        }
        out
    };

    let kept: Vec<Array1<S>> = (0..k).map(combine).collect();
    let mut f = residual.mapv(|x| x * S::from_real(beta) * lift(q[(m - 1, k - 1)]));
    if k < m {
        f.scaled_add(lift(h[(k, k - 1)]), &combine(k));
    }

    for (v, new) in basis.iter_mut().zip(kept) {
        v.assign(&new);
    }
    f
}

/// Rayleigh quotients and explicit residual norms of unit vectors under the plain product
pub(crate) fn rayleigh_ritz<S, O>(
    op: &O,
    vectors: &[Array1<S>],
    kind: MatVecKind,
) -> Result<(Vec<Complex<S::Real>>, Vec<S::Real>)>
where
    S: Scalar,
    O: LinearOperator<S> + ?Sized,
{
    let mut values = Vec::with_capacity(vectors.len());
    let mut residuals = Vec::with_capacity(vectors.len());
    for (index, v) in vectors.iter().enumerate() {
        let mut av = Array1::zeros(v.len());
        mat_vec(op, av.view_mut(), v.view(), kind)?;
        let lambda = inner(v, &av);
        av.scaled_add(-lambda, v);
        let res = av.norm_l2();
        if !lambda.finite() || !res.is_finite() {
            return Err(EigError::NonFinite { index });
        }
        values.push(lambda.to_complex());
        residuals.push(res);
    }
    Ok((values, residuals))
}

/// Reorder the leading vectors of `kspace` together with `evals` and `residuals`
pub(crate) fn permute_leading<S: Scalar, T: Copy>(
    kspace: &mut [Array1<S>],
    evals: &mut [Complex<S::Real>],
    residuals: &mut [T],
    order: &[usize],
) {
    let vectors: Vec<Array1<S>> = order.iter().map(|&i| kspace[i].clone()).collect();
    let values: Vec<_> = order.iter().map(|&i| evals[i]).collect();
    let res: Vec<_> = order.iter().map(|&i| residuals[i]).collect();
    for (i, v) in vectors.into_iter().enumerate() {
        kspace[i].assign(&v);
    }
    evals[..order.len()].copy_from_slice(&values);
    residuals[..order.len()].copy_from_slice(&res);
}

/// A residual smaller than this multiple of `eps |H|` signals an invariant subspace
const BREAKDOWN_FACTOR: f64 = 1e3;

/// Normalise the residual `w` of norm `norm`, or on breakdown replace it by a random direction
/// orthogonal to `basis` with zero coupling
///
/// `scale` is a norm of the current projection. Returns the unit residual and its coupling.
pub(crate) fn next_residual<S: Scalar, R: Rng>(
    basis: &[Array1<S>],
    w: Array1<S>,
    norm: S::Real,
    scale: S::Real,
    rng: &mut R,
) -> (Array1<S>, S::Real) {
    let eps = S::Real::epsilon();
    let factor: S::Real = NumCast::from(BREAKDOWN_FACTOR).unwrap();
    if norm > eps * factor * scale {
        return (w.mapv(|x| x / S::from_real(norm)), norm);
    }

    log::debug!(
        "{}krylov breakdown after {} vectors, continuing with a random direction",
        logging::prefix(),
        basis.len()
    );
    let mut fresh: Array1<S> = random_vector(w.len(), rng);
    project_out(basis, &mut fresh);
    let n = fresh.norm_l2();
    let fresh = if n > eps {
        fresh.mapv(|x| x / S::from_real(n))
    } else {
        Array1::zeros(w.len())
    };
    (fresh, S::Real::zero())
}

/// Normalise the start vector in place, or replace it by a seeded random one when it is zero
pub(crate) fn start_vector<S: Scalar, R: Rng>(v: &mut Array1<S>, rng: &mut R) {
    let norm = v.norm_l2();
    if norm > S::Real::zero() && norm.is_finite() {
        v.mapv_inplace(|x| x / S::from_real(norm));
    } else {
        let fresh: Array1<S> = random_vector(v.len(), rng);
        let n = fresh.norm_l2();
        v.assign(&fresh.mapv(|x| x / S::from_real(n)));
    }
}
