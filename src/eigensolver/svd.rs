//! Singular triplets from the eigenpairs of a normal operator product
//!
//! Eigenvectors `v` of `M^H M` with eigenvalue `sigma^2` are right singular vectors of `M`;
//! the left partner is `u = M v / sigma`. For `M M^H` the roles swap.

use ndarray::Array1;
use num_complex::Complex;
use num_traits::{Float, Zero};

use super::mat_vec;
use crate::{
    field::normalize_phase,
    logging,
    norm::Norm,
    operator::{check_len, LinearOperator},
    EigError, EigParam, MatVecKind, RealScalar, Result, Scalar,
};

/// Turn `evals.len()` eigenpairs of `M^H M` (or `M M^H`) in `kspace` into singular triplets
///
/// The eigenvectors in `kspace[..n]` are phase normalised and their partners written to
/// `kspace[n..2n]`. `evals` is replaced by the singular values, sorted descending, or ascending
/// when `inverse` is set (a polynomial filter reverses the apparent order). Singular values
/// below `eps * magnitude_correction * sigma_max` are treated as zero and get a zero partner.
///
/// `residuals` follows the same order and is replaced by the triplet residuals: for `M^H M`
/// with `u = M v / sigma` that is `|M^H u - sigma v|`, and `|M v|` for a zero singular value.
pub fn compute_svd<S, O>(
    op: &O,
    kspace: &mut [Array1<S>],
    evals: &mut [Complex<S::Real>],
    residuals: &mut [S::Real],
    param: &EigParam<S::Real>,
    inverse: bool,
) -> Result<()>
where
    S: Scalar,
    O: LinearOperator<S> + ?Sized,
{
    let (rows, cols) = op.shape();
    if !param.mat_vec.is_normal() {
        return Err(EigError::SvdRequiresNormalOperator(param.mat_vec));
    }
    if rows != cols {
        return Err(EigError::NotSquare { rows, cols });
    }
    let n = evals.len();
    check_len(n, residuals.len())?;
    if kspace.len() < 2 * n {
        return Err(EigError::KrylovSpaceTooSmall {
            expected: 2 * n,
            actual: kspace.len(),
        });
    }
    if n == 0 {
        return Ok(());
    }

    // Eigenvalues of a normal product are non-negative up to roundoff
    let sigma: Vec<S::Real> = evals
        .iter()
        .map(|l| l.re.max(S::Real::zero()).sqrt())
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let ord = sigma[b].partial_cmp(&sigma[a]).unwrap_or(std::cmp::Ordering::Equal);
        if inverse {
            ord.reverse()
        } else {
            ord
        }
    });

    let sigma_max = sigma.iter().copied().fold(S::Real::zero(), S::Real::max);
    let cutoff = S::Real::epsilon() * S::Real::magnitude_correction() * sigma_max;

    let vectors: Vec<Array1<S>> = order.iter().map(|&i| kspace[i].clone()).collect();
    for (slot, (mut v, &i)) in vectors.into_iter().zip(&order).enumerate() {
        normalize_phase(&mut v);
        let s = sigma[i];

        // M v for M^H M, M^H v for M M^H; the other product maps the partner back
        let (forward, backward) = match param.mat_vec {
            MatVecKind::MdagM => (MatVecKind::M, MatVecKind::Mdag),
            _ => (MatVecKind::Mdag, MatVecKind::M),
        };
        let mut partner = Array1::<S>::zeros(rows);
        mat_vec(op, partner.view_mut(), v.view(), forward)?;
        let residual = if s > cutoff {
            partner.mapv_inplace(|x| x / S::from_real(s));
            let mut back = Array1::<S>::zeros(rows);
            mat_vec(op, back.view_mut(), partner.view(), backward)?;
            back.scaled_add(-S::from_real(s), &v);
            back.norm_l2()
        } else {
            log::warn!(
                "{}singular value {} of {:e} is below the cutoff {:e}, partner vector set to zero",
                logging::prefix(),
                slot,
                s,
                cutoff
            );
            let r = partner.norm_l2();
            partner.fill(S::zero());
            r
        };

        kspace[slot].assign(&v);
        kspace[n + slot].assign(&partner);
        evals[slot] = Complex::new(s, S::Real::zero());
        residuals[slot] = residual;
    }
    Ok(())
}
