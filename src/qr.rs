//! Shifted QR sweeps on small dense upper Hessenberg (or tridiagonal) projections
//!
//! A sweep computes `H - mu I = QR` with Givens rotations and replaces `H` by `RQ + mu I`,
//! accumulating `Q` into a caller supplied matrix. Implicit restarts apply one sweep per
//! unwanted Ritz value.

use ndarray::{s, ArrayBase, DataMut, Ix2};
use num_traits::Zero;

use crate::{check_square, givens::GivensRotation, EigError, Result, Scalar};

/// Applies one shifted QR sweep to the upper Hessenberg matrix `h`, accumulating the
/// orthogonal factor into `q` (`q <- q * Q`).
pub fn shifted_qr_sweep<A, Sh, Sq>(
    h: &mut ArrayBase<Sh, Ix2>,
    q: &mut ArrayBase<Sq, Ix2>,
    mu: A,
) -> Result<()>
where
    A: Scalar,
    Sh: DataMut<Elem = A>,
    Sq: DataMut<Elem = A>,
{
    let n = check_square(h)?;
    if q.ncols() != n {
        return Err(EigError::DimensionMismatch {
            expected: n,
            actual: q.ncols(),
        });
    }
    if n < 2 {
        return Ok(());
    }

    for i in 0..n {
        h[(i, i)] -= mu;
    }

    // Reduce H - mu I to upper triangular form R
    let mut rotations = Vec::with_capacity(n - 1);
    for k in 0..n - 1 {
        let rot = GivensRotation::cancel_y(h[(k, k)], h[(k + 1, k)]).map(|(rot, _)| rot);
        if let Some(rot) = &rot {
            rot.rotate_rows(&mut h.slice_mut(s![.., k..]), k, k + 1);
        }
        h[(k + 1, k)] = A::zero();
        rotations.push(rot);
    }

    // Form RQ, which is upper Hessenberg again
    for (k, rot) in rotations.iter().enumerate() {
        if let Some(rot) = rot {
            rot.rotate_cols(&mut h.slice_mut(s![..k + 2, ..]), k, k + 1);
            rot.rotate_cols(q, k, k + 1);
        }
    }

    for i in 0..n {
        h[(i, i)] += mu;
    }
    Ok(())
}

/// Largest modulus of the entries below the first subdiagonal, zero for an exact Hessenberg
/// matrix
pub fn hessenberg_defect<A, S>(h: &ArrayBase<S, Ix2>) -> A::Real
where
    A: Scalar,
    S: ndarray::Data<Elem = A>,
{
    h.indexed_iter()
        .filter(|((i, j), _)| *i > j + 1)
        .map(|(_, x)| x.modulus())
        .fold(A::Real::zero(), |acc, m| if m > acc { m } else { acc })
}
