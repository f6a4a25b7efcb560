//! Linear operators known only through their action on vectors

use ndarray::{linalg::general_mat_vec_mul, Array1, ArrayBase, ArrayView1, ArrayViewMut1, Data, Ix2};

use crate::{field::inner, EigError, Result, Scalar};

/// An operator `M` from `C^cols` to `C^rows` with its adjoint
pub trait LinearOperator<S: Scalar> {
    /// `(rows, cols)` of the operator
    fn shape(&self) -> (usize, usize);

    /// `out = M * input`
    fn apply(&self, out: ArrayViewMut1<S>, input: ArrayView1<S>) -> Result<()>;

    /// `out = M^H * input`
    fn apply_adjoint(&self, out: ArrayViewMut1<S>, input: ArrayView1<S>) -> Result<()>;
}

/// Which product of the operator the eigensolver iterates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatVecKind {
    /// `M`
    #[default]
    M,
    /// `M^H`
    Mdag,
    /// `M^H M`, Hermitian positive semi-definite on the column space
    MdagM,
    /// `M M^H`, Hermitian positive semi-definite on the row space
    MMdag,
}

impl MatVecKind {
    /// Normal products whose eigenvalues are squared singular values
    pub fn is_normal(self) -> bool {
        matches!(self, MatVecKind::MdagM | MatVecKind::MMdag)
    }

    /// Length of the vectors the product acts on
    pub fn domain_dim(self, (rows, cols): (usize, usize)) -> usize {
        match self {
            MatVecKind::M | MatVecKind::MdagM => cols,
            MatVecKind::Mdag | MatVecKind::MMdag => rows,
        }
    }

    /// Length of the vectors the product returns
    pub fn range_dim(self, (rows, cols): (usize, usize)) -> usize {
        match self {
            MatVecKind::M | MatVecKind::MMdag => rows,
            MatVecKind::Mdag | MatVecKind::MdagM => cols,
        }
    }
}

pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        Err(EigError::DimensionMismatch { expected, actual })
    } else {
        Ok(())
    }
}

impl<S, D> LinearOperator<S> for ArrayBase<D, Ix2>
where
    S: Scalar,
    D: Data<Elem = S>,
{
    fn shape(&self) -> (usize, usize) {
        self.dim()
    }

    fn apply(&self, mut out: ArrayViewMut1<S>, input: ArrayView1<S>) -> Result<()> {
        check_len(self.ncols(), input.len())?;
        check_len(self.nrows(), out.len())?;
        general_mat_vec_mul(S::one(), self, &input, S::zero(), &mut out);
        Ok(())
    }

    fn apply_adjoint(&self, mut out: ArrayViewMut1<S>, input: ArrayView1<S>) -> Result<()> {
        check_len(self.nrows(), input.len())?;
        check_len(self.ncols(), out.len())?;
        for (o, col) in out.iter_mut().zip(self.columns()) {
            *o = inner(&col, &input);
        }
        Ok(())
    }
}

/// Diagonal operator, mainly useful for spectra known in closed form
#[derive(Debug, Clone)]
pub struct DiagonalOperator<S> {
    diag: Array1<S>,
}

impl<S: Scalar> DiagonalOperator<S> {
    pub fn new(diag: Array1<S>) -> Self {
        Self { diag }
    }

    pub fn diag(&self) -> &Array1<S> {
        &self.diag
    }
}

impl<S: Scalar> LinearOperator<S> for DiagonalOperator<S> {
    fn shape(&self) -> (usize, usize) {
        (self.diag.len(), self.diag.len())
    }

    fn apply(&self, mut out: ArrayViewMut1<S>, input: ArrayView1<S>) -> Result<()> {
        check_len(self.diag.len(), input.len())?;
        check_len(self.diag.len(), out.len())?;
        out.assign(&(&self.diag * &input));
        Ok(())
    }

    fn apply_adjoint(&self, mut out: ArrayViewMut1<S>, input: ArrayView1<S>) -> Result<()> {
        check_len(self.diag.len(), input.len())?;
        check_len(self.diag.len(), out.len())?;
        for ((o, &d), &x) in out.iter_mut().zip(self.diag.iter()).zip(input.iter()) {
            *o = d.conj() * x;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};
    use num_complex::Complex64;

    use super::*;

    #[test]
    fn dense_and_adjoint() {
        let m = array![[1.0f64, 2., 3.], [4., 5., 6.]];
        assert_eq!(LinearOperator::shape(&m), (2, 3));

        let mut out = Array1::zeros(2);
        m.apply(out.view_mut(), array![1., 0., -1.].view()).unwrap();
        assert_abs_diff_eq!(out, array![-2., -2.]);

        let mut out = Array1::zeros(3);
        m.apply_adjoint(out.view_mut(), array![1., 1.].view()).unwrap();
        assert_abs_diff_eq!(out, array![5., 7., 9.]);

        assert!(matches!(
            m.apply(Array1::zeros(2).view_mut(), array![1., 2.].view()),
            Err(EigError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn complex_adjoint() {
        let i = Complex64::new(0., 1.);
        let one = Complex64::new(1., 0.);
        let m = array![[i, one], [one * 2., -i]];
        let x = array![one, i];
        let y = array![i, one * 3.];

        // <y, M x> == <M^H y, x>
        let mut mx = Array1::zeros(2);
        m.apply(mx.view_mut(), x.view()).unwrap();
        let mut mhy = Array1::zeros(2);
        m.apply_adjoint(mhy.view_mut(), y.view()).unwrap();
        let lhs: Complex64 = inner(&y, &mx);
        let rhs: Complex64 = inner(&mhy, &x);
        assert_abs_diff_eq!((lhs - rhs).norm(), 0., epsilon = 1e-14);
    }

    #[test]
    fn diagonal() {
        let op = DiagonalOperator::new(array![Complex64::new(1., 2.), Complex64::new(-3., 0.)]);
        let x = array![Complex64::new(1., 0.), Complex64::new(0., 1.)];
        let mut out = Array1::zeros(2);
        op.apply_adjoint(out.view_mut(), x.view()).unwrap();
        assert_eq!(out, array![Complex64::new(1., -2.), Complex64::new(0., -3.)]);
        assert_eq!(op.shape(), (2, 2));
    }

    #[test]
    fn kinds() {
        assert!(MatVecKind::MdagM.is_normal());
        assert!(!MatVecKind::M.is_normal());
        assert_eq!(MatVecKind::MdagM.domain_dim((5, 3)), 3);
        assert_eq!(MatVecKind::MMdag.range_dim((5, 3)), 5);
        assert_eq!(MatVecKind::Mdag.range_dim((5, 3)), 3);
        assert_eq!(MatVecKind::default(), MatVecKind::M);
    }
}
