//! Dense linear solve for the variance components.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Solve `a · x = b` through an LU decomposition with partial pivoting.
///
/// A diagonal entry of U whose magnitude is at most `tolerance` times the
/// largest entry of `a` makes the system singular.
///
/// # Errors
///
/// Returns [`Error::SingularDesign`] for a singular or non-square system.
pub fn lu_solve(a: &Array2<f64>, b: &Array1<f64>, tolerance: f64) -> Result<Array1<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(Error::singular_design(format!(
            "system is {}x{} with {n} right-hand sides",
            a.nrows(),
            a.ncols()
        )));
    }
    if n == 0 {
        return Ok(Array1::zeros(0));
    }

    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return Err(Error::singular_design("coefficient matrix is all zero"));
    }
    let threshold = tolerance * scale;

    let lu = DMatrix::from_fn(n, n, |i, j| a[[i, j]]).lu();
    let u = lu.u();
    if let Some((col, pivot)) = u
        .diagonal()
        .iter()
        .enumerate()
        .find(|(_, p)| p.abs() <= threshold)
    {
        return Err(Error::singular_design(format!(
            "pivot {pivot:.3e} in column {col} is below {threshold:.3e}"
        )));
    }

    let rhs = DVector::from_iterator(n, b.iter().copied());
    let x = lu
        .solve(&rhs)
        .ok_or_else(|| Error::singular_design("LU solve failed"))?;
    Ok(x.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_small_system() {
        let a = array![[2.0, 1.0, -1.0], [-3.0, -1.0, 2.0], [-2.0, 1.0, 2.0]];
        let b = array![8.0, -11.0, -3.0];
        let x = lu_solve(&a, &b, 1e-12).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-10);
        assert!((x[1] - 3.0).abs() < 1e-10);
        assert!((x[2] + 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_solve_needs_pivoting() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![5.0, 7.0];
        let x = lu_solve(&a, &b, 1e-12).unwrap();
        assert!((x[0] - 7.0).abs() < 1e-12);
        assert!((x[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_singular() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        assert!(matches!(
            lu_solve(&a, &b, 1e-10),
            Err(Error::SingularDesign { .. })
        ));

        let a = Array2::zeros((2, 2));
        assert!(lu_solve(&a, &array![0.0, 0.0], 1e-10).is_err());
    }

    #[test]
    fn test_solve_near_singular_relative_to_scale() {
        // rows nearly dependent: U's second pivot is about 1e-11 of the scale
        let a = array![[1.0e6, 2.0e6], [2.0e6, 4.0e6 + 1.0e-4]];
        let b = array![1.0, 2.0];
        assert!(lu_solve(&a, &b, 1e-10).is_err());
        assert!(lu_solve(&a, &b, 1e-15).is_ok());
    }

    #[test]
    fn test_solve_shape_mismatch() {
        let a = Array2::zeros((2, 3));
        assert!(lu_solve(&a, &array![1.0, 2.0], 1e-10).is_err());
    }
}
