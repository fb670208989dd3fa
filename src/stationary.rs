use crate::linalg::{identity, solve_linear, transpose};

/// Stationary distribution `pi` of a row-stochastic matrix, `pi P = pi`.
///
/// Solves `(P^T - I) pi = 0` with the last equation replaced by the
/// normalization `sum(pi) = 1`, which removes the rank deficiency of the
/// homogeneous system. Reducible or periodic chains may give inaccurate
/// results.
pub fn stationary_distribution(mat: &[Vec<f64>]) -> Vec<f64> {
    let dim = mat.len();
    if dim == 0 {
        return Vec::new();
    }

    let eye = identity(dim);
    let mut sys: Vec<Vec<f64>> = transpose(mat)
        .into_iter()
        .zip(eye)
        .map(|(row, eye_row)| row.iter().zip(eye_row).map(|(p, e)| p - e).collect())
        .collect();
    let mut rhs = vec![0.0; dim];

    sys[dim - 1] = vec![1.0; dim];
    rhs[dim - 1] = 1.0;

    solve_linear(&sys, &rhs)
}
