//! Dense linear-algebra kernels on small row-major matrices.

use anyhow::{Result, bail};

/// Row-major square matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Pivots below this magnitude are treated as zero.
const PIVOT_TOL: f64 = 1e-10;

/// Divide every entry of `row` by the row sum.
///
/// An all-zero row is returned unchanged.
pub fn normalize_row(row: &[f64]) -> Vec<f64> {
    let sum: f64 = row.iter().sum();
    if sum == 0.0 {
        return row.to_vec();
    }
    row.iter().map(|ele| ele / sum).collect()
}

/// Compute the row vector `v * P`.
pub fn advance_distribution(vec: &[f64], mat: &[Vec<f64>]) -> Vec<f64> {
    let n_cols = mat.first().map_or(0, |row| row.len());
    let mut out = vec![0.0; n_cols];
    for (&weight, row) in vec.iter().zip(mat) {
        if weight == 0.0 {
            continue;
        }
        for (out_ele, &prob) in out.iter_mut().zip(row) {
            *out_ele += weight * prob;
        }
    }
    out
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// Columns whose best pivot falls below `1e-10` are skipped and the
/// corresponding unknown is left at zero, so rank-deficient systems
/// produce a finite answer instead of an error.
pub fn solve_linear(mat: &[Vec<f64>], rhs: &[f64]) -> Vec<f64> {
    let dim = rhs.len();
    let mut aug: Vec<Vec<f64>> = mat
        .iter()
        .zip(rhs)
        .map(|(row, &b)| {
            let mut aug_row = row.clone();
            aug_row.push(b);
            aug_row
        })
        .collect();

    let mut pivot_rows = vec![None; dim];
    let mut i_row = 0;
    for i_col in 0..dim {
        if i_row == dim {
            break;
        }
        // Select the row with the largest magnitude in this column.
        let i_best = (i_row..dim)
            .max_by(|&a, &b| aug[a][i_col].abs().total_cmp(&aug[b][i_col].abs()))
            .unwrap_or(i_row);
        if aug[i_best][i_col].abs() < PIVOT_TOL {
            continue;
        }
        aug.swap(i_row, i_best);

        for i_other in (i_row + 1)..dim {
            let factor = aug[i_other][i_col] / aug[i_row][i_col];
            if factor == 0.0 {
                continue;
            }
            for k in i_col..=dim {
                aug[i_other][k] -= factor * aug[i_row][k];
            }
        }
        pivot_rows[i_col] = Some(i_row);
        i_row += 1;
    }

    let mut sol = vec![0.0; dim];
    for i_col in (0..dim).rev() {
        let Some(i_piv) = pivot_rows[i_col] else {
            continue;
        };
        let row = &aug[i_piv];
        let tail: f64 = ((i_col + 1)..dim).map(|k| row[k] * sol[k]).sum();
        sol[i_col] = (row[dim] - tail) / row[i_col];
    }
    sol
}

/// L1 distance between two vectors of equal length.
pub fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Total variation distance between two distributions.
pub fn total_variation(a: &[f64], b: &[f64]) -> f64 {
    0.5 * l1_distance(a, b)
}

/// One-hot probability vector of length `n` at `idx`.
pub fn one_hot(n: usize, idx: usize) -> Vec<f64> {
    let mut vec = vec![0.0; n];
    vec[idx] = 1.0;
    vec
}

/// `n x n` identity matrix.
pub fn identity(n: usize) -> Matrix {
    (0..n).map(|i| one_hot(n, i)).collect()
}

/// Transpose of a rectangular matrix.
pub fn transpose(mat: &[Vec<f64>]) -> Matrix {
    let n_cols = mat.first().map_or(0, |row| row.len());
    (0..n_cols)
        .map(|j| mat.iter().map(|row| row[j]).collect())
        .collect()
}

/// Set `mat[i_row][i_col]` to `val` (clamped to `[0, 1]`) and rescale the
/// rest of the row so that it still sums to one.
///
/// The remaining entries are scaled proportionally, or share the leftover
/// mass evenly if they were all zero. Every other row is copied as is.
pub fn update_matrix_probability(
    mat: &[Vec<f64>],
    i_row: usize,
    i_col: usize,
    val: f64,
) -> Result<Matrix> {
    let n_rows = mat.len();
    if i_row >= n_rows {
        bail!("row index must be below {n_rows}, but is {i_row}");
    }
    let n_cols = mat[i_row].len();
    if i_col >= n_cols {
        bail!("column index must be below {n_cols}, but is {i_col}");
    }

    let val = val.clamp(0.0, 1.0);
    let rest: f64 = mat[i_row]
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i_col)
        .map(|(_, &ele)| ele)
        .sum();
    let left = 1.0 - val;

    let mut out = mat.to_vec();
    let n_others = (n_cols - 1).max(1) as f64;
    for (j, ele) in out[i_row].iter_mut().enumerate() {
        *ele = if j == i_col {
            val
        } else if rest > 0.0 {
            *ele * left / rest
        } else {
            left / n_others
        };
    }
    Ok(out)
}
