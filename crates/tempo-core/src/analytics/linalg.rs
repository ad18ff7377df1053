//! Small dense linear algebra for the absorbing-chain fundamental matrix.
//!
//! Gaussian elimination with partial pivoting on row-major square matrices.
//! The matrices involved are tiny (transient-state count squared), so no
//! external linear-algebra dependency is warranted.

/// Pivot magnitudes below this threshold mark the matrix near-singular.
pub const SINGULARITY_THRESHOLD: f64 = 1e-10;

/// Inverts a square row-major matrix by Gauss-Jordan elimination with
/// partial pivoting. Returns `None` when a pivot falls below the
/// singularity threshold.
pub fn invert(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    if matrix.iter().any(|row| row.len() != n) {
        return None;
    }

    // Augment [A | I].
    let mut work: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut augmented = row.clone();
            augmented.extend((0..n).map(|j| f64::from(u8::from(i == j))));
            augmented
        })
        .collect();

    for col in 0..n {
        // Partial pivot: largest magnitude in the column at or below row col.
        let pivot_row = (col..n)
            .max_by(|&a, &b| work[a][col].abs().total_cmp(&work[b][col].abs()))?;
        if work[pivot_row][col].abs() < SINGULARITY_THRESHOLD {
            return None;
        }
        work.swap(col, pivot_row);

        let pivot = work[col][col];
        for value in &mut work[col] {
            *value /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[row][col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..2 * n {
                work[row][k] -= factor * work[col][k];
            }
        }
    }

    Some(work.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// Multiplies a square matrix by a column vector.
pub fn mat_vec(matrix: &[Vec<f64>], vector: &[f64]) -> Vec<f64> {
    matrix
        .iter()
        .map(|row| row.iter().zip(vector).map(|(a, b)| a * b).sum())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn identity_inverts_to_itself() {
        let identity = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let inverse = invert(&identity).unwrap();
        assert!(approx(inverse[0][0], 1.0) && approx(inverse[1][1], 1.0));
        assert!(approx(inverse[0][1], 0.0) && approx(inverse[1][0], 0.0));
    }

    #[test]
    fn known_inverse() {
        let matrix = vec![vec![4.0, 7.0], vec![2.0, 6.0]];
        let inverse = invert(&matrix).unwrap();
        assert!(approx(inverse[0][0], 0.6));
        assert!(approx(inverse[0][1], -0.7));
        assert!(approx(inverse[1][0], -0.2));
        assert!(approx(inverse[1][1], 0.4));
    }

    #[test]
    fn product_with_inverse_is_identity() {
        let matrix = vec![
            vec![2.0, -1.0, 0.0],
            vec![-1.0, 2.0, -1.0],
            vec![0.0, -1.0, 2.0],
        ];
        let inverse = invert(&matrix).unwrap();
        for i in 0..3 {
            let column: Vec<f64> = (0..3).map(|j| matrix[i][j]).collect();
            let product = mat_vec(&inverse, &column);
            for (j, value) in product.iter().enumerate() {
                let expected = f64::from(u8::from(i == j));
                assert!(approx(*value, expected), "({i},{j}) = {value}");
            }
        }
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let singular = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(invert(&singular).is_none());
    }
}
