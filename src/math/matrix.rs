use serde::{Serialize, Deserialize};
use std::ops::{Add, Mul};

/// Dense row-major matrix used for the small linear-algebra jobs of
/// preprocessing (least-squares atomic energies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows],
        }
    }

    pub fn identity(n: usize) -> Matrix {
        let mut res = Matrix::zeros(n, n);
        for i in 0..n {
            res.data[i][i] = 1.0;
        }
        res
    }

    /// Builds a matrix from row vectors. An empty `data` gives a 0x0 matrix.
    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        Matrix {
            rows: data.len(),
            cols: data.first().map(|row| row.len()).unwrap_or(0),
            data,
        }
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..res.rows {
            for j in 0..res.cols {
                res.data[i][j] = self.data[j][i];
            }
        }

        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix::from_data(
            self.data
                .iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect(),
        )
    }

    /// Matrix-vector product.
    pub fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(self.cols, v.len(), "Matrix and vector are of incorrect sizes");
        self.data
            .iter()
            .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
            .collect()
    }

    /// Solves `self * x = rhs` for square `self` by Gaussian elimination with
    /// partial pivoting. Returns `None` when the system is singular.
    pub fn solve(&self, rhs: &[f64]) -> Option<Vec<f64>> {
        assert_eq!(self.rows, self.cols, "solve needs a square matrix");
        assert_eq!(self.rows, rhs.len(), "right-hand side has the wrong length");

        let n = self.rows;
        let mut a = self.data.clone();
        let mut b = rhs.to_vec();

        for col in 0..n {
            let pivot = (col..n).max_by(|&i, &j| {
                a[i][col].abs().partial_cmp(&a[j][col].abs()).unwrap_or(std::cmp::Ordering::Equal)
            })?;
            if a[pivot][col].abs() < 1e-12 {
                return None;
            }
            a.swap(col, pivot);
            b.swap(col, pivot);

            for row in (col + 1)..n {
                let factor = a[row][col] / a[col][col];
                if factor == 0.0 {
                    continue;
                }
                for k in col..n {
                    a[row][k] -= factor * a[col][k];
                }
                b[row] -= factor * b[col];
            }
        }

        let mut x = vec![0.0; n];
        for row in (0..n).rev() {
            let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
            x[row] = (b[row] - tail) / a[row][row];
        }
        Some(x)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, self.cols);

        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[i][j] = self.data[i][j] + rhs.data[i][j];
            }
        }

        res
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.cols != rhs.rows {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);

        for i in 0..res.rows {
            for j in 0..res.cols {
                let mut sum = 0.0;

                for k in 0..self.cols {
                    sum += self.data[i][k] * rhs.data[k][j];
                }

                res.data[i][j] = sum;
            }
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_small_system() {
        let a = Matrix::from_data(vec![vec![2.0, 1.0], vec![1.0, 3.0]]);
        let x = a.solve(&[3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn singular_system_has_no_solution() {
        let a = Matrix::from_data(vec![vec![1.0, 2.0], vec![2.0, 4.0]]);
        assert!(a.solve(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn normal_equations_shape() {
        let a = Matrix::from_data(vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 2.0]]);
        let ata = a.transpose() * a.clone();
        assert_eq!((ata.rows, ata.cols), (2, 2));
        assert_eq!(ata.data, vec![vec![2.0, 1.0], vec![1.0, 5.0]]);
        assert_eq!(a.mul_vec(&[1.0, 1.0]), vec![1.0, 2.0, 2.0]);
    }
}
