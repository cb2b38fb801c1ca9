//! Fixed-size 3D helpers for positions, cells and stress tensors.

pub type Vec3 = [f64; 3];
pub type Mat3 = [[f64; 3]; 3];

pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Determinant of a cell whose rows are the lattice vectors.
pub fn det(m: &Mat3) -> f64 {
    dot(m[0], cross(m[1], m[2]))
}

/// Inverse of a 3x3 matrix, `None` when singular.
pub fn inverse(m: &Mat3) -> Option<Mat3> {
    let d = det(m);
    if d.abs() < 1e-12 {
        return None;
    }
    // Columns of the inverse are the reciprocal vectors.
    let c0 = scale(cross(m[1], m[2]), 1.0 / d);
    let c1 = scale(cross(m[2], m[0]), 1.0 / d);
    let c2 = scale(cross(m[0], m[1]), 1.0 / d);
    Some([
        [c0[0], c1[0], c2[0]],
        [c0[1], c1[1], c2[1]],
        [c0[2], c1[2], c2[2]],
    ])
}

/// Row vector times matrix: `v * m`.
pub fn vec_mat(v: Vec3, m: &Mat3) -> Vec3 {
    [
        v[0] * m[0][0] + v[1] * m[1][0] + v[2] * m[2][0],
        v[0] * m[0][1] + v[1] * m[1][1] + v[2] * m[2][1],
        v[0] * m[0][2] + v[1] * m[1][2] + v[2] * m[2][2],
    ]
}

/// Row-major flattening used for stress tensors.
pub fn flatten(m: &Mat3) -> [f64; 9] {
    [
        m[0][0], m[0][1], m[0][2],
        m[1][0], m[1][1], m[1][2],
        m[2][0], m[2][1], m[2][2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_of_orthorhombic_cell() {
        let cell = [[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 5.0]];
        assert_eq!(det(&cell), 40.0);
        let inv = inverse(&cell).unwrap();
        assert_eq!(vec_mat([1.0, 2.0, 2.5], &inv), [0.5, 0.5, 0.5]);
    }

    #[test]
    fn inverse_round_trips_triclinic_cell() {
        let cell = [[3.0, 0.0, 0.0], [1.0, 3.0, 0.0], [0.5, 0.5, 4.0]];
        let inv = inverse(&cell).unwrap();
        let frac = vec_mat([1.2, -0.7, 2.0], &inv);
        let back = vec_mat(frac, &cell);
        for k in 0..3 {
            assert!((back[k] - [1.2, -0.7, 2.0][k]).abs() < 1e-12);
        }
    }

    #[test]
    fn degenerate_cell_has_no_inverse() {
        let cell = [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(inverse(&cell).is_none());
    }
}
