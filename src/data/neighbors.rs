use crate::math::vec3::{self, Mat3, Vec3};

/// Directed neighbour list: every pair within the cutoff appears once per
/// direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborList {
    pub senders: Vec<usize>,
    pub receivers: Vec<usize>,
    /// Cartesian shift added to the receiver position.
    pub shifts: Vec<Vec3>,
}

impl NeighborList {
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// All pairs `(i, j, shift)` with `|pos[j] + shift - pos[i]| < r_max`,
/// including periodic images along periodic axes. The zero-shift self pair
/// is excluded.
pub fn neighbor_list(
    positions: &[Vec3],
    cell: Option<&Mat3>,
    pbc: [bool; 3],
    r_max: f64,
) -> NeighborList {
    let images = image_range(cell, pbc, r_max);
    let mut list = NeighborList::default();

    for (i, &pi) in positions.iter().enumerate() {
        for (j, &pj) in positions.iter().enumerate() {
            for &image in &images {
                let shift = match cell {
                    Some(c) => vec3::vec_mat(image, c),
                    None => [0.0; 3],
                };
                let is_origin = image == [0.0; 3];
                if i == j && is_origin {
                    continue;
                }
                let d = vec3::norm(vec3::sub(vec3::add(pj, shift), pi));
                if d < r_max {
                    list.senders.push(i);
                    list.receivers.push(j);
                    list.shifts.push(shift);
                }
            }
        }
    }

    list
}

/// Integer lattice translations to visit. The count along each periodic axis
/// comes from the plane spacing `V / |a_j x a_k|`.
fn image_range(cell: Option<&Mat3>, pbc: [bool; 3], r_max: f64) -> Vec<Vec3> {
    let reps: [i64; 3] = match cell {
        Some(c) if pbc.iter().any(|&p| p) => {
            let volume = vec3::det(c).abs();
            let mut reps = [0i64; 3];
            for axis in 0..3 {
                if !pbc[axis] {
                    continue;
                }
                let area = vec3::norm(vec3::cross(c[(axis + 1) % 3], c[(axis + 2) % 3]));
                let spacing = volume / area;
                reps[axis] = (r_max / spacing).ceil() as i64;
            }
            reps
        }
        _ => [0; 3],
    };

    let mut images = Vec::new();
    for a in -reps[0]..=reps[0] {
        for b in -reps[1]..=reps[1] {
            for c in -reps[2]..=reps[2] {
                images.push([a as f64, b as f64, c as f64]);
            }
        }
    }
    images
}
