pub mod matrix;
pub mod vec3;

pub use matrix::Matrix;
pub use vec3::{Mat3, Vec3};
