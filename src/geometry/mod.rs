mod aabb;
mod frustum;
mod sphere;
mod transform;

use nalgebra::{Point3, Vector3};
use simba::simd::WideF32x8;

use crate::util::simba::LaneFloat;

pub use aabb::{AABB, LaneBox};
pub use frustum::{Frustum, FrustumPlane, Plane};
pub use sphere::Sphere;
pub use transform::{LaneAffine, Transform};

pub type FloatType = f32;
pub type SimdFloatType = WideF32x8;

pub const EPSILON: FloatType = 1e-6;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;
pub type WorldPoint8 = Point3<SimdFloatType>;
pub type WorldBox8 = LaneBox<SimdFloatType>;

/// Dot product evaluated left to right, identical for every lane width.
#[inline(always)]
pub(crate) fn lane_dot<T: LaneFloat>(a: &Vector3<T>, b: &Vector3<T>) -> T {
    a.x * b.x + a.y * b.y + a.z * b.z
}
