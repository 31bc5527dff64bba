use nalgebra::Point3;

use crate::{
    geometry::{FloatType, WorldPoint},
    util::simba::LaneFloat,
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: WorldPoint,
    pub radius: FloatType,
}

impl Sphere {
    pub fn new(center: WorldPoint, radius: FloatType) -> Sphere {
        Sphere { center, radius }
    }

    /// Sphere containing everything, used for directional lights.
    pub fn infinite() -> Sphere {
        Sphere {
            center: WorldPoint::origin(),
            radius: FloatType::INFINITY,
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.radius.is_infinite()
    }

    /// Closed test, touching spheres intersect.
    pub fn intersects(&self, other: &Sphere) -> bool {
        self.intersect_lanes::<f32>(&other.center, other.radius).0 != 0
    }

    /// Tests this sphere against a pack of spheres.
    ///
    /// Returns a bit mask of lanes where `distance <= radius sum` (compared squared),
    /// and the squared center distances. Distance to an infinite sphere is reported as zero.
    ///
    /// Distances and radii are squared in `f32`, so they must stay below about 1.8e19.
    /// Lanes whose squared distance overflows are reported as apart unless their radius is infinite.
    #[inline]
    pub fn intersect_lanes<T: LaneFloat>(&self, centers: &Point3<T>, radii: T) -> (u64, T) {
        let dx = centers.x - T::splat(self.center.x);
        let dy = centers.y - T::splat(self.center.y);
        let dz = centers.z - T::splat(self.center.z);
        let distance_squared = dx * dx + dy * dy + dz * dz;

        let radius_sum = radii + T::splat(self.radius);
        let overflowed = distance_squared.infinite_bits() & !radius_sum.infinite_bits();
        let touching = distance_squared.le_bits(radius_sum * radius_sum) & !overflowed;

        if self.is_infinite() {
            (T::all_lanes(), T::splat(0.0))
        } else {
            (touching, distance_squared)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{SimdFloatType, WorldPoint8};
    use assert2::assert;
    use simba::simd::SimdValue as _;
    use test_case::test_case;

    #[test_case(5.0, 3.0, false ; "apart")]
    #[test_case(5.0, 4.0, true ; "touching")]
    #[test_case(5.0, 10.0, true ; "overlapping")]
    #[test_case(0.0, 0.0, true ; "concentric_points")]
    fn sphere_pairs(distance: f32, radius: f32, expected: bool) {
        let a = Sphere::new(WorldPoint::origin(), 1.0);
        let b = Sphere::new(WorldPoint::new(distance, 0.0, 0.0), radius);
        assert!(a.intersects(&b) == expected);
        assert!(b.intersects(&a) == expected);
    }

    #[test]
    fn infinite_sphere_short_circuits_distance() {
        let centers = WorldPoint8::new(
            SimdFloatType::splat(1e30),
            SimdFloatType::splat(-1e30),
            SimdFloatType::splat(0.0),
        );
        let (mask, distance) = Sphere::infinite().intersect_lanes(&centers, SimdFloatType::splat(1.0));
        assert!(mask == 0xff);
        assert!(distance.extract(3) == 0.0);
    }

    #[test]
    fn overflowing_distance_is_apart() {
        let far = Sphere::new(WorldPoint::new(1e20, 0.0, 0.0), 1e20);
        let near = Sphere::new(WorldPoint::new(-1e20, 0.0, 0.0), 1e19);
        assert!(!near.intersects(&far));

        let unbounded = Sphere::new(WorldPoint::new(1e25, 0.0, 0.0), f32::INFINITY);
        assert!(near.intersects(&unbounded));
    }

    #[test]
    fn lanes_report_squared_distance() {
        let centers = WorldPoint8::new(
            SimdFloatType::from_lanes(|i| i as f32),
            SimdFloatType::splat(0.0),
            SimdFloatType::splat(0.0),
        );
        let (mask, distance) =
            Sphere::new(WorldPoint::origin(), 2.0).intersect_lanes(&centers, SimdFloatType::splat(1.0));
        assert!(mask == 0b1111);
        assert!(distance.extract(5) == 25.0);
    }
}
