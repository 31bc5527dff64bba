use std::array;

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

use crate::{
    geometry::{FloatType, LaneBox, WorldPoint, WorldVector},
    util::simba::LaneFloat,
};

/// World transform of an entity, as produced by the node hierarchy.
///
/// The matrix is affine (last row 0, 0, 0, 1) and already contains the scale,
/// `scale` is kept separately for scaling bounding radii.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    matrix: Matrix4<FloatType>,
    scale: WorldVector,
}

impl Transform {
    pub fn identity() -> Transform {
        Transform {
            matrix: Matrix4::identity(),
            scale: WorldVector::repeat(1.0),
        }
    }

    pub fn new(
        translation: WorldVector,
        rotation: UnitQuaternion<FloatType>,
        scale: WorldVector,
    ) -> Transform {
        let matrix = Matrix4::new_translation(&translation)
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&scale);
        Transform { matrix, scale }
    }

    pub fn from_translation(translation: WorldVector) -> Transform {
        Transform::new(translation, UnitQuaternion::identity(), WorldVector::repeat(1.0))
    }

    /// Wraps an already composed world matrix.
    pub fn from_matrix(matrix: Matrix4<FloatType>, scale: WorldVector) -> Transform {
        Transform { matrix, scale }
    }

    pub fn matrix(&self) -> &Matrix4<FloatType> {
        &self.matrix
    }

    pub fn scale(&self) -> &WorldVector {
        &self.scale
    }

    /// Largest absolute scale factor, mirroring flips do not shrink radii.
    pub fn max_scale(&self) -> FloatType {
        self.scale.abs().max()
    }

    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)])
    }

    /// Local -Z axis in world space, normalized. Lights shine along it.
    pub fn direction(&self) -> WorldVector {
        -WorldVector::new(self.matrix[(0, 2)], self.matrix[(1, 2)], self.matrix[(2, 2)])
            .normalize()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::identity()
    }
}

/// Upper three rows of a pack of affine matrices, one per lane.
#[derive(Copy, Clone, Debug)]
pub struct LaneAffine<T: LaneFloat> {
    rows: [[T; 4]; 3],
}

impl<T: LaneFloat> LaneAffine<T> {
    /// Gathers one matrix per lane. `transforms` must have exactly `T::LANES` items.
    pub fn gather(transforms: &[Transform]) -> Self {
        debug_assert!(transforms.len() == T::LANES);
        LaneAffine {
            rows: array::from_fn(|r| {
                array::from_fn(|c| T::from_lanes(|lane| transforms[lane].matrix[(r, c)]))
            }),
        }
    }

    pub fn transform_point(&self, p: &Point3<T>) -> Point3<T> {
        let [x, y, z] = self
            .rows
            .map(|[m0, m1, m2, m3]| m0 * p.x + m1 * p.y + m2 * p.z + m3);
        Point3::new(x, y, z)
    }

    /// Transforms a pack of boxes.
    ///
    /// The center goes through the full matrix, the half size through the absolute values
    /// of the basis. For rotated boxes this is larger than the tight box around the
    /// eight transformed corners.
    /// Lanes with an infinite extent become fully infinite.
    pub fn transform_box(&self, local: &LaneBox<T>) -> LaneBox<T> {
        let h = &local.half_size;
        let [hx, hy, hz] = self.rows.map(|[m0, m1, m2, _]| {
            m0.lane_abs() * h.x + m1.lane_abs() * h.y + m2.lane_abs() * h.z
        });

        let infinite = local.infinite_bits();
        let inf = T::splat(FloatType::INFINITY);

        LaneBox {
            center: self.transform_point(&local.center),
            half_size: Vector3::new(
                T::select_bits(infinite, inf, hx),
                T::select_bits(infinite, inf, hy),
                T::select_bits(infinite, inf, hz),
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{SimdFloatType, WorldBox};
    use assert2::assert;
    use simba::simd::SimdValue as _;
    use std::f32::consts::FRAC_PI_4;

    fn single(transform: Transform, b: &WorldBox) -> WorldBox {
        LaneAffine::<f32>::gather(&[transform])
            .transform_box(&LaneBox::from_box(b))
            .to_box()
    }

    #[test]
    fn translation_moves_box() {
        let b = WorldBox::new(WorldPoint::new(-1.0, -1.0, -1.0), WorldPoint::new(1.0, 1.0, 1.0));
        let moved = single(Transform::from_translation(WorldVector::new(5.0, 0.0, -2.0)), &b);
        assert!(moved == WorldBox::new(WorldPoint::new(4.0, -1.0, -3.0), WorldPoint::new(6.0, 1.0, -1.0)));
    }

    #[test]
    fn rotation_over_approximates() {
        let b = WorldBox::new(WorldPoint::new(-1.0, -1.0, -1.0), WorldPoint::new(1.0, 1.0, 1.0));
        let rotation = UnitQuaternion::from_axis_angle(&WorldVector::z_axis(), FRAC_PI_4);
        let rotated = single(Transform::new(WorldVector::zeros(), rotation, WorldVector::repeat(1.0)), &b);

        let expected = 2.0f32.sqrt();
        assert!((rotated.max.x - expected).abs() < 1e-5);
        assert!((rotated.max.y - expected).abs() < 1e-5);
        assert!((rotated.max.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn scale_stretches_box() {
        let b = WorldBox::new(WorldPoint::new(0.0, 0.0, 0.0), WorldPoint::new(1.0, 1.0, 1.0));
        let t = Transform::new(
            WorldVector::zeros(),
            UnitQuaternion::identity(),
            WorldVector::new(2.0, 3.0, 4.0),
        );
        assert!(single(t, &b) == WorldBox::new(WorldPoint::origin(), WorldPoint::new(2.0, 3.0, 4.0)));
        assert!(t.max_scale() == 4.0);
    }

    #[test]
    fn mirrored_scale_keeps_radius_positive() {
        let t = Transform::new(
            WorldVector::zeros(),
            UnitQuaternion::identity(),
            WorldVector::new(-3.0, 1.0, 2.0),
        );
        assert!(t.max_scale() == 3.0);
    }

    #[test]
    fn infinite_box_stays_infinite_under_zero_scale() {
        let t = Transform::new(
            WorldVector::new(1.0, 2.0, 3.0),
            UnitQuaternion::identity(),
            WorldVector::zeros(),
        );
        let transformed = single(t, &WorldBox::infinite());
        assert!(transformed == WorldBox::infinite());
    }

    #[test]
    fn lanes_gather_per_lane_transform() {
        let transforms: Vec<Transform> = (0..8)
            .map(|i| Transform::from_translation(WorldVector::new(i as f32, 0.0, 0.0)))
            .collect();
        let affine = LaneAffine::<SimdFloatType>::gather(&transforms);
        let p = affine.transform_point(&Point3::new(
            SimdFloatType::splat(1.0),
            SimdFloatType::splat(0.0),
            SimdFloatType::splat(0.0),
        ));
        assert!(p.x.extract(6) == 7.0);
    }

    #[test]
    fn light_direction() {
        let rotation = UnitQuaternion::from_axis_angle(&WorldVector::y_axis(), std::f32::consts::FRAC_PI_2);
        let t = Transform::new(WorldVector::zeros(), rotation, WorldVector::repeat(2.0));
        let d = t.direction();
        assert!((d - WorldVector::new(-1.0, 0.0, 0.0)).norm() < 1e-5);
        assert!(t.position() == WorldPoint::origin());
    }
}
