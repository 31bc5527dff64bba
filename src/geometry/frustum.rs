use nalgebra::{Matrix4, Vector3, Vector4};

use crate::{
    geometry::{EPSILON, FloatType, LaneBox, WorldBox, WorldPoint, WorldVector, lane_dot},
    util::simba::LaneFloat,
};

/// Half space `dot(normal, p) + d > 0`, normal pointing inside.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: WorldVector,
    pub d: FloatType,
}

impl Plane {
    pub fn new(normal: WorldVector, d: FloatType) -> Plane {
        Plane { normal, d }
    }

    /// Plane through `point`, with `normal` pointing to the inner side. The normal gets normalized.
    pub fn from_point_normal(point: &WorldPoint, normal: &WorldVector) -> Plane {
        let normal = normal.normalize();
        Plane {
            normal,
            d: -normal.dot(&point.coords),
        }
    }

    /// Plane from `(a, b, c, d)` coefficients, normalized so that the normal has unit length.
    fn from_coefficients(coefficients: Vector4<FloatType>) -> Plane {
        let normal = coefficients.xyz();
        let length = normal.norm();
        debug_assert!(length > EPSILON, "degenerate plane {coefficients:?}");
        Plane {
            normal: normal / length,
            d: coefficients.w / length,
        }
    }

    pub fn signed_distance(&self, point: &WorldPoint) -> FloatType {
        self.normal.dot(&point.coords) + self.d
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrustumPlane {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
    Near = 4,
    Far = 5,
}

/// Six inward facing planes of a camera volume.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn new(planes: [Plane; 6]) -> Frustum {
        Frustum { planes }
    }

    /// Extracts the planes from a combined view-projection matrix with OpenGL clip
    /// conventions (clip z in [-w, w]), the way nalgebra's projections produce it.
    pub fn from_view_projection(view_projection: &Matrix4<FloatType>) -> Frustum {
        let row = |i: usize| -> Vector4<FloatType> { view_projection.row(i).transpose() };
        let (x, y, z, w) = (row(0), row(1), row(2), row(3));

        Frustum {
            planes: [
                Plane::from_coefficients(w + x),
                Plane::from_coefficients(w - x),
                Plane::from_coefficients(w + y),
                Plane::from_coefficients(w - y),
                Plane::from_coefficients(w + z),
                Plane::from_coefficients(w - z),
            ],
        }
    }

    pub fn plane(&self, which: FrustumPlane) -> &Plane {
        &self.planes[which as usize]
    }

    /// Positive vertex test of a pack of boxes against all six planes.
    ///
    /// For every plane the box corner furthest along the normal is tested with
    /// `dot(normal, corner) > -d`, computed as `dot(normal, center) + dot(|normal|, half_size)`.
    /// This never rejects a box that intersects the frustum, but may accept boxes that
    /// are only close to its corners.
    /// Lanes with any infinite extent skip the plane tests and always pass.
    /// Returns a bit mask of lanes that pass.
    #[inline]
    pub fn test_boxes<T: LaneFloat>(&self, boxes: &LaneBox<T>) -> u64 {
        let infinite = boxes.infinite_bits();

        let mut inside = T::all_lanes();
        for plane in &self.planes {
            let normal: Vector3<T> = plane.normal.map(T::splat);
            let abs_normal: Vector3<T> = plane.normal.abs().map(T::splat);
            let furthest =
                lane_dot(&normal, &boxes.center.coords) + lane_dot(&abs_normal, &boxes.half_size);
            inside &= furthest.gt_bits(T::splat(-plane.d));
        }

        inside | infinite
    }

    /// Single box version of `test_boxes`.
    pub fn test_box(&self, b: &WorldBox) -> bool {
        self.test_boxes::<f32>(&LaneBox::from_box(b)) != 0
    }
}
