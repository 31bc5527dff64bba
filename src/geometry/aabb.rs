use nalgebra::{Point3, Vector3};
use simba::simd::SimdValue;

use crate::{
    geometry::{FloatType, WorldBox, WorldPoint, WorldVector},
    util::simba::LaneFloat,
};

/// Axis aligned box stored as its two extreme corners.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }
}

impl WorldBox {
    /// Box that covers the whole space. Passes every plane test.
    pub fn infinite() -> WorldBox {
        WorldBox {
            min: WorldPoint::from(WorldVector::repeat(FloatType::NEG_INFINITY)),
            max: WorldPoint::from(WorldVector::repeat(FloatType::INFINITY)),
        }
    }

    pub fn from_center_half_size(center: WorldPoint, half_size: WorldVector) -> WorldBox {
        WorldBox {
            min: center - half_size,
            max: center + half_size,
        }
    }

    /// A box is infinite if any of its extents is.
    pub fn is_infinite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).any(|x| x.is_infinite())
    }

    pub fn center(&self) -> WorldPoint {
        WorldPoint::from((self.min.coords + self.max.coords) * 0.5)
    }

    pub fn size(&self) -> WorldVector {
        self.max - self.min
    }

    /// Smallest box containing both. Exact, because it only uses min and max.
    pub fn merge(&self, other: &WorldBox) -> WorldBox {
        WorldBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn contains(&self, other: &WorldBox) -> bool {
        (0..3).all(|i| self.min[i] <= other.min[i] && self.max[i] >= other.max[i])
    }
}

/// Pack of axis aligned boxes, one per lane, stored as center and half size.
///
/// Infinite axes are stored with a zero center and infinite half size, so that
/// converting from and to `WorldBox` never produces NaNs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LaneBox<T: LaneFloat> {
    pub center: Point3<T>,
    pub half_size: Vector3<T>,
}

impl<T: LaneFloat> LaneBox<T> {
    /// Lanes where any extent is infinite.
    #[inline(always)]
    pub fn infinite_bits(&self) -> u64 {
        self.half_size.x.infinite_bits()
            | self.half_size.y.infinite_bits()
            | self.half_size.z.infinite_bits()
    }
}

impl<T: LaneFloat> Default for LaneBox<T> {
    fn default() -> Self {
        LaneBox {
            center: Point3::new(T::splat(0.0), T::splat(0.0), T::splat(0.0)),
            half_size: Vector3::new(T::splat(0.0), T::splat(0.0), T::splat(0.0)),
        }
    }
}

impl LaneBox<f32> {
    pub fn from_box(b: &WorldBox) -> Self {
        let mut center = WorldPoint::origin();
        let mut half_size = WorldVector::zeros();
        for i in 0..3 {
            if b.min[i].is_infinite() || b.max[i].is_infinite() {
                half_size[i] = FloatType::INFINITY;
            } else {
                center[i] = (b.min[i] + b.max[i]) * 0.5;
                half_size[i] = (b.max[i] - b.min[i]) * 0.5;
            }
        }
        LaneBox { center, half_size }
    }

    pub fn to_box(&self) -> WorldBox {
        WorldBox::from_center_half_size(self.center, self.half_size)
    }
}

impl From<&WorldBox> for LaneBox<f32> {
    fn from(value: &WorldBox) -> Self {
        LaneBox::from_box(value)
    }
}

impl<T: LaneFloat> SimdValue for LaneBox<T> {
    const LANES: usize = T::LANES;

    type Element = LaneBox<f32>;

    type SimdBool = T::SimdBool;

    fn splat(val: Self::Element) -> Self {
        LaneBox {
            center: val.center.map(T::splat),
            half_size: val.half_size.map(T::splat),
        }
    }

    fn extract(&self, i: usize) -> Self::Element {
        LaneBox {
            center: self.center.map(|x| x.extract(i)),
            half_size: self.half_size.map(|x| x.extract(i)),
        }
    }

    unsafe fn extract_unchecked(&self, i: usize) -> Self::Element {
        unsafe {
            LaneBox {
                center: self.center.map(|x| x.extract_unchecked(i)),
                half_size: self.half_size.map(|x| x.extract_unchecked(i)),
            }
        }
    }

    fn replace(&mut self, i: usize, val: Self::Element) {
        self.center
            .coords
            .zip_apply(&val.center.coords, |x, y| x.replace(i, y));
        self.half_size.zip_apply(&val.half_size, |x, y| x.replace(i, y));
    }

    unsafe fn replace_unchecked(&mut self, i: usize, val: Self::Element) {
        unsafe {
            self.center
                .coords
                .zip_apply(&val.center.coords, |x, y| x.replace_unchecked(i, y));
            self.half_size
                .zip_apply(&val.half_size, |x, y| x.replace_unchecked(i, y));
        }
    }

    fn select(self, cond: Self::SimdBool, other: Self) -> Self {
        LaneBox {
            center: self
                .center
                .coords
                .zip_map(&other.center.coords, |x, y| x.select(cond, y))
                .into(),
            half_size: self
                .half_size
                .zip_map(&other.half_size, |x, y| x.select(cond, y)),
        }
    }
}
