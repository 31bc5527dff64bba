use nalgebra::Point3;
use simba::simd::SimdValue as _;

use crate::{
    geometry::{FloatType, LaneAffine, LaneBox, WorldBox},
    store::{BatchRef, EntityStore, SlotLocation, StoreStamp},
    util::simba::LaneFloat,
    visibility::RenderQueueId,
};

/// World space bounds of one bucket, laid out like the bucket's batches.
#[derive(Clone, Debug, Default)]
pub struct BucketBounds<T: LaneFloat> {
    boxes: Vec<LaneBox<T>>,
    radii: Vec<T>,
}

impl<T: LaneFloat> BucketBounds<T> {
    pub fn boxes(&self) -> &[LaneBox<T>] {
        &self.boxes
    }

    pub fn radii(&self) -> &[T] {
        &self.radii
    }

    pub fn centers(&self, batch: usize) -> &Point3<T> {
        &self.boxes[batch].center
    }
}

/// World bounds of every entity in a store.
///
/// Only produced by [`update_bounds`], and only valid for the exact store state it was
/// computed from.
#[derive(Clone, Debug)]
pub struct WorldBounds<T: LaneFloat> {
    stamp: StoreStamp,
    buckets: Vec<BucketBounds<T>>,
}

impl<T: LaneFloat> WorldBounds<T> {
    pub fn stamp(&self) -> StoreStamp {
        self.stamp
    }

    /// True if nothing in the store changed since these bounds were computed.
    pub fn is_current_for<P: Clone + Default>(&self, store: &EntityStore<T, P>) -> bool {
        self.stamp == store.stamp()
    }

    pub fn bucket(&self, queue: RenderQueueId) -> Option<&BucketBounds<T>> {
        self.buckets.get(queue.index())
    }

    pub fn world_box(&self, location: SlotLocation) -> WorldBox {
        self.buckets[location.queue.index()].boxes[location.batch::<T>()]
            .extract(location.lane::<T>())
            .to_box()
    }

    pub fn world_radius(&self, location: SlotLocation) -> FloatType {
        self.buckets[location.queue.index()].radii[location.batch::<T>()]
            .extract(location.lane::<T>())
    }
}

/// Recomputes world boxes and radii of all entities from their transforms and local bounds.
pub fn update_bounds<T: LaneFloat, P: Clone + Default>(store: &EntityStore<T, P>) -> WorldBounds<T> {
    let buckets = (0..store.bucket_slots())
        .map(|i| match store.bucket(RenderQueueId(i as u8)) {
            Some(bucket) => {
                let (boxes, radii) = bucket.batches().map(update_batch).unzip();
                BucketBounds { boxes, radii }
            }
            None => BucketBounds::default(),
        })
        .collect();

    log::trace!("updated bounds of {} entities", store.len());

    WorldBounds {
        stamp: store.stamp(),
        buckets,
    }
}

fn update_batch<T: LaneFloat, P>(batch: BatchRef<'_, T, P>) -> (LaneBox<T>, T) {
    let affine = LaneAffine::<T>::gather(batch.transforms);
    let world_box = affine.transform_box(batch.local_box);

    let max_scale = T::from_lanes(|lane| batch.transforms[lane].max_scale());
    let infinite = batch.local_radius.infinite_bits();
    let world_radius = T::select_bits(
        infinite,
        T::splat(FloatType::INFINITY),
        batch.local_radius * max_scale,
    );

    (world_box, world_radius)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{SimdFloatType, Transform, WorldPoint, WorldVector, test::WorldBoxWrapper},
        store::EntityDesc,
    };
    use assert2::assert;
    use nalgebra::UnitQuaternion;
    use proptest::{arbitrary::any, prop_assert};
    use test_strategy::proptest;

    fn unit_cube() -> WorldBox {
        WorldBox::new(WorldPoint::new(-1.0, -1.0, -1.0), WorldPoint::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn radius_scales_with_largest_axis() {
        let mut store = EntityStore::<SimdFloatType>::new();
        let id = store.insert(
            RenderQueueId(0),
            EntityDesc::builder()
                .local_box(unit_cube())
                .local_radius(2.0)
                .transform(Transform::new(
                    WorldVector::new(10.0, 0.0, 0.0),
                    UnitQuaternion::identity(),
                    WorldVector::new(1.0, 3.0, 2.0),
                ))
                .payload(())
                .build(),
        );
        let bounds = update_bounds(&store);
        let location = store.location(id).unwrap();

        assert!(bounds.world_radius(location) == 6.0);
        assert!(
            bounds.world_box(location)
                == WorldBox::new(WorldPoint::new(9.0, -3.0, -2.0), WorldPoint::new(11.0, 3.0, 2.0))
        );
        assert!(bounds.is_current_for(&store));
    }

    #[test]
    fn infinite_radius_survives_zero_scale() {
        let mut store = EntityStore::<f32>::new();
        let id = store.insert(
            RenderQueueId(0),
            EntityDesc::builder()
                .local_box(WorldBox::infinite())
                .transform(Transform::new(
                    WorldVector::zeros(),
                    UnitQuaternion::identity(),
                    WorldVector::zeros(),
                ))
                .payload(())
                .build(),
        );
        let bounds = update_bounds(&store);
        let location = store.location(id).unwrap();
        assert!(bounds.world_radius(location) == f32::INFINITY);
        assert!(bounds.world_box(location) == WorldBox::infinite());
    }

    #[test]
    fn mutation_makes_bounds_stale() {
        let mut store = EntityStore::<SimdFloatType>::new();
        let id = store.insert(
            RenderQueueId(2),
            EntityDesc::builder().local_box(unit_cube()).payload(()).build(),
        );
        let bounds = update_bounds(&store);
        store
            .set_transform(id, Transform::from_translation(WorldVector::x()))
            .unwrap();
        assert!(!bounds.is_current_for(&store));
        assert!(bounds.bucket(RenderQueueId(0)).is_some_and(|b| b.boxes().is_empty()));
        assert!(bounds.bucket(RenderQueueId(2)).is_some_and(|b| b.boxes().len() == 1));
    }

    #[proptest]
    fn lane_widths_agree(
        #[strategy(proptest::collection::vec(any::<WorldBoxWrapper>(), 1..20))] boxes: Vec<
            WorldBoxWrapper,
        >,
    ) {
        let mut scalar = EntityStore::<f32>::new();
        let mut wide = EntityStore::<SimdFloatType>::new();
        let rotation = UnitQuaternion::from_euler_angles(0.3, -0.7, 1.1);
        for (i, b) in boxes.iter().enumerate() {
            let transform = Transform::new(
                WorldVector::new(i as f32, 0.0, -1.0),
                rotation,
                WorldVector::new(1.0, 0.5, 2.0),
            );
            let desc = EntityDesc::builder()
                .local_box(**b)
                .transform(transform)
                .payload(())
                .build();
            let scalar_id = scalar.insert(RenderQueueId(1), desc.clone());
            let wide_id = wide.insert(RenderQueueId(1), desc);
            prop_assert!(scalar_id == wide_id);
        }
        let scalar_bounds = update_bounds(&scalar);
        let wide_bounds = update_bounds(&wide);
        for id in scalar.bucket(RenderQueueId(1)).unwrap().entities() {
            let s = scalar_bounds.world_box(scalar.location(id).unwrap());
            let w = wide_bounds.world_box(wide.location(id).unwrap());
            prop_assert!(s == w);
            prop_assert!(
                scalar_bounds.world_radius(scalar.location(id).unwrap())
                    == wide_bounds.world_radius(wide.location(id).unwrap())
            );
        }
    }
}
