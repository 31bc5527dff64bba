use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::{
    geometry::FloatType,
    pipeline::{
        bounds::WorldBounds,
        lights::VisibleLight,
        parallel::{WorkerCount, parallel_map},
    },
    store::{BatchRef, EntityId, EntityStore, light::LightType},
    util::{Stats, bit_iter, simba::LaneFloat},
    visibility::RenderQueueId,
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LightListEntry {
    pub light: EntityId,
    pub light_type: LightType,
    /// Squared distance between the light and entity bounding sphere centers.
    /// Zero for directional lights.
    pub distance_squared: FloatType,
}

impl LightListEntry {
    fn sort_key(&self) -> (bool, OrderedFloat<FloatType>) {
        (
            !self.light_type.is_directional(),
            OrderedFloat(self.distance_squared),
        )
    }
}

/// Lights affecting a single entity. Directional lights first, then by ascending distance.
pub type LightList = Vec<LightListEntry>;

/// Light lists of all entities of a store, in storage order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightLists {
    lists: IndexMap<EntityId, LightList>,
}

impl LightLists {
    pub fn get(&self, id: EntityId) -> Option<&[LightListEntry]> {
        self.lists.get(&id).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &[LightListEntry])> {
        self.lists.iter().map(|(id, list)| (*id, list.as_slice()))
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Distribution of list lengths
    pub fn stats(&self) -> Stats {
        self.lists.values().map(Vec::len).collect()
    }
}

/// Builds the light list of every entity in `store`.
///
/// An entity is lit by a light if their bounding spheres touch and their light masks
/// share a bit. Lists are sorted with a stable sort (ties keep the order of `lights`)
/// and truncated to `max_lights` entries.
pub fn build_light_lists<T: LaneFloat, P: Clone + Default + Sync>(
    store: &EntityStore<T, P>,
    bounds: &WorldBounds<T>,
    lights: &[VisibleLight],
    max_lights: usize,
    worker_count: WorkerCount,
) -> LightLists {
    assert2::debug_assert!(bounds.is_current_for(store), "World bounds are stale");

    let work: Vec<(RenderQueueId, usize)> = store
        .buckets()
        .flat_map(|(queue, bucket)| (0..bucket.batch_count()).map(move |batch| (queue, batch)))
        .collect();

    let per_batch = parallel_map(
        &work,
        |&(queue, batch)| {
            let batch_ref = store
                .bucket(queue)
                .map(|bucket| bucket.batch(batch));
            let bucket_bounds = bounds.bucket(queue);
            match (batch_ref, bucket_bounds) {
                (Some(batch_ref), Some(bucket_bounds)) => build_batch(
                    &batch_ref,
                    &bucket_bounds.boxes()[batch].center,
                    bucket_bounds.radii()[batch],
                    lights,
                    max_lights,
                ),
                _ => Vec::new(),
            }
        },
        worker_count,
    );

    let lists: IndexMap<_, _> = per_batch.into_iter().flatten().collect();
    log::debug!(
        "light lists: {} entities, {} visible lights",
        lists.len(),
        lights.len()
    );
    LightLists { lists }
}

fn build_batch<T: LaneFloat, P>(
    batch: &BatchRef<'_, T, P>,
    centers: &nalgebra::Point3<T>,
    radii: T,
    lights: &[VisibleLight],
    max_lights: usize,
) -> Vec<(EntityId, LightList)> {
    let mut lists: Vec<LightList> = vec![Vec::new(); T::LANES];

    for light in lights {
        let (touching, distance_squared) = light.sphere.intersect_lanes(centers, radii);
        let masked = batch
            .light_masks
            .iter()
            .enumerate()
            .fold(0u64, |bits, (lane, mask)| {
                bits | (((mask & light.light_mask != 0) as u64) << lane)
            });

        for lane in bit_iter(touching & masked) {
            lists[lane].push(LightListEntry {
                light: light.id,
                light_type: light.light_type,
                distance_squared: distance_squared.extract(lane),
            });
        }
    }

    batch
        .owners
        .iter()
        .zip(lists)
        .filter_map(|(owner, mut list)| {
            let id = (*owner)?;
            list.sort_by_key(LightListEntry::sort_key);
            list.truncate(max_lights);
            Some((id, list))
        })
        .collect()
}
