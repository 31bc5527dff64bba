use std::ops::RangeInclusive;

use indexmap::IndexMap;
use simba::simd::SimdValue as _;

use crate::{
    camera::CullingView,
    geometry::WorldBox,
    pipeline::bounds::WorldBounds,
    store::{BatchRef, EntityId, EntityStore},
    util::{bit_iter, simba::LaneFloat},
    visibility::RenderQueueId,
};

/// Visible entities of one render queue, in storage order.
#[derive(Clone, Debug, PartialEq)]
pub struct VisibleBucket {
    pub entities: Vec<EntityId>,
    /// Union of the world boxes of all visible entities
    pub aggregate: WorldBox,
}

/// Result of culling one store against one camera.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisibleObjects {
    buckets: IndexMap<RenderQueueId, VisibleBucket>,
}

impl VisibleObjects {
    /// Only buckets with at least one visible entity are present.
    pub fn bucket(&self, queue: RenderQueueId) -> Option<&VisibleBucket> {
        self.buckets.get(&queue)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (RenderQueueId, &VisibleBucket)> {
        self.buckets.iter().map(|(queue, bucket)| (*queue, bucket))
    }

    /// All visible entities, ordered by queue and then by storage order
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.buckets
            .values()
            .flat_map(|bucket| bucket.entities.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(|bucket| bucket.entities.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Union of all bucket aggregates, `None` if nothing is visible.
    pub fn aggregate(&self) -> Option<WorldBox> {
        self.buckets
            .values()
            .map(|bucket| bucket.aggregate)
            .reduce(|a, b| a.merge(&b))
    }
}

/// All queues, for use as the `queues` argument of [`cull_frustum`].
pub fn all_queues() -> RangeInclusive<RenderQueueId> {
    RenderQueueId(0)..=RenderQueueId::MAX
}

/// Lanes of a batch that pass the visibility flag and layer mask test.
pub(crate) fn mask_bits<T: LaneFloat, P>(
    batch: &BatchRef<'_, T, P>,
    combined_mask: u32,
    casters_only: bool,
) -> u64 {
    batch
        .visibility_flags
        .iter()
        .enumerate()
        .fold(0, |bits, (lane, flags)| {
            bits | ((flags.passes(combined_mask, casters_only) as u64) << lane)
        })
}

/// Collects entities of the given render queues that are visible from `view`.
pub fn cull_frustum<T: LaneFloat, P: Clone + Default>(
    store: &EntityStore<T, P>,
    bounds: &WorldBounds<T>,
    view: &CullingView,
    queues: RangeInclusive<RenderQueueId>,
) -> VisibleObjects {
    assert2::debug_assert!(bounds.is_current_for(store), "World bounds are stale");

    let mut buckets = IndexMap::new();
    for (queue, bucket) in store.buckets() {
        if !queues.contains(&queue) {
            continue;
        }
        let Some(bucket_bounds) = bounds.bucket(queue) else {
            continue;
        };

        let mut entities = Vec::new();
        let mut aggregate: Option<WorldBox> = None;
        for (batch, world_boxes) in bucket.batches().zip(bucket_bounds.boxes()) {
            let inside = view.frustum.test_boxes(world_boxes);
            let masked = mask_bits(&batch, view.combined_mask, view.casters_only);
            let visible = inside & masked;
            log::trace!(
                "{queue:?} batch {}: planes {inside:#b}, masks {masked:#b}",
                batch.index
            );

            for lane in bit_iter(visible) {
                debug_assert!(batch.owners[lane].is_some(), "padding lane passed the mask test");
                let Some(id) = batch.owners[lane] else {
                    continue;
                };
                let world_box = world_boxes.extract(lane).to_box();
                entities.push(id);
                aggregate = Some(match aggregate {
                    Some(aggregate) => aggregate.merge(&world_box),
                    None => world_box,
                });
            }
        }

        if let Some(aggregate) = aggregate {
            buckets.insert(queue, VisibleBucket { entities, aggregate });
        }
    }

    let visible = VisibleObjects { buckets };
    log::debug!(
        "frustum culling: {} of {} entities visible{}",
        visible.len(),
        store.len(),
        if view.casters_only { " (casters only)" } else { "" }
    );
    visible
}
