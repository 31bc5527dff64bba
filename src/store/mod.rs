//! Packed, batch oriented storage of everything the culling passes read.
//!
//! Entities live in render queue buckets. Every bucket keeps parallel arrays whose
//! length is a multiple of the lane width: per-slot arrays (owner, flags, masks,
//! transform, payload) and per-batch lane packs (local bounds). Slots past the
//! last live entity are padding with no owner and empty masks, so that every
//! predicate rejects them without an explicit check.

pub mod light;

use std::sync::atomic::{AtomicU64, Ordering};

use bon::bon;
use index_vec::IndexVec;
use simba::simd::SimdValue as _;
use thiserror::Error;

use crate::{
    geometry::{FloatType, LaneBox, Transform, WorldBox},
    util::simba::LaneFloat,
    visibility::{RenderQueueId, VisibilityFlags},
};

index_vec::define_index_type! {
    /// Stable identity of an entity within its store.
    pub struct EntityId = u32;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Entity {0:?} does not exist or was removed")]
    UnknownEntity(EntityId),
}

/// Where an entity currently lives. Changes when another entity is removed from the same bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlotLocation {
    pub queue: RenderQueueId,
    pub slot: usize,
}

impl SlotLocation {
    pub fn batch<T: LaneFloat>(&self) -> usize {
        self.slot / T::LANES
    }

    pub fn lane<T: LaneFloat>(&self) -> usize {
        self.slot % T::LANES
    }
}

/// Identifies a store and the state it was in, used to detect stale derived data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StoreStamp {
    pub store: u64,
    pub generation: u64,
}

/// Everything needed to add an entity to a store.
#[derive(Clone, Debug)]
pub struct EntityDesc<P = ()> {
    pub local_box: WorldBox,
    pub local_radius: FloatType,
    pub visibility_flags: VisibilityFlags,
    pub light_mask: u32,
    pub transform: Transform,
    pub payload: P,
}

#[bon]
impl<P> EntityDesc<P> {
    #[builder]
    pub fn new(
        local_box: WorldBox,
        // Defaults to the distance from the box center to its corner
        local_radius: Option<FloatType>,
        #[builder(default = VisibilityFlags::all_layers())] visibility_flags: VisibilityFlags,
        #[builder(default = u32::MAX)] light_mask: u32,
        #[builder(default)] transform: Transform,
        payload: P,
    ) -> Self {
        let local_radius = local_radius.unwrap_or_else(|| {
            if local_box.is_infinite() {
                FloatType::INFINITY
            } else {
                (local_box.size() * 0.5).norm()
            }
        });
        EntityDesc {
            local_box,
            local_radius,
            visibility_flags,
            light_mask,
            transform,
            payload,
        }
    }
}

/// Storage of one render queue.
#[derive(Clone, Debug)]
pub struct Bucket<T: LaneFloat, P> {
    len: usize,

    owners: Vec<Option<EntityId>>,
    visibility_flags: Vec<VisibilityFlags>,
    light_masks: Vec<u32>,
    transforms: Vec<Transform>,
    payloads: Vec<P>,

    local_boxes: Vec<LaneBox<T>>,
    local_radii: Vec<T>,
}

/// Read only view of one batch of `T::LANES` slots.
#[derive(Copy, Clone, Debug)]
pub struct BatchRef<'a, T: LaneFloat, P> {
    pub index: usize,
    pub owners: &'a [Option<EntityId>],
    pub visibility_flags: &'a [VisibilityFlags],
    pub light_masks: &'a [u32],
    pub transforms: &'a [Transform],
    pub payloads: &'a [P],
    pub local_box: &'a LaneBox<T>,
    pub local_radius: T,
}

impl<T: LaneFloat, P: Clone + Default> Bucket<T, P> {
    fn new() -> Self {
        Bucket {
            len: 0,
            owners: Vec::new(),
            visibility_flags: Vec::new(),
            light_masks: Vec::new(),
            transforms: Vec::new(),
            payloads: Vec::new(),
            local_boxes: Vec::new(),
            local_radii: Vec::new(),
        }
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn batch_count(&self) -> usize {
        self.local_boxes.len()
    }

    pub fn batch(&self, index: usize) -> BatchRef<'_, T, P> {
        let slots = index * T::LANES..(index + 1) * T::LANES;
        BatchRef {
            index,
            owners: &self.owners[slots.clone()],
            visibility_flags: &self.visibility_flags[slots.clone()],
            light_masks: &self.light_masks[slots.clone()],
            transforms: &self.transforms[slots.clone()],
            payloads: &self.payloads[slots],
            local_box: &self.local_boxes[index],
            local_radius: self.local_radii[index],
        }
    }

    pub fn batches(&self) -> impl Iterator<Item = BatchRef<'_, T, P>> {
        (0..self.batch_count()).map(|i| self.batch(i))
    }

    /// Live entities in storage order
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.owners[..self.len].iter().flatten().copied()
    }

    fn push_padding_batch(&mut self) {
        let lanes = T::LANES;
        self.owners.extend(std::iter::repeat_n(None, lanes));
        self.visibility_flags
            .extend(std::iter::repeat_n(VisibilityFlags::empty(), lanes));
        self.light_masks.extend(std::iter::repeat_n(0, lanes));
        self.transforms
            .extend(std::iter::repeat_n(Transform::identity(), lanes));
        self.payloads.extend(std::iter::repeat_n(P::default(), lanes));
        self.local_boxes.push(LaneBox::default());
        self.local_radii.push(T::splat(0.0));
    }

    fn pop_padding_batch(&mut self) {
        let new_len = self.owners.len() - T::LANES;
        debug_assert!(self.owners[new_len..].iter().all(Option::is_none));
        self.owners.truncate(new_len);
        self.visibility_flags.truncate(new_len);
        self.light_masks.truncate(new_len);
        self.transforms.truncate(new_len);
        self.payloads.truncate(new_len);
        self.local_boxes.pop();
        self.local_radii.pop();
    }

    fn write_slot(&mut self, slot: usize, id: EntityId, desc: EntityDesc<P>) {
        self.owners[slot] = Some(id);
        self.visibility_flags[slot] = desc.visibility_flags;
        self.light_masks[slot] = desc.light_mask;
        self.transforms[slot] = desc.transform;
        self.payloads[slot] = desc.payload;
        self.set_local_bounds(slot, &desc.local_box, desc.local_radius);
    }

    fn set_local_bounds(&mut self, slot: usize, local_box: &WorldBox, local_radius: FloatType) {
        let (batch, lane) = (slot / T::LANES, slot % T::LANES);
        self.local_boxes[batch].replace(lane, LaneBox::from_box(local_box));
        self.local_radii[batch].replace(lane, local_radius);
    }

    /// Moves slot `from` into slot `to`, leaving `from` as padding.
    fn move_slot(&mut self, from: usize, to: usize) {
        self.owners[to] = self.owners[from];
        self.visibility_flags[to] = self.visibility_flags[from];
        self.light_masks[to] = self.light_masks[from];
        self.transforms[to] = self.transforms[from];
        self.payloads.swap(to, from);

        let (from_batch, from_lane) = (from / T::LANES, from % T::LANES);
        let (to_batch, to_lane) = (to / T::LANES, to % T::LANES);
        let local_box = self.local_boxes[from_batch].extract(from_lane);
        let local_radius = self.local_radii[from_batch].extract(from_lane);
        self.local_boxes[to_batch].replace(to_lane, local_box);
        self.local_radii[to_batch].replace(to_lane, local_radius);

        self.clear_slot(from);
    }

    fn clear_slot(&mut self, slot: usize) {
        let (batch, lane) = (slot / T::LANES, slot % T::LANES);
        self.owners[slot] = None;
        self.visibility_flags[slot] = VisibilityFlags::empty();
        self.light_masks[slot] = 0;
        self.transforms[slot] = Transform::identity();
        self.payloads[slot] = P::default();
        self.local_boxes[batch].replace(lane, LaneBox::default());
        self.local_radii[batch].replace(lane, 0.0);
    }
}

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(0);

/// Memory manager for entities of one kind (renderables or lights).
///
/// `T` is the lane type that decides the batch width, `P` is extra per entity data
/// that travels with the entity when it is moved between slots.
#[derive(Debug)]
pub struct EntityStore<T: LaneFloat, P = ()> {
    id: u64,
    generation: u64,
    buckets: Vec<Bucket<T, P>>,
    locations: IndexVec<EntityId, Option<SlotLocation>>,
}

impl<T: LaneFloat, P: Clone + Default> EntityStore<T, P> {
    pub fn new() -> Self {
        EntityStore {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            buckets: Vec::new(),
            locations: IndexVec::new(),
        }
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stamp(&self) -> StoreStamp {
        StoreStamp {
            store: self.id,
            generation: self.generation,
        }
    }

    pub fn bucket(&self, queue: RenderQueueId) -> Option<&Bucket<T, P>> {
        self.buckets.get(queue.index())
    }

    /// Non-empty buckets in queue order
    pub fn buckets(&self) -> impl Iterator<Item = (RenderQueueId, &Bucket<T, P>)> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| bucket.batch_count() > 0)
            .map(|(i, bucket)| (RenderQueueId(i as u8), bucket))
    }

    /// Number of bucket slots, including empty ones, that derived data has to cover.
    pub fn bucket_slots(&self) -> usize {
        self.buckets.len()
    }

    pub fn location(&self, id: EntityId) -> Result<SlotLocation, StoreError> {
        self.locations
            .get(id)
            .copied()
            .flatten()
            .ok_or(StoreError::UnknownEntity(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.location(id).is_ok()
    }

    pub fn insert(&mut self, queue: RenderQueueId, desc: EntityDesc<P>) -> EntityId {
        if self.buckets.len() <= queue.index() {
            self.buckets.resize_with(queue.index() + 1, Bucket::new);
        }
        let bucket = &mut self.buckets[queue.index()];
        if bucket.len == bucket.owners.len() {
            bucket.push_padding_batch();
        }

        let slot = bucket.len;
        let id = self.locations.push(Some(SlotLocation { queue, slot }));
        bucket.write_slot(slot, id, desc);
        bucket.len += 1;

        self.generation += 1;
        log::trace!("inserted {id:?} into {queue:?} slot {slot}");
        id
    }

    /// Removes an entity, moving the last entity of the bucket into its slot.
    pub fn remove(&mut self, id: EntityId) -> Result<(), StoreError> {
        let location = self.location(id)?;
        let bucket = &mut self.buckets[location.queue.index()];

        let last = bucket.len - 1;
        if last != location.slot {
            let moved = bucket.owners[last];
            bucket.move_slot(last, location.slot);
            if let Some(moved) = moved {
                self.locations[moved] = Some(location);
            }
        } else {
            bucket.clear_slot(last);
        }
        bucket.len -= 1;
        if bucket.owners.len() - bucket.len >= T::LANES {
            bucket.pop_padding_batch();
        }

        self.locations[id] = None;
        self.generation += 1;
        Ok(())
    }

    fn slot_mut(&mut self, id: EntityId) -> Result<(&mut Bucket<T, P>, usize), StoreError> {
        let location = self.location(id)?;
        self.generation += 1;
        Ok((&mut self.buckets[location.queue.index()], location.slot))
    }

    /// Called by the node hierarchy when the world transform changed.
    /// Invalidates previously computed world bounds.
    pub fn set_transform(&mut self, id: EntityId, transform: Transform) -> Result<(), StoreError> {
        let (bucket, slot) = self.slot_mut(id)?;
        bucket.transforms[slot] = transform;
        Ok(())
    }

    pub fn set_visibility_flags(
        &mut self,
        id: EntityId,
        flags: VisibilityFlags,
    ) -> Result<(), StoreError> {
        let (bucket, slot) = self.slot_mut(id)?;
        bucket.visibility_flags[slot] = flags;
        Ok(())
    }

    pub fn set_light_mask(&mut self, id: EntityId, mask: u32) -> Result<(), StoreError> {
        let (bucket, slot) = self.slot_mut(id)?;
        bucket.light_masks[slot] = mask;
        Ok(())
    }

    pub fn set_local_bounds(
        &mut self,
        id: EntityId,
        local_box: &WorldBox,
        local_radius: FloatType,
    ) -> Result<(), StoreError> {
        let (bucket, slot) = self.slot_mut(id)?;
        bucket.set_local_bounds(slot, local_box, local_radius);
        Ok(())
    }

    pub fn transform(&self, id: EntityId) -> Result<&Transform, StoreError> {
        let location = self.location(id)?;
        Ok(&self.buckets[location.queue.index()].transforms[location.slot])
    }

    pub fn payload(&self, id: EntityId) -> Result<&P, StoreError> {
        let location = self.location(id)?;
        Ok(&self.buckets[location.queue.index()].payloads[location.slot])
    }
}

impl<T: LaneFloat, P: Clone + Default> Default for EntityStore<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{SimdFloatType, WorldPoint, WorldVector};
    use assert2::{assert, let_assert};

    fn cube_at(x: f32) -> EntityDesc {
        EntityDesc::builder()
            .local_box(WorldBox::new(
                WorldPoint::new(x - 1.0, -1.0, -1.0),
                WorldPoint::new(x + 1.0, 1.0, 1.0),
            ))
            .payload(())
            .build()
    }

    fn store_with(count: usize) -> (EntityStore<SimdFloatType>, Vec<EntityId>) {
        let mut store = EntityStore::new();
        let ids = (0..count)
            .map(|i| store.insert(RenderQueueId(3), cube_at(i as f32)))
            .collect();
        (store, ids)
    }

    fn assert_packed<T: LaneFloat, P: Clone + Default>(bucket: &Bucket<T, P>) {
        for (slot, owner) in bucket.owners.iter().enumerate() {
            assert!(owner.is_some() == (slot < bucket.len()));
            if owner.is_none() {
                assert!(bucket.visibility_flags[slot] == VisibilityFlags::empty());
                assert!(bucket.light_masks[slot] == 0);
            }
        }
        assert!(bucket.owners.len() == bucket.batch_count() * T::LANES);
        assert!(bucket.owners.len() - bucket.len() < T::LANES);
    }

    #[test]
    fn insert_pads_to_lane_width() {
        let (store, ids) = store_with(10);
        let_assert!(Some(bucket) = store.bucket(RenderQueueId(3)));
        assert!(bucket.len() == 10);
        assert!(bucket.batch_count() == 2);
        assert!(store.len() == 10);
        assert!(store.bucket(RenderQueueId(0)).is_some_and(|b| b.is_empty()));
        assert!(store.buckets().count() == 1);
        assert!(bucket.entities().collect::<Vec<_>>() == ids);
        assert_packed(bucket);
    }

    #[test]
    fn default_radius_reaches_corner() {
        let desc = cube_at(0.0);
        assert!((desc.local_radius - 3.0f32.sqrt()).abs() < 1e-6);
        assert!(desc.visibility_flags == VisibilityFlags::all_layers());
    }

    #[test]
    fn remove_swaps_last_into_hole() {
        let (mut store, ids) = store_with(10);
        store.remove(ids[2]).unwrap();

        let_assert!(Some(bucket) = store.bucket(RenderQueueId(3)));
        let order: Vec<_> = bucket.entities().collect();
        assert!(order == vec![ids[0], ids[1], ids[9], ids[3], ids[4], ids[5], ids[6], ids[7], ids[8]]);
        assert!(store.location(ids[9]) == Ok(SlotLocation { queue: RenderQueueId(3), slot: 2 }));
        assert!(store.location(ids[2]) == Err(StoreError::UnknownEntity(ids[2])));
        assert!(bucket.batch_count() == 2);

        // Moved entity keeps its bounds
        let moved_box = bucket.batch(0).local_box.extract(2).to_box();
        assert!(moved_box.center() == WorldPoint::new(9.0, 0.0, 0.0));
        assert_packed(bucket);
    }

    #[test]
    fn remove_drops_empty_batch() {
        let (mut store, ids) = store_with(9);
        store.remove(ids[8]).unwrap();
        let_assert!(Some(bucket) = store.bucket(RenderQueueId(3)));
        assert!(bucket.batch_count() == 1);
        assert_packed(bucket);

        for id in &ids[..8] {
            store.remove(*id).unwrap();
        }
        assert!(store.is_empty());
        assert!(store.buckets().count() == 0);
    }

    #[test]
    fn mutations_bump_generation() {
        let (mut store, ids) = store_with(3);
        let before = store.stamp();
        store
            .set_transform(ids[1], Transform::from_translation(WorldVector::x()))
            .unwrap();
        assert!(store.stamp() != before);
        assert!(store.stamp().store == before.store);
        assert!(store.transform(ids[1]).unwrap().position() == WorldPoint::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn unknown_entity_errors() {
        let (mut store, ids) = store_with(1);
        store.remove(ids[0]).unwrap();
        assert!(store.remove(ids[0]) == Err(StoreError::UnknownEntity(ids[0])));
        assert!(store.set_light_mask(ids[0], 1).is_err());
        assert!(store.generation == 2);
    }

    #[test]
    fn scalar_store_has_no_padding() {
        let mut store = EntityStore::<f32>::new();
        for i in 0..3 {
            store.insert(RenderQueueId(0), cube_at(i as f32));
        }
        let_assert!(Some(bucket) = store.bucket(RenderQueueId(0)));
        assert!(bucket.batch_count() == 3);
        assert_packed(bucket);
    }
}
