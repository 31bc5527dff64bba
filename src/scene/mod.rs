pub mod random;

use crate::{
    geometry::Transform,
    store::{
        EntityDesc, EntityId, EntityStore, StoreError,
        light::{LightDesc, LightType},
    },
    util::simba::LaneFloat,
    visibility::RenderQueueId,
};

/// Render queue all lights are stored in
pub const LIGHT_QUEUE: RenderQueueId = RenderQueueId(0);

/// Renderable entities and lights, each in its own store.
#[derive(Debug, Default)]
pub struct Scene<T: LaneFloat> {
    pub entities: EntityStore<T>,
    pub lights: EntityStore<T, LightType>,
}

impl<T: LaneFloat> Scene<T> {
    pub fn new() -> Self {
        Scene {
            entities: EntityStore::new(),
            lights: EntityStore::new(),
        }
    }

    pub fn add_entity(&mut self, queue: RenderQueueId, desc: EntityDesc) -> EntityId {
        self.entities.insert(queue, desc)
    }

    pub fn add_light(&mut self, desc: LightDesc, transform: Transform) -> EntityId {
        self.lights.insert(LIGHT_QUEUE, desc.entity_desc(transform))
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), StoreError> {
        self.entities.remove(id)
    }

    pub fn remove_light(&mut self, id: EntityId) -> Result<(), StoreError> {
        self.lights.remove(id)
    }

    pub fn print_statistics(&self) {
        log::info!(
            "scene: {} entities in {} queues, {} lights",
            self.entities.len(),
            self.entities.buckets().count(),
            self.lights.len()
        );
    }
}
