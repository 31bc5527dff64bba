use nalgebra::{Unit, UnitQuaternion};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rand_distr::{Distribution as _, Normal, UnitSphere};

use crate::{
    geometry::{FloatType, Transform, WorldBox, WorldPoint, WorldVector},
    scene::Scene,
    store::{EntityDesc, EntityId, light::LightDesc},
    util::simba::LaneFloat,
    visibility::{RenderQueueId, VisibilityFlags},
};

/// Parameters of a generated test scene.
#[derive(Copy, Clone, Debug)]
pub struct RandomSceneSettings {
    pub entity_count: usize,
    pub point_light_count: usize,
    pub directional_light_count: usize,
    /// Entities and lights are placed in a cube of this half size around the origin
    pub extent: FloatType,
    pub queue_count: u8,
    /// Chance of an entity having infinite bounds
    pub unbounded_probability: f64,
    pub seed: u64,
}

impl Default for RandomSceneSettings {
    fn default() -> Self {
        RandomSceneSettings {
            entity_count: 10_000,
            point_light_count: 100,
            directional_light_count: 1,
            extent: 500.0,
            queue_count: 4,
            unbounded_probability: 0.001,
            seed: 0,
        }
    }
}

/// Generates a scene with randomly placed boxes and lights.
/// The same settings always give the same scene.
pub fn random_scene<T: LaneFloat>(settings: &RandomSceneSettings) -> Scene<T> {
    let mut rng = SmallRng::seed_from_u64(settings.seed);
    let mut scene = Scene::new();

    for _ in 0..settings.entity_count {
        let queue = RenderQueueId(rng.random_range(0..settings.queue_count.max(1)));
        let desc = random_entity(&mut rng, settings);
        scene.add_entity(queue, desc);
    }

    let range_distribution = Normal::new(20.0f32, 8.0).unwrap_or_else(|_| unreachable!());
    for i in 0..settings.point_light_count {
        let range = range_distribution.sample(&mut rng).abs().max(1.0);
        let desc = if i % 4 == 3 {
            LightDesc::spotlight(range)
        } else {
            LightDesc::point(range)
        };
        let transform = random_transform(&mut rng, settings.extent, 1.0..=1.0);
        scene.add_light(desc.with_light_mask(random_mask(&mut rng)), transform);
    }

    for _ in 0..settings.directional_light_count {
        let transform = Transform::new(
            WorldVector::zeros(),
            random_rotation(&mut rng),
            WorldVector::repeat(1.0),
        );
        scene.add_light(LightDesc::directional(), transform);
    }

    scene
}

/// Moves every entity by a small random offset, standing in for an animation step.
pub fn jitter<T: LaneFloat>(scene: &mut Scene<T>, rng: &mut impl Rng, amount: FloatType) {
    let ids: Vec<EntityId> = scene
        .entities
        .buckets()
        .flat_map(|(_, bucket)| bucket.entities())
        .collect();
    for id in ids {
        let Ok(current) = scene.entities.transform(id) else {
            continue;
        };
        let offset = WorldVector::new(
            rng.random_range(-amount..=amount),
            rng.random_range(-amount..=amount),
            rng.random_range(-amount..=amount),
        );
        let moved = Transform::from_matrix(
            current.matrix().append_translation(&offset),
            *current.scale(),
        );
        if let Err(e) = scene.entities.set_transform(id, moved) {
            log::warn!("failed to move {id:?}: {e}");
        }
    }
}

fn random_entity(rng: &mut impl Rng, settings: &RandomSceneSettings) -> EntityDesc {
    let local_box = if rng.random_bool(settings.unbounded_probability) {
        WorldBox::infinite()
    } else {
        let half_size = WorldVector::new(
            rng.random_range(0.25..4.0),
            rng.random_range(0.25..4.0),
            rng.random_range(0.25..4.0),
        );
        WorldBox::from_center_half_size(WorldPoint::origin(), half_size)
    };

    let mut flags = VisibilityFlags::visible_in(1 << rng.random_range(0..4u32));
    if rng.random_bool(0.5) {
        flags |= VisibilityFlags::SHADOW_CASTER;
    }

    EntityDesc::builder()
        .local_box(local_box)
        .visibility_flags(flags)
        .light_mask(random_mask(rng))
        .transform(random_transform(rng, settings.extent, 0.5..=2.0))
        .payload(())
        .build()
}

fn random_mask(rng: &mut impl Rng) -> u32 {
    // Mostly lit by everything, sometimes only by a subset
    if rng.random_bool(0.8) {
        u32::MAX
    } else {
        rng.random_range(1..16)
    }
}

fn random_rotation(rng: &mut impl Rng) -> UnitQuaternion<FloatType> {
    let [x, y, z]: [FloatType; 3] = UnitSphere.sample(rng);
    let axis = Unit::new_normalize(WorldVector::new(x, y, z));
    UnitQuaternion::from_axis_angle(&axis, rng.random_range(0.0..std::f32::consts::TAU))
}

fn random_transform(
    rng: &mut impl Rng,
    extent: FloatType,
    scale: std::ops::RangeInclusive<FloatType>,
) -> Transform {
    let position = WorldVector::new(
        rng.random_range(-extent..=extent),
        rng.random_range(-extent..=extent),
        rng.random_range(-extent..=extent),
    );
    let scale = WorldVector::new(
        rng.random_range(scale.clone()),
        rng.random_range(scale.clone()),
        rng.random_range(scale),
    );
    Transform::new(position, random_rotation(rng), scale)
}
