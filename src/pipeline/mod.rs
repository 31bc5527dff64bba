//! Per frame culling passes.
//!
//! Stages always run in the same order: bounds update, frustum culling per camera,
//! light culling against all cameras at once, light list building.
//! Each stage only reads the stores and returns fresh data for this frame.

pub mod bounds;
pub mod frustum;
pub mod light_list;
pub mod lights;
pub mod parallel;

use std::fmt::Display;

use crate::{
    camera::{Camera, CullingView},
    scene::Scene,
    util::{Stats, simba::LaneFloat},
};

use bounds::{WorldBounds, update_bounds};
use frustum::{VisibleObjects, all_queues, cull_frustum};
use light_list::{LightLists, build_light_lists};
use lights::{VisibleLight, cull_lights};
use parallel::WorkerCount;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CullingSettings {
    /// Light lists are truncated to this many entries
    pub max_lights_per_entity: usize,
    pub worker_count: WorkerCount,
}

impl Default for CullingSettings {
    fn default() -> Self {
        CullingSettings {
            max_lights_per_entity: 8,
            worker_count: WorkerCount::Auto,
        }
    }
}

/// Cameras rendered in one frame.
#[derive(Clone, Debug)]
pub struct FrameCameras {
    pub main: Camera,
    /// Only see shadow casters
    pub shadow: Vec<Camera>,
    pub scene_mask: u32,
}

impl FrameCameras {
    pub fn new(main: Camera) -> FrameCameras {
        FrameCameras {
            main,
            shadow: Vec::new(),
            scene_mask: u32::MAX,
        }
    }

    /// Culling views of all cameras, main camera first.
    pub fn views(&self) -> Vec<CullingView> {
        std::iter::once((&self.main, false))
            .chain(self.shadow.iter().map(|camera| (camera, true)))
            .map(|(camera, is_shadow)| {
                let mut view = camera.culling_view(self.scene_mask);
                view.casters_only |= is_shadow;
                view
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub entities: usize,
    pub lights: usize,
    pub visible_entities: usize,
    /// Summed over all shadow cameras
    pub visible_shadow_casters: usize,
    pub visible_lights: usize,
    pub lights_per_entity: Stats,
}

impl Display for FrameStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "visible entities: {} / {}",
            self.visible_entities, self.entities
        )?;
        writeln!(f, "visible shadow casters: {}", self.visible_shadow_casters)?;
        writeln!(f, "visible lights: {} / {}", self.visible_lights, self.lights)?;
        write!(f, "lights per entity: {}", self.lights_per_entity)
    }
}

/// Everything computed for a single frame.
#[derive(Clone, Debug)]
pub struct FrameContext<T: LaneFloat> {
    pub entity_bounds: WorldBounds<T>,
    pub light_bounds: WorldBounds<T>,
    pub main_view: VisibleObjects,
    /// One per shadow camera, in the same order
    pub shadow_views: Vec<VisibleObjects>,
    pub visible_lights: Vec<VisibleLight>,
    pub light_lists: LightLists,
    pub stats: FrameStats,
}

/// Runs all culling stages for one frame.
pub fn run_frame<T: LaneFloat>(
    scene: &Scene<T>,
    cameras: &FrameCameras,
    settings: &CullingSettings,
) -> FrameContext<T> {
    let entity_bounds = update_bounds(&scene.entities);
    let light_bounds = update_bounds(&scene.lights);

    let views = cameras.views();
    let (main, shadow) = views
        .split_first()
        .unwrap_or_else(|| unreachable!("The main camera is always present"));

    let main_view = cull_frustum(&scene.entities, &entity_bounds, main, all_queues());
    let shadow_views: Vec<_> = shadow
        .iter()
        .map(|view| cull_frustum(&scene.entities, &entity_bounds, view, all_queues()))
        .collect();

    let visible_lights = cull_lights(&scene.lights, &light_bounds, &views);

    let light_lists = build_light_lists(
        &scene.entities,
        &entity_bounds,
        &visible_lights,
        settings.max_lights_per_entity,
        settings.worker_count,
    );

    let stats = FrameStats {
        entities: scene.entities.len(),
        lights: scene.lights.len(),
        visible_entities: main_view.len(),
        visible_shadow_casters: shadow_views.iter().map(VisibleObjects::len).sum(),
        visible_lights: visible_lights.len(),
        lights_per_entity: light_lists.stats(),
    };
    log::debug!(
        "frame done: {} visible, {} lights",
        stats.visible_entities,
        stats.visible_lights
    );

    FrameContext {
        entity_bounds,
        light_bounds,
        main_view,
        shadow_views,
        visible_lights,
        light_lists,
        stats,
    }
}
