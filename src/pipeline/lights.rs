use crate::{
    camera::CullingView,
    geometry::{Sphere, WorldPoint, WorldVector},
    pipeline::{bounds::WorldBounds, frustum::mask_bits},
    store::{EntityId, EntityStore, light::LightType},
    util::{bit_iter, simba::LaneFloat},
};

/// Light that survived culling against the frame's cameras.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VisibleLight {
    pub id: EntityId,
    pub light_type: LightType,
    /// Infinite for directional lights
    pub sphere: Sphere,
    /// Compared against the light masks of lit entities
    pub light_mask: u32,
    /// Meaningless for directional lights
    pub position: WorldPoint,
    pub direction: WorldVector,
}

/// Collects lights that may affect anything seen by at least one of `views`.
///
/// A light is kept if, for some view, its bounds pass the frustum test and its flags pass
/// that view's combined mask. Shadow views don't restrict lights to casters.
/// Output is in storage order.
pub fn cull_lights<T: LaneFloat>(
    lights: &EntityStore<T, LightType>,
    bounds: &WorldBounds<T>,
    views: &[CullingView],
) -> Vec<VisibleLight> {
    assert2::debug_assert!(bounds.is_current_for(lights), "Light bounds are stale");

    let mut visible = Vec::new();
    for (queue, bucket) in lights.buckets() {
        let Some(bucket_bounds) = bounds.bucket(queue) else {
            continue;
        };

        for (batch, (world_boxes, world_radii)) in bucket
            .batches()
            .zip(bucket_bounds.boxes().iter().zip(bucket_bounds.radii()))
        {
            let kept = views.iter().fold(0, |kept, view| {
                kept | (view.frustum.test_boxes(world_boxes)
                    & mask_bits(&batch, view.combined_mask, false))
            });
            log::trace!("light batch {}: kept {kept:#b}", batch.index);

            for lane in bit_iter(kept) {
                let Some(id) = batch.owners[lane] else {
                    continue;
                };
                let light_type = batch.payloads[lane];
                let transform = &batch.transforms[lane];
                let radius = world_radii.extract(lane);

                let sphere = if light_type.is_directional() || radius.is_infinite() {
                    Sphere::infinite()
                } else {
                    Sphere::new(world_boxes.center.map(|x| x.extract(lane)), radius)
                };

                visible.push(VisibleLight {
                    id,
                    light_type,
                    sphere,
                    light_mask: batch.light_masks[lane],
                    position: transform.position(),
                    direction: transform.direction(),
                });
            }
        }
    }

    log::debug!(
        "light culling: {} of {} lights visible from {} views",
        visible.len(),
        lights.len(),
        views.len()
    );
    visible
}
