use assert2::assert;
use bon::bon;
use nalgebra::{Isometry3, Matrix4, Orthographic3, Perspective3, Unit};

use crate::geometry::{EPSILON, FloatType, Frustum, WorldPoint, WorldVector};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Projection {
    /// Vertical field of view in radians, aspect is width / height
    Perspective { fov_y: FloatType, aspect: FloatType },
    /// Size of the view volume in world units
    Orthographic { width: FloatType, height: FloatType },
}

/// Camera as seen by the culling passes: a frustum plus a visibility mask.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    frustum: Frustum,
    view_projection: Option<Matrix4<FloatType>>,

    /// Viewport visibility mask, ANDed with the scene mask and entity layers.
    visibility_mask: u32,

    /// Shadow casting cameras only see entities flagged as shadow casters.
    shadow_pass: bool,
}

#[bon]
impl Camera {
    #[builder]
    pub fn new(
        position: WorldPoint,
        forward: WorldVector,
        up: WorldVector,
        projection: Projection,
        near: FloatType,
        far: FloatType,
        #[builder(default = u32::MAX)] visibility_mask: u32,
        #[builder(default)] shadow_pass: bool,
    ) -> Self {
        let forward = Unit::try_new(forward, EPSILON).expect("Forward vector must be non-zero");
        let up = Unit::try_new(up, EPSILON).expect("Up vector must be non-zero");
        assert!(
            forward.cross(up.as_ref()).norm() > EPSILON,
            "`up` and `forward` must be linearly independent"
        );
        assert!(near > 0.0);
        assert!(far > near);

        let view = Isometry3::look_at_rh(&position, &(position + forward.as_ref()), &up);
        let projection_matrix = match projection {
            Projection::Perspective { fov_y, aspect } => {
                assert!(fov_y > 0.0);
                assert!(aspect > 0.0);
                Perspective3::new(aspect, fov_y, near, far).to_homogeneous()
            }
            Projection::Orthographic { width, height } => {
                assert!(width > 0.0);
                assert!(height > 0.0);
                Orthographic3::new(
                    -width / 2.0,
                    width / 2.0,
                    -height / 2.0,
                    height / 2.0,
                    near,
                    far,
                )
                .to_homogeneous()
            }
        };
        let view_projection = projection_matrix * view.to_homogeneous();

        Camera {
            frustum: Frustum::from_view_projection(&view_projection),
            view_projection: Some(view_projection),
            visibility_mask,
            shadow_pass,
        }
    }
}

impl Camera {
    /// Camera from planes supplied by someone else.
    pub fn from_frustum(frustum: Frustum, visibility_mask: u32, shadow_pass: bool) -> Self {
        Camera {
            frustum,
            view_projection: None,
            visibility_mask,
            shadow_pass,
        }
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Only available for cameras created through the builder.
    pub fn view_projection(&self) -> Option<&Matrix4<FloatType>> {
        self.view_projection.as_ref()
    }

    pub fn visibility_mask(&self) -> u32 {
        self.visibility_mask
    }

    pub fn is_shadow_pass(&self) -> bool {
        self.shadow_pass
    }

    /// Everything a culling pass needs from this camera for one frame.
    pub fn culling_view(&self, scene_mask: u32) -> CullingView {
        CullingView {
            frustum: self.frustum,
            combined_mask: self.visibility_mask & scene_mask,
            casters_only: self.shadow_pass,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CullingView {
    pub frustum: Frustum,
    /// Viewport mask ANDed with the scene mask
    pub combined_mask: u32,
    pub casters_only: bool,
}
