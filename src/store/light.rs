use crate::{
    geometry::{FloatType, Transform, WorldBox, WorldPoint, WorldVector},
    store::EntityDesc,
    visibility::VisibilityFlags,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LightType {
    #[default]
    Point,
    /// Lights everything, has no meaningful position
    Directional,
    Spotlight,
}

impl LightType {
    pub fn is_directional(self) -> bool {
        self == LightType::Directional
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LightDesc {
    pub light_type: LightType,
    /// Attenuation range, ignored for directional lights
    pub range: FloatType,
    pub visibility_flags: VisibilityFlags,
    pub light_mask: u32,
}

impl LightDesc {
    pub fn new(light_type: LightType, range: FloatType) -> LightDesc {
        LightDesc {
            light_type,
            range,
            visibility_flags: VisibilityFlags::all_layers(),
            light_mask: u32::MAX,
        }
    }

    pub fn point(range: FloatType) -> LightDesc {
        LightDesc::new(LightType::Point, range)
    }

    pub fn spotlight(range: FloatType) -> LightDesc {
        LightDesc::new(LightType::Spotlight, range)
    }

    pub fn directional() -> LightDesc {
        LightDesc::new(LightType::Directional, FloatType::INFINITY)
    }

    pub fn with_light_mask(self, light_mask: u32) -> LightDesc {
        LightDesc { light_mask, ..self }
    }

    pub fn with_visibility_flags(self, visibility_flags: VisibilityFlags) -> LightDesc {
        LightDesc {
            visibility_flags,
            ..self
        }
    }

    /// Local bounds of the light: a cube around the origin covering the range,
    /// or the infinite box for directional lights.
    pub fn local_box(&self) -> WorldBox {
        if self.light_type.is_directional() {
            WorldBox::infinite()
        } else {
            WorldBox::from_center_half_size(WorldPoint::origin(), WorldVector::repeat(self.range))
        }
    }

    pub fn local_radius(&self) -> FloatType {
        if self.light_type.is_directional() {
            FloatType::INFINITY
        } else {
            self.range
        }
    }

    /// Store entry for this light placed at `transform`.
    pub fn entity_desc(&self, transform: Transform) -> EntityDesc<LightType> {
        EntityDesc {
            local_box: self.local_box(),
            local_radius: self.local_radius(),
            visibility_flags: self.visibility_flags,
            light_mask: self.light_mask,
            transform,
            payload: self.light_type,
        }
    }
}
