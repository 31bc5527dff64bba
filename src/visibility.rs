use bitflags::bitflags;

bitflags! {
    /// Per entity visibility state.
    ///
    /// The two top bits are reserved for engine state, everything below is a user
    /// defined layer mask tested against camera and scene masks.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VisibilityFlags: u32 {
        /// Entity takes part in visibility at all.
        const VISIBLE = 1 << 31;
        /// Entity is considered by shadow casting cameras.
        const SHADOW_CASTER = 1 << 30;

        const _ = !0;
    }
}

impl VisibilityFlags {
    pub const LAYERS: u32 = !(Self::VISIBLE.bits() | Self::SHADOW_CASTER.bits());

    /// Visible, casting shadows, and in every layer.
    pub fn all_layers() -> VisibilityFlags {
        VisibilityFlags::VISIBLE | VisibilityFlags::SHADOW_CASTER | VisibilityFlags::from_layers(!0)
    }

    /// Visible in the given layers.
    pub fn visible_in(layers: u32) -> VisibilityFlags {
        VisibilityFlags::VISIBLE | VisibilityFlags::from_layers(layers)
    }

    pub fn from_layers(layers: u32) -> VisibilityFlags {
        VisibilityFlags::from_bits_retain(layers & Self::LAYERS)
    }

    pub fn layers(self) -> u32 {
        self.bits() & Self::LAYERS
    }

    /// Mask test shared by every culling pass.
    ///
    /// `combined_mask` is the viewport mask already ANDed with the scene mask.
    /// Padding lanes have empty flags and never pass.
    #[inline(always)]
    pub fn passes(self, combined_mask: u32, casters_only: bool) -> bool {
        self.contains(VisibilityFlags::VISIBLE)
            && self.layers() & combined_mask != 0
            && (!casters_only || self.contains(VisibilityFlags::SHADOW_CASTER))
    }
}

/// Render queue bucket an entity is stored in. Buckets are culled and drawn in id order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderQueueId(pub u8);

impl RenderQueueId {
    pub const MAX: RenderQueueId = RenderQueueId(u8::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u8> for RenderQueueId {
    fn from(value: u8) -> Self {
        RenderQueueId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;
    use test_case::test_case;

    #[test_case(VisibilityFlags::visible_in(0b01), 0b11, false, true ; "layer_match")]
    #[test_case(VisibilityFlags::visible_in(0b01), 0b10, false, false ; "layer_mismatch")]
    #[test_case(VisibilityFlags::from_layers(0b01), 0b01, false, false ; "not_visible")]
    #[test_case(VisibilityFlags::visible_in(0b01), 0b01, true, false ; "not_a_caster")]
    #[test_case(VisibilityFlags::all_layers(), 0b01, true, true ; "caster")]
    #[test_case(VisibilityFlags::empty(), !0, false, false ; "padding")]
    fn mask_test(flags: VisibilityFlags, mask: u32, casters_only: bool, expected: bool) {
        assert!(flags.passes(mask, casters_only) == expected);
    }

    #[test]
    fn reserved_bits_are_not_layers() {
        assert!(VisibilityFlags::all_layers().layers() == VisibilityFlags::LAYERS);
        assert!(!VisibilityFlags::visible_in(0).passes(VisibilityFlags::VISIBLE.bits(), false));
    }
}
