use simba::simd::{SimdRealField, WideF32x8};
// Comparisons go through wide directly, simba only hands back its own bool vectors
use wide::{CmpEq as _, CmpGt as _, CmpLe as _, f32x8};

/// Floating point lane type that the culling stages are generic over.
///
/// `f32` is the one lane case, `WideF32x8` processes eight entities at once.
/// Predicates return bit masks, bit `i` corresponding to lane `i`.
/// Only plain IEEE operations are used here (no fused multiply-add), so every lane
/// width gives bit-identical results.
pub trait LaneFloat: SimdRealField<Element = f32> + Copy + Default + Send + Sync {
    fn lane_abs(self) -> Self;

    fn gt_bits(self, other: Self) -> u64;
    fn le_bits(self, other: Self) -> u64;

    /// Lanes holding +-infinity
    fn infinite_bits(self) -> u64;

    #[inline(always)]
    fn from_lanes(mut f: impl FnMut(usize) -> f32) -> Self {
        let mut value = Self::splat(0.0);
        for i in 0..Self::LANES {
            value.replace(i, f(i));
        }
        value
    }

    #[inline(always)]
    fn select_bits(bits: u64, if_set: Self, if_clear: Self) -> Self {
        Self::from_lanes(|i| {
            if bits >> i & 1 != 0 {
                if_set.extract(i)
            } else {
                if_clear.extract(i)
            }
        })
    }

    /// Mask with a bit set for every lane of this type
    #[inline(always)]
    fn all_lanes() -> u64 {
        if Self::LANES >= 64 {
            u64::MAX
        } else {
            (1u64 << Self::LANES) - 1
        }
    }
}

impl LaneFloat for f32 {
    #[inline(always)]
    fn lane_abs(self) -> Self {
        self.abs()
    }

    #[inline(always)]
    fn gt_bits(self, other: Self) -> u64 {
        (self > other) as u64
    }

    #[inline(always)]
    fn le_bits(self, other: Self) -> u64 {
        (self <= other) as u64
    }

    #[inline(always)]
    fn infinite_bits(self) -> u64 {
        self.is_infinite() as u64
    }
}

impl LaneFloat for WideF32x8 {
    #[inline(always)]
    fn lane_abs(self) -> Self {
        WideF32x8(self.0.abs())
    }

    #[inline(always)]
    fn gt_bits(self, other: Self) -> u64 {
        self.0.cmp_gt(other.0).move_mask() as u64
    }

    #[inline(always)]
    fn le_bits(self, other: Self) -> u64 {
        self.0.cmp_le(other.0).move_mask() as u64
    }

    #[inline(always)]
    fn infinite_bits(self) -> u64 {
        self.0
            .abs()
            .cmp_eq(f32x8::splat(f32::INFINITY))
            .move_mask() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;
    use proptest::{prelude::Strategy, prop_assert};
    use simba::simd::SimdValue;
    use test_strategy::proptest;

    fn lanes_strategy() -> impl Strategy<Value = [f32; 8]> {
        proptest::array::uniform8(-1e3f32..1e3f32)
    }

    fn simd_element_iter<T: SimdValue>(value: T) -> impl Iterator<Item = T::Element> {
        (0..T::LANES).map(move |i| value.extract(i))
    }

    fn wide(values: [f32; 8]) -> WideF32x8 {
        WideF32x8::from_lanes(|i| values[i])
    }

    #[test]
    fn all_lanes_mask() {
        assert!(f32::all_lanes() == 1);
        assert!(WideF32x8::all_lanes() == 0xff);
    }

    #[test]
    fn infinite_bits_detect_both_signs() {
        let v = wide([0.0, f32::INFINITY, 1.0, f32::NEG_INFINITY, 0.0, 0.0, f32::MAX, 0.0]);
        assert!(v.infinite_bits() == 0b1010);
        assert!(f32::INFINITY.infinite_bits() == 1);
        assert!(f32::MAX.infinite_bits() == 0);
    }

    #[test]
    fn select_bits_picks_per_lane() {
        let a = WideF32x8::splat(1.0);
        let b = WideF32x8::splat(2.0);
        let selected = WideF32x8::select_bits(0b1000_0001, a, b);
        let lanes: Vec<f32> = simd_element_iter(selected).collect();
        assert!(lanes == vec![1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 1.0]);
    }

    #[proptest]
    fn wide_comparisons_match_scalar(
        #[strategy(lanes_strategy())] a: [f32; 8],
        #[strategy(lanes_strategy())] b: [f32; 8],
    ) {
        let gt = wide(a).gt_bits(wide(b));
        let le = wide(a).le_bits(wide(b));
        for i in 0..8 {
            prop_assert!((gt >> i & 1) == a[i].gt_bits(b[i]), "gt lane {}", i);
            prop_assert!((le >> i & 1) == a[i].le_bits(b[i]), "le lane {}", i);
        }
    }

    #[proptest]
    fn wide_abs_matches_scalar(#[strategy(lanes_strategy())] a: [f32; 8]) {
        let abs = wide(a).lane_abs();
        for (i, lane) in simd_element_iter(abs).enumerate() {
            prop_assert!(lane == a[i].lane_abs());
        }
    }
}
