//! Bitmask tools for working with patterns of channels

use bit_iter::BitIter;
use std::ops::{BitAndAssign, BitOrAssign, BitXorAssign};
use num_traits::{FromPrimitive, PrimInt, Unsigned};

/// Convert channels into a bitmask
pub fn chans_to_mask(chs: &[u8]) -> u8 {
    let mut m = 0;
    for ch in chs {
        m |= 1 << (ch - 1);
    }
    return m;
}

/// Returns all channels in mask
pub fn mask_to_chans(m: u8) -> Vec<u8> {
    let mut chs = Vec::new();
    for b in BitIter::from(m) {
        // Channels are 1-indexed, bits are 0-indexed
        chs.push(1 + b as u8);
    }
    return chs;
}

/// Number of coincidence categories the device counters report
pub const COINC_CATEGORIES: usize = 31;

/// Channel activity pattern (bit i = input i) to the device's coincidence
/// counter index. This is the hardware's own layout and is not derivable by
/// formula: 14 and 26 share index 15, and index 17 is never produced.
pub const COINC_INDEX: [i8; 32] = [
    -1, 0, 1, 11, 2, 12, 5, 19,
    3, 13, 6, 20, 7, 21, 15, 26,
    4, 14, 8, 22, 9, 23, 16, 27,
    10, 24, 15, 28, 18, 29, 25, 30,
];

/// Coincidence counter index for five channel activity flags, or -1 when no
/// channel is active.
pub fn coincidence_index(ch0: bool, ch1: bool, ch2: bool, ch3: bool, ch4: bool) -> i8 {
    let mut m = 0u8;
    m.change(0, ch0);
    m.change(1, ch1);
    m.change(2, ch2);
    m.change(3, ch3);
    m.change(4, ch4);
    return COINC_INDEX[m as usize];
}

/// Same lookup for a ready-made bitmask. Masks above 31 name channels the
/// table doesn't cover and map to `None`, as does the empty mask.
pub fn mask_to_coincidence_index(m: u8) -> Option<usize> {
    match COINC_INDEX.get(m as usize) {
        Some(&i) if i >= 0 => Some(i as usize),
        _ => None,
    }
}

/// Bitwise set/clear/toggle/check/change operations for unsigned masks
pub trait BitOps:
    PrimInt
    + BitAndAssign
    + BitOrAssign
    + BitXorAssign
    + FromPrimitive
    + Unsigned
{
    fn set(&mut self, b: usize);
    fn clear(&mut self, b: usize);
    fn toggle(&mut self, b: usize);
    fn change(&mut self, b: usize, x: bool);
    fn check(self, b: usize) -> bool;
}

macro_rules! impl_bitops {
    ($($t:ty),*) => {$(
        impl BitOps for $t {
            #[inline]
            fn set(&mut self, b: usize) {
                *self |= 1 << b;
            }

            #[inline]
            fn clear(&mut self, b: usize) {
                *self &= !(1 << b);
            }

            #[inline]
            fn toggle(&mut self, b: usize) {
                *self ^= 1 << b;
            }

            #[inline]
            fn change(&mut self, b: usize, x: bool) {
                *self = (*self & !(1 << b)) | ((x as $t) << b);
            }

            #[inline]
            fn check(self, b: usize) -> bool {
                return self >> b & 1 == 1;
            }
        }
    )*};
}

impl_bitops!(u8, u16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_masks() {
        assert_eq!(0b01, chans_to_mask(&[1]));
        assert_eq!(0b10, chans_to_mask(&[2]));
        assert_eq!(0b11, chans_to_mask(&[1, 2]));
        assert_eq!(0b1_0000, chans_to_mask(&[5]));
    }

    #[test]
    fn bijective_channel_masks() {
        for pat in u8::MIN..=u8::MAX {
            let chs = mask_to_chans(pat);
            assert!(!chs.contains(&0));
            assert_eq!(pat, chans_to_mask(&chs));
        }
    }

    #[test]
    fn coincidence_table_literal() {
        let expected: [(u8, i8); 32] = [
            (0, -1), (1, 0), (2, 1), (3, 11), (4, 2), (5, 12), (6, 5), (7, 19),
            (8, 3), (9, 13), (10, 6), (11, 20), (12, 7), (13, 21), (14, 15), (15, 26),
            (16, 4), (17, 14), (18, 8), (19, 22), (20, 9), (21, 23), (22, 16), (23, 27),
            (24, 10), (25, 24), (26, 15), (27, 28), (28, 18), (29, 29), (30, 25), (31, 30),
        ];
        for (m, idx) in expected {
            let flags: Vec<bool> = (0..5).map(|b| m.check(b)).collect();
            assert_eq!(
                idx,
                coincidence_index(flags[0], flags[1], flags[2], flags[3], flags[4]),
                "mask {}",
                m
            );
        }
    }

    #[test]
    fn coincidence_index_edges() {
        assert_eq!(-1, coincidence_index(false, false, false, false, false));
        assert_eq!(30, coincidence_index(true, true, true, true, true));
        assert_eq!(None, mask_to_coincidence_index(0));
        assert_eq!(Some(30), mask_to_coincidence_index(31));
        assert_eq!(None, mask_to_coincidence_index(32));
        assert_eq!(Some(11), mask_to_coincidence_index(chans_to_mask(&[1, 2])));
        // every produced index fits the counter array
        for m in 1..32u8 {
            assert!(mask_to_coincidence_index(m).unwrap() < COINC_CATEGORIES);
        }
    }

    #[test]
    fn bit_ops() {
        // Exhaustively check all u8's
        for i in u8::MIN..=u8::MAX {
            for b in BitIter::from(u8::MAX) {
                let mut x = i;
                let i_set = i | 1 << b;
                let i_clr = i & !(1 << b);

                assert_eq!(i.check(b), i >> b & 1 == 1);
                x.set(b);
                assert_eq!(x, i_set);
                x.clear(b);
                assert_eq!(x, i_clr);
                x.toggle(b);
                assert_eq!(x, i_set);
                x.change(b, false);
                assert_eq!(x, i_clr);
            }
        }
        // Check some interesting u16's
        for &i in [u16::MIN, 1u16, 1337u16, u16::MAX].iter() {
            for b in BitIter::from(u16::MAX) {
                let mut x = i;
                x.change(b, true);
                assert_eq!(x, i | 1 << b);
                x.toggle(b);
                assert_eq!(x, i & !(1 << b));
            }
        }
    }
}
