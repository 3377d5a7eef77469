//! Fixed-layout, little-endian wire records for the internal collectives.
//!
//! Field data itself travels as raw buffers of the scalar wire type (see
//! [`crate::ops::scalar::Scalar::Wire`]); the records here carry counts and
//! partition metadata.

use crate::topology::range::{MAX_DIMS, Range, Tuple};
use bytemuck::{Pod, Zeroable};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Copy raw bytes into a freshly allocated, properly aligned vector of `T`.
///
/// Received buffers carry no alignment guarantee, so a plain cast is not
/// enough here.
pub fn collect_from_bytes<T: Pod>(raw: &[u8]) -> Vec<T> {
    bytemuck::pod_collect_to_vec(raw)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// An index range carried on the wire, together with the dimension count.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireRange {
    pub num_dims_le: u32,
    pub begin_le: [i32; MAX_DIMS],
    pub end_le: [i32; MAX_DIMS],
}

impl WireRange {
    pub fn of(range: &Range) -> Self {
        Self {
            num_dims_le: (range.num_dims() as u32).to_le(),
            begin_le: range.begin().map(i32::to_le),
            end_le: range.end().map(i32::to_le),
        }
    }

    pub fn get(&self) -> Range {
        let begin: Tuple = self.begin_le.map(i32::from_le);
        let end: Tuple = self.end_le.map(i32::from_le);
        Range::new(u32::from_le(self.num_dims_le) as usize, begin, end)
    }
}

/// One entry of a partition bin: the rank owning `range`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireBinEntry {
    pub rank_le: u32,
    pub range: WireRange,
}

impl WireBinEntry {
    pub fn new(rank: usize, range: &Range) -> Self {
        Self {
            rank_le: (rank as u32).to_le(),
            range: WireRange::of(range),
        }
    }
    pub fn decode(&self) -> (usize, Range) {
        (u32::from_le(self.rank_le) as usize, self.range.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_entry_layout_is_packed() {
        assert_eq!(std::mem::size_of::<WireRange>(), 28);
        assert_eq!(std::mem::size_of::<WireBinEntry>(), 32);
    }

    #[test]
    fn unaligned_bytes_are_copied() {
        let vals = [1u64, 2, 3];
        let mut raw = vec![0u8; 1];
        raw.extend_from_slice(cast_slice(&vals));
        let back: Vec<u64> = collect_from_bytes(&raw[1..]);
        assert_eq!(back, vals);
    }

    #[test]
    fn range_survives_the_wire() {
        let r = Range::new(2, [-1, 4, 0], [3, 9, 1]);
        assert_eq!(WireRange::of(&r).get(), r);
    }
}
