//! The cross-segment ordinal map.
//!
//! Each segment owns a private dictionary with its own dense ordinals. To
//! count across segments the engines need one shared ordinal space, built
//! here by merging the per-segment dictionaries (all sorted by UTF-8 label
//! bytes) and assigning dense global ordinals in merge order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::index::SortedSetDocValues;
use crate::{Result, UserError};

#[derive(Debug)]
pub struct OrdinalMap {
    /// Per segment, the global ordinal of each segment ordinal.
    seg_to_global: Vec<Vec<u32>>,
    /// Per global ordinal, a segment containing it and its ordinal there.
    owner: Vec<(u32, u32)>,
}

impl OrdinalMap {
    /// Merges the dictionaries of the given segments. The per-segment
    /// value counts must fit `u32`, the caller validates them.
    pub(crate) fn build(
        field: &str,
        dvs: &mut [Box<dyn SortedSetDocValues + '_>],
    ) -> Result<OrdinalMap> {
        let mut cursors = vec![0u32; dvs.len()];
        let mut seg_to_global: Vec<Vec<u32>> =
            dvs.iter().map(|dv| Vec::with_capacity(dv.value_count() as usize)).collect();

        // The heap holds the next unmerged label of every segment; ties on
        // the label group segments under the same global ordinal.
        let mut heads = BinaryHeap::new();
        for (seg, dv) in dvs.iter_mut().enumerate() {
            if dv.value_count() > 0 {
                heads.push(Reverse((dv.lookup_ord(0)?, seg)));
            }
        }

        let mut owner: Vec<(u32, u32)> = Vec::new();
        while let Some(Reverse((label, seg))) = heads.pop() {
            if owner.len() == u32::MAX as usize {
                return Err(UserError::DictionaryTooLarge {
                    field: field.to_string(),
                    count: owner.len() as u64 + 1,
                }
                .into());
            }
            let global = owner.len() as u32;
            owner.push((seg as u32, cursors[seg]));
            Self::advance(&mut heads, dvs, &mut cursors, &mut seg_to_global, seg, global)?;

            while let Some(Reverse((next_label, _))) = heads.peek() {
                if *next_label != label {
                    break;
                }
                let Some(Reverse((_, other))) = heads.pop() else { break };
                Self::advance(&mut heads, dvs, &mut cursors, &mut seg_to_global, other, global)?;
            }
        }

        tracing::debug!(
            segments = dvs.len(),
            global_ords = owner.len(),
            "built the cross-segment ordinal map"
        );

        Ok(OrdinalMap { seg_to_global, owner })
    }

    fn advance(
        heads: &mut BinaryHeap<Reverse<(Vec<u8>, usize)>>,
        dvs: &mut [Box<dyn SortedSetDocValues + '_>],
        cursors: &mut [u32],
        seg_to_global: &mut [Vec<u32>],
        seg: usize,
        global: u32,
    ) -> Result<()> {
        seg_to_global[seg].push(global);
        cursors[seg] += 1;
        if u64::from(cursors[seg]) < dvs[seg].value_count() {
            heads.push(Reverse((dvs[seg].lookup_ord(cursors[seg])?, seg)));
        }
        Ok(())
    }

    /// The global ordinal of a segment ordinal.
    pub fn global_ord(&self, segment: usize, seg_ord: u32) -> u32 {
        self.seg_to_global[segment][seg_ord as usize]
    }

    /// A `(segment, segment ordinal)` pair owning the given global
    /// ordinal, usable to look its label up.
    pub fn owner(&self, global_ord: u32) -> (usize, u32) {
        let (segment, seg_ord) = self.owner[global_ord as usize];
        (segment as usize, seg_ord)
    }

    /// The number of unique labels across all segments.
    pub fn value_count(&self) -> u64 {
        self.owner.len() as u64
    }
}
