//! The ordinal counting engine.
//!
//! One instance counts one query: it walks every matching segment,
//! intersects the hit bitset with the field's sorted-set cursor and
//! accumulates into a counter array indexed by global ordinal, then
//! answers top-k and lookup questions from that array.

use either::Either;
use roaring::RoaringBitmap;

use super::{LabelCursor, LayoutState, SortedSetFacetState};
use crate::index::{FacetHits, MatchingDocs, SortedSetDocValues};
use crate::result::TopEntries;
use crate::{FacetResult, LabelAndValue, Result, UserError};

/// Below this share of a segment's dictionary size, hits are considered
/// sparse and every visited ordinal is remapped on the fly instead of
/// going through a dense per-segment array.
const SPARSE_HITS_DIVISOR: u64 = 10;

/// Per-query ordinal counts over a [`SortedSetFacetState`].
pub struct OrdinalFacetCounts<'a> {
    state: &'a SortedSetFacetState,
    counts: Vec<u32>,
    tot_count: u64,
}

impl<'a> OrdinalFacetCounts<'a> {
    /// Counts the given hits. The hits must come from the reader the
    /// state was built from.
    pub fn new(state: &'a SortedSetFacetState, hits: &FacetHits) -> Result<OrdinalFacetCounts<'a>> {
        hits.check_reader(state.reader_key())?;

        let mut this = OrdinalFacetCounts {
            state,
            counts: vec![0; state.value_count() as usize],
            tot_count: 0,
        };
        for matching in hits.segments() {
            this.count_segment(matching)?;
        }
        Ok(this)
    }

    /// Counts every document of the reader the state was built from, as
    /// if all of them matched.
    pub fn match_all(state: &'a SortedSetFacetState) -> Result<OrdinalFacetCounts<'a>> {
        let mut this = OrdinalFacetCounts {
            state,
            counts: vec![0; state.value_count() as usize],
            tot_count: 0,
        };
        for context in state.segments() {
            let docs: RoaringBitmap = (0..context.reader.max_doc()).collect();
            this.count_segment(&MatchingDocs::new(context.clone(), docs))?;
        }
        Ok(this)
    }

    fn count_segment(&mut self, matching: &MatchingDocs) -> Result<()> {
        let context = &matching.context;
        let Some(mut dv) = context.reader.sorted_set_doc_values(self.state.field())? else {
            return Ok(());
        };

        match self.state.ordinal_map() {
            // Single-segment reader: segment ordinals are the global
            // ordinals, count straight into the shared array.
            None => {
                let counts = &mut self.counts;
                for_each_ord(dv.as_mut(), &matching.docs, &mut self.tot_count, |ord| {
                    counts[ord as usize] += 1;
                })
            }
            Some(map) => {
                let seg_ord_count = dv.value_count();
                if matching.total_hits < seg_ord_count / SPARSE_HITS_DIVISOR {
                    let counts = &mut self.counts;
                    for_each_ord(dv.as_mut(), &matching.docs, &mut self.tot_count, |ord| {
                        counts[map.global_ord(context.ord, ord) as usize] += 1;
                    })
                } else {
                    // Dense hits: accumulate in segment ordinal space,
                    // cache friendly, then fold the non-zero slots once.
                    let mut seg_counts = vec![0u32; seg_ord_count as usize];
                    for_each_ord(dv.as_mut(), &matching.docs, &mut self.tot_count, |ord| {
                        seg_counts[ord as usize] += 1;
                    })?;
                    for (seg_ord, &count) in seg_counts.iter().enumerate() {
                        if count > 0 {
                            let global = map.global_ord(context.ord, seg_ord as u32);
                            self.counts[global as usize] += count;
                        }
                    }
                    Ok(())
                }
            }
        }
    }

    /// The number of documents that contributed at least one count.
    pub fn total_count(&self) -> u64 {
        self.tot_count
    }

    /// The top `top_n` children of the given dimension (or of the path
    /// under it), by count descending then label ascending. `None` when
    /// the dimension or path is unknown, or no child has a count.
    pub fn top_children(&self, top_n: usize, dim: &str, path: &[&str]) -> Result<Option<FacetResult>> {
        if top_n == 0 {
            return Err(UserError::InvalidTopN(top_n).into());
        }
        let mut cursor = self.state.label_cursor();
        let Some(resolved) = self.resolve(dim, path, &mut cursor)? else { return Ok(None) };

        let mut top = TopEntries::new(top_n);
        let mut sum = 0;
        let mut child_count = 0;
        for ord in resolved.child_ords() {
            let count = self.counts[ord as usize];
            if count > 0 {
                sum += u64::from(count);
                child_count += 1;
                top.push(u64::from(count), ord);
            }
        }
        if child_count == 0 {
            return Ok(None);
        }

        let value = resolved.value(sum);
        let mut label_values = Vec::with_capacity(top.len());
        for (count, ord) in top.into_sorted() {
            label_values.push(LabelAndValue { label: child_label(&mut cursor, ord)?, value: count });
        }

        Ok(Some(FacetResult {
            dim: dim.to_string(),
            path: path.iter().map(|component| component.to_string()).collect(),
            value,
            child_count,
            label_values,
        }))
    }

    /// Every child with a non-zero count, in label order.
    pub fn all_children(&self, dim: &str, path: &[&str]) -> Result<Option<FacetResult>> {
        let mut cursor = self.state.label_cursor();
        let Some(resolved) = self.resolve(dim, path, &mut cursor)? else { return Ok(None) };

        let mut sum = 0;
        let mut label_values = Vec::new();
        for ord in resolved.child_ords() {
            let count = self.counts[ord as usize];
            if count > 0 {
                sum += u64::from(count);
                label_values.push(LabelAndValue {
                    label: child_label(&mut cursor, ord)?,
                    value: u64::from(count),
                });
            }
        }
        if label_values.is_empty() {
            return Ok(None);
        }

        Ok(Some(FacetResult {
            dim: dim.to_string(),
            path: path.iter().map(|component| component.to_string()).collect(),
            value: resolved.value(sum),
            child_count: label_values.len() as u32,
            label_values,
        }))
    }

    /// The count of one exact path. Flat dimensions expect exactly one
    /// `value` component under the dimension.
    pub fn specific_value(&self, dim: &str, path: &[&str]) -> Result<Option<u64>> {
        match self.state.layout_state() {
            LayoutState::Flat { ranges } => {
                if path.len() != 1 {
                    return Err(UserError::InvalidFlatPath { dim: dim.to_string() }.into());
                }
                if !ranges.contains_key(dim) {
                    return Ok(None);
                }
            }
            LayoutState::Hierarchical { .. } => (),
        }
        let mut components = Vec::with_capacity(path.len() + 1);
        components.push(dim);
        components.extend_from_slice(path);
        let mut cursor = self.state.label_cursor();
        match cursor.ord(&components)? {
            Some(ord) => Ok(Some(u64::from(self.counts[ord as usize]))),
            None => Ok(None),
        }
    }

    /// One result per dimension that has counts, each limited to its own
    /// top `top_n` children, sorted by value descending then dimension
    /// name ascending.
    pub fn all_dims(&self, top_n: usize) -> Result<Vec<FacetResult>> {
        if top_n == 0 {
            return Err(UserError::InvalidTopN(top_n).into());
        }
        let dims: Vec<String> = match self.state.layout_state() {
            LayoutState::Flat { ranges } => ranges.keys().cloned().collect(),
            LayoutState::Hierarchical { tree } => {
                tree.dims().iter().map(|(dim, _)| dim.clone()).collect()
            }
        };

        let mut results = Vec::new();
        for dim in dims {
            if let Some(result) = self.top_children(top_n, &dim, &[])? {
                results.push(result);
            }
        }
        results.sort_by(|left, right| {
            right.value.cmp(&left.value).then_with(|| left.dim.cmp(&right.dim))
        });
        Ok(results)
    }

    fn resolve<'t>(
        &'t self,
        dim: &str,
        path: &[&str],
        cursor: &mut LabelCursor<'a>,
    ) -> Result<Option<Resolved<'t>>> {
        match self.state.layout_state() {
            LayoutState::Flat { ranges } => {
                if !path.is_empty() {
                    return Err(UserError::InvalidFlatPath { dim: dim.to_string() }.into());
                }
                Ok(ranges.get(dim).map(|range| Resolved::Flat(*range)))
            }
            LayoutState::Hierarchical { tree } => {
                let mut components = Vec::with_capacity(path.len() + 1);
                components.push(dim);
                components.extend_from_slice(path);
                match cursor.ord(&components)? {
                    Some(path_ord) => Ok(Some(Resolved::Tree { tree, path_ord, count: self.counts[path_ord as usize] })),
                    None => Ok(None),
                }
            }
        }
    }
}

impl std::fmt::Debug for OrdinalFacetCounts<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdinalFacetCounts")
            .field("field", &self.state.field())
            .field("tot_count", &self.tot_count)
            .finish()
    }
}

enum Resolved<'t> {
    Flat(super::OrdRange),
    Tree { tree: &'t super::OrdinalTree, path_ord: u32, count: u32 },
}

impl Resolved<'_> {
    fn child_ords(&self) -> impl Iterator<Item = u32> + '_ {
        match self {
            Resolved::Flat(range) => Either::Left(range.ords()),
            Resolved::Tree { tree, path_ord, .. } => Either::Right(tree.children(*path_ord)),
        }
    }

    /// Flat dimensions are worth the sum of their children, hierarchical
    /// paths their own ordinal count.
    fn value(&self, children_sum: u64) -> u64 {
        match self {
            Resolved::Flat(_) => children_sum,
            Resolved::Tree { count, .. } => u64::from(*count),
        }
    }
}

fn child_label(cursor: &mut LabelCursor<'_>, ord: u32) -> Result<String> {
    let mut components = cursor.label_components(ord)?;
    Ok(components.pop().unwrap_or_default())
}

fn for_each_ord(
    dv: &mut dyn SortedSetDocValues,
    docs: &RoaringBitmap,
    tot_count: &mut u64,
    mut on_ord: impl FnMut(u32),
) -> Result<()> {
    for doc in docs {
        if dv.advance_exact(doc)? {
            *tot_count += 1;
            while let Some(ord) = dv.next_ord()? {
                on_ord(ord);
            }
        }
    }
    Ok(())
}
