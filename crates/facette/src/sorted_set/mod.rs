//! Reader state for ordinal-set facets.
//!
//! The state is built once per reader open with a single forward scan of
//! the field's dictionary, and is immutable afterwards: it can be shared
//! across threads and reused by every query until the reader goes away.
//! Flat fields resolve to one contiguous ordinal range per dimension,
//! hierarchical fields to an ordinal tree with first-child and
//! next-sibling links.

use std::collections::BTreeMap;
use std::sync::Arc;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

pub use self::counts::OrdinalFacetCounts;
pub use self::ordinal_map::OrdinalMap;
use crate::index::{
    DocValuesType, EmptySortedSet, IndexReader, ReaderKey, SegmentContext, SortedSetDocValues,
};
use crate::{facet_path, InternalError, Result, UserError, INVALID_ORDINAL};

mod counts;
mod ordinal_map;

/// How the labels of a sorted-set facet field are organised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacetLayout {
    /// Every label is a two-component `dim/value` path.
    Flat,
    /// Labels form a taxonomy, every ancestor prefix is itself indexed.
    Hierarchical,
}

/// A contiguous range of ordinals, both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdRange {
    pub start: u32,
    pub end: u32,
}

impl OrdRange {
    pub fn ords(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

/// The per-reader immutable state of one sorted-set facet field.
pub struct SortedSetFacetState {
    field: String,
    reader_key: ReaderKey,
    segments: Vec<SegmentContext>,
    value_count: u32,
    /// `None` when the reader has a single segment: segment ordinals then
    /// already are global ordinals.
    ordinal_map: Option<Arc<OrdinalMap>>,
    layout: LayoutState,
}

#[derive(Debug)]
pub(crate) enum LayoutState {
    Flat { ranges: BTreeMap<String, OrdRange> },
    Hierarchical { tree: OrdinalTree },
}

impl SortedSetFacetState {
    /// Scans the dictionary of `field` and builds the reusable state.
    pub fn new(reader: &IndexReader, field: &str, layout: FacetLayout) -> Result<SortedSetFacetState> {
        let segments = reader.segments().to_vec();

        let mut dvs: Vec<Box<dyn SortedSetDocValues + '_>> = Vec::with_capacity(segments.len());
        let mut any_present = false;
        for context in &segments {
            match context.reader.sorted_set_doc_values(field)? {
                Some(dv) => {
                    if dv.value_count() > u64::from(u32::MAX) {
                        return Err(UserError::DictionaryTooLarge {
                            field: field.to_string(),
                            count: dv.value_count(),
                        }
                        .into());
                    }
                    any_present = true;
                    dvs.push(dv);
                }
                None => {
                    if let Some(actual) = context.reader.doc_values_type(field) {
                        if actual != DocValuesType::SortedSet {
                            return Err(UserError::InvalidDocValuesType {
                                field: field.to_string(),
                                expected: DocValuesType::SortedSet,
                                actual,
                            }
                            .into());
                        }
                    }
                    dvs.push(Box::new(EmptySortedSet));
                }
            }
        }
        if !any_present {
            return Err(UserError::MissingDocValues {
                field: field.to_string(),
                expected: DocValuesType::SortedSet,
            }
            .into());
        }

        let ordinal_map = if segments.len() > 1 {
            Some(Arc::new(OrdinalMap::build(field, &mut dvs)?))
        } else {
            None
        };
        let value_count = match &ordinal_map {
            Some(map) => map.value_count() as u32,
            None => dvs[0].value_count() as u32,
        };

        let mut builder = LayoutBuilder::new(field, layout);
        for ord in 0..value_count {
            let bytes = match &ordinal_map {
                Some(map) => {
                    let (seg, seg_ord) = map.owner(ord);
                    dvs[seg].lookup_ord(seg_ord)?
                }
                None => dvs[0].lookup_ord(ord)?,
            };
            let label = std::str::from_utf8(&bytes).map_err(InternalError::from)?;
            builder.push(ord, label)?;
        }
        let layout = builder.finish(value_count)?;
        drop(dvs);

        tracing::debug!(field, value_count, segments = segments.len(), "built facet reader state");

        Ok(SortedSetFacetState {
            field: field.to_string(),
            reader_key: reader.key(),
            segments,
            value_count,
            ordinal_map,
            layout,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn reader_key(&self) -> ReaderKey {
        self.reader_key
    }

    /// The number of unique labels in the global ordinal space.
    pub fn value_count(&self) -> u32 {
        self.value_count
    }

    pub fn layout(&self) -> FacetLayout {
        match self.layout {
            LayoutState::Flat { .. } => FacetLayout::Flat,
            LayoutState::Hierarchical { .. } => FacetLayout::Hierarchical,
        }
    }

    /// The ordinal range of a flat dimension, `None` for unknown
    /// dimensions or hierarchical states.
    pub fn dim_range(&self, dim: &str) -> Option<OrdRange> {
        match &self.layout {
            LayoutState::Flat { ranges } => ranges.get(dim).copied(),
            LayoutState::Hierarchical { .. } => None,
        }
    }

    pub(crate) fn segments(&self) -> &[SegmentContext] {
        &self.segments
    }

    pub(crate) fn ordinal_map(&self) -> Option<&Arc<OrdinalMap>> {
        self.ordinal_map.as_ref()
    }

    pub(crate) fn layout_state(&self) -> &LayoutState {
        &self.layout
    }

    pub(crate) fn label_cursor(&self) -> LabelCursor<'_> {
        LabelCursor { state: self, dvs: self.segments.iter().map(|_| None).collect() }
    }
}

impl std::fmt::Debug for SortedSetFacetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedSetFacetState")
            .field("field", &self.field)
            .field("value_count", &self.value_count)
            .field("layout", &self.layout())
            .field("segments", &self.segments.len())
            .finish()
    }
}

/// The first-child/next-sibling encoding of a hierarchical dictionary.
#[derive(Debug)]
pub(crate) struct OrdinalTree {
    /// Ordinals with at least one child; the first child is `ord + 1`.
    has_children: RoaringBitmap,
    /// Next sibling of every ordinal, or [`INVALID_ORDINAL`].
    siblings: Vec<u32>,
    /// The root ordinal of every dimension, in ordinal (label) order.
    dims: Vec<(String, u32)>,
}

impl OrdinalTree {
    pub(crate) fn dims(&self) -> &[(String, u32)] {
        &self.dims
    }

    pub(crate) fn children(&self, ord: u32) -> TreeChildren<'_> {
        let first = if self.has_children.contains(ord) { ord + 1 } else { INVALID_ORDINAL };
        TreeChildren { tree: self, next: first }
    }
}

pub(crate) struct TreeChildren<'a> {
    tree: &'a OrdinalTree,
    next: u32,
}

impl Iterator for TreeChildren<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next == INVALID_ORDINAL {
            return None;
        }
        let current = self.next;
        self.next = self.tree.siblings[current as usize];
        Some(current)
    }
}

enum LayoutBuilder<'a> {
    Flat(FlatBuilder<'a>),
    Hierarchical(TreeBuilder),
}

impl<'a> LayoutBuilder<'a> {
    fn new(field: &'a str, layout: FacetLayout) -> LayoutBuilder<'a> {
        match layout {
            FacetLayout::Flat => LayoutBuilder::Flat(FlatBuilder {
                field,
                ranges: BTreeMap::new(),
                current: None,
            }),
            FacetLayout::Hierarchical => LayoutBuilder::Hierarchical(TreeBuilder {
                has_children: RoaringBitmap::new(),
                siblings: Vec::new(),
                dims: Vec::new(),
                stack: Vec::new(),
                pending: None,
            }),
        }
    }

    fn push(&mut self, ord: u32, label: &str) -> Result<()> {
        match self {
            LayoutBuilder::Flat(builder) => builder.push(ord, label),
            LayoutBuilder::Hierarchical(builder) => {
                builder.push(ord, label);
                Ok(())
            }
        }
    }

    fn finish(self, value_count: u32) -> Result<LayoutState> {
        match self {
            LayoutBuilder::Flat(builder) => {
                Ok(LayoutState::Flat { ranges: builder.finish(value_count)? })
            }
            LayoutBuilder::Hierarchical(builder) => {
                Ok(LayoutState::Hierarchical { tree: builder.finish() })
            }
        }
    }
}

/// Tracks runs of consecutive ordinals sharing their first component.
struct FlatBuilder<'a> {
    field: &'a str,
    ranges: BTreeMap<String, OrdRange>,
    current: Option<(String, u32)>,
}

impl FlatBuilder<'_> {
    fn push(&mut self, ord: u32, label: &str) -> Result<()> {
        let mut components = facet_path::string_to_path(label);
        if components.len() != 2 {
            return Err(UserError::InvalidFlatLabel {
                field: self.field.to_string(),
                label: label.to_string(),
            }
            .into());
        }
        let dim = components.swap_remove(0);

        match self.current.take() {
            Some((current_dim, start)) if current_dim == dim => {
                self.current = Some((current_dim, start));
            }
            Some((current_dim, start)) => {
                self.insert(current_dim, OrdRange { start, end: ord - 1 })?;
                self.current = Some((dim, ord));
            }
            None => self.current = Some((dim, ord)),
        }
        Ok(())
    }

    fn finish(mut self, value_count: u32) -> Result<BTreeMap<String, OrdRange>> {
        if let Some((dim, start)) = self.current.take() {
            self.insert(dim, OrdRange { start, end: value_count - 1 })?;
        }
        Ok(self.ranges)
    }

    fn insert(&mut self, dim: String, range: OrdRange) -> Result<()> {
        let label = dim.clone();
        if self.ranges.insert(dim, range).is_some() {
            return Err(InternalError::DictionaryNotSorted {
                field: self.field.to_string(),
                label,
            }
            .into());
        }
        Ok(())
    }
}

/// Builds the ordinal tree with an explicit stack of ordinals whose next
/// sibling is still unresolved, one entry at most per open depth.
struct TreeBuilder {
    has_children: RoaringBitmap,
    siblings: Vec<u32>,
    dims: Vec<(String, u32)>,
    stack: Vec<StackEntry>,
    /// The previous ordinal, processed once the lookahead label is known.
    pending: Option<(u32, Vec<String>)>,
}

struct StackEntry {
    ord: u32,
    components: Vec<String>,
}

impl TreeBuilder {
    fn push(&mut self, ord: u32, label: &str) {
        let components = facet_path::string_to_path(label);
        self.siblings.push(INVALID_ORDINAL);
        if let Some((previous, previous_components)) = self.pending.take() {
            self.process(previous, previous_components, Some(&components));
        }
        self.pending = Some((ord, components));
    }

    fn finish(mut self) -> OrdinalTree {
        if let Some((ord, components)) = self.pending.take() {
            self.process(ord, components, None);
        }
        // Entries still stacked have no next sibling and already carry the
        // invalid ordinal.
        OrdinalTree { has_children: self.has_children, siblings: self.siblings, dims: self.dims }
    }

    fn process(&mut self, ord: u32, components: Vec<String>, next: Option<&[String]>) {
        let depth = components.len();
        if depth == 1 {
            self.dims.push((components[0].clone(), ord));
        }

        // Ordinals stacked at this depth or deeper are resolved now: the
        // current ordinal is either their next sibling or proof that their
        // subtree is over.
        while let Some(top) = self.stack.last() {
            if top.components.len() < depth {
                break;
            }
            let top = self.stack.pop().expect("peeked entry is poppable");
            if top.components.len() == depth && top.components[..depth - 1] == components[..depth - 1]
            {
                self.siblings[top.ord as usize] = ord;
            }
        }

        match next {
            // A deeper label right after this one is, in sorted order, a
            // direct child of it.
            Some(next) if next.len() > depth => {
                self.has_children.insert(ord);
                self.stack.push(StackEntry { ord, components });
            }
            // A same-depth label right after this one is a sibling: no
            // descendant of this ordinal can exist, it would have sorted
            // in between.
            Some(next) if next.len() == depth => self.siblings[ord as usize] = ord + 1,
            _ => (),
        }
    }
}

/// Lazily opened per-segment cursors resolving global ordinals to labels
/// and back. One cursor serves one result-assembly pass.
pub(crate) struct LabelCursor<'a> {
    state: &'a SortedSetFacetState,
    dvs: Vec<Option<Box<dyn SortedSetDocValues + 'a>>>,
}

impl<'a> LabelCursor<'a> {
    fn dv(&mut self, seg: usize) -> Result<&mut Box<dyn SortedSetDocValues + 'a>> {
        match &mut self.dvs[seg] {
            Some(dv) => Ok(dv),
            slot @ None => {
                let state = self.state;
                let dv = state.segments[seg]
                    .reader
                    .sorted_set_doc_values(&state.field)?
                    .ok_or_else(|| UserError::MissingDocValues {
                        field: state.field.clone(),
                        expected: DocValuesType::SortedSet,
                    })?;
                Ok(slot.insert(dv))
            }
        }
    }

    fn label_bytes(&mut self, global_ord: u32) -> Result<Vec<u8>> {
        let state = self.state;
        match &state.ordinal_map {
            Some(map) => {
                let (seg, seg_ord) = map.owner(global_ord);
                self.dv(seg)?.lookup_ord(seg_ord)
            }
            None => self.dv(0)?.lookup_ord(global_ord),
        }
    }

    /// The decoded path components of a global ordinal.
    pub fn label_components(&mut self, global_ord: u32) -> Result<Vec<String>> {
        let bytes = self.label_bytes(global_ord)?;
        let label = std::str::from_utf8(&bytes).map_err(InternalError::from)?;
        Ok(facet_path::string_to_path(label))
    }

    /// The global ordinal of an exact path, or `None` if not indexed.
    pub fn ord(&mut self, components: &[&str]) -> Result<Option<u32>> {
        let target = facet_path::path_to_string(components).into_bytes();
        let state = self.state;
        match &state.ordinal_map {
            None => self.dv(0)?.lookup_term(&target),
            Some(_) => {
                // The global space has no dictionary of its own, binary
                // search it through the owning segments.
                let mut lo = 0;
                let mut hi = state.value_count;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    match self.label_bytes(mid)?.as_slice().cmp(target.as_slice()) {
                        std::cmp::Ordering::Less => lo = mid + 1,
                        std::cmp::Ordering::Greater => hi = mid,
                        std::cmp::Ordering::Equal => return Ok(Some(mid)),
                    }
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;
    use crate::test_index::TestIndex;

    fn hierarchical_state(paths: &[&[&str]]) -> (TestIndex, SortedSetFacetState) {
        let index = TestIndex::hierarchical("places", paths);
        let state =
            SortedSetFacetState::new(index.reader(), "places", FacetLayout::Hierarchical).unwrap();
        (index, state)
    }

    #[test]
    fn flat_state_ranges_cover_the_dictionary() {
        let index = TestIndex::flat(
            "tags",
            &[&[("colour", "red")], &[("colour", "blue"), ("size", "xl")], &[("size", "s")]],
        );
        let state = SortedSetFacetState::new(index.reader(), "tags", FacetLayout::Flat).unwrap();

        assert_eq!(state.value_count(), 4);
        assert_eq!(state.layout(), FacetLayout::Flat);
        // Labels sort as colour/blue, colour/red, size/s, size/xl.
        assert_eq!(state.dim_range("colour"), Some(OrdRange { start: 0, end: 1 }));
        assert_eq!(state.dim_range("size"), Some(OrdRange { start: 2, end: 3 }));
        assert_eq!(state.dim_range("brand"), None);
    }

    #[test]
    fn flat_state_rejects_deep_labels() {
        let index = TestIndex::hierarchical("tags", &[&["a", "b", "c"]]);
        let error = SortedSetFacetState::new(index.reader(), "tags", FacetLayout::Flat).unwrap_err();
        assert!(matches!(
            error,
            crate::Error::UserError(UserError::InvalidFlatLabel { .. })
        ));
    }

    #[test]
    fn missing_field_is_an_error() {
        let index = TestIndex::flat("tags", &[&[("colour", "red")]]);
        let error = SortedSetFacetState::new(index.reader(), "nope", FacetLayout::Flat).unwrap_err();
        assert!(matches!(
            error,
            crate::Error::UserError(UserError::MissingDocValues { .. })
        ));
    }

    #[test]
    fn hierarchical_tree_links_children_and_siblings() {
        // Dictionary order: a, a/b, a/b/c, a/d, b, b/e.
        let (_index, state) =
            hierarchical_state(&[&["a", "b", "c"], &["a", "d"], &["b", "e"]]);
        assert_eq!(state.value_count(), 6);

        let LayoutState::Hierarchical { tree } = state.layout_state() else {
            panic!("expected a hierarchical layout");
        };
        assert_eq!(tree.dims(), &[(S("a"), 0), (S("b"), 4)]);
        assert_eq!(tree.children(0).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(tree.children(1).collect::<Vec<_>>(), vec![2]);
        assert_eq!(tree.children(2).collect::<Vec<_>>(), Vec::<u32>::new());
        assert_eq!(tree.children(3).collect::<Vec<_>>(), Vec::<u32>::new());
        assert_eq!(tree.children(4).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn tree_walk_visits_every_ordinal_once() {
        let (_index, state) = hierarchical_state(&[
            &["a", "b", "c"],
            &["a", "b", "d"],
            &["a", "e"],
            &["b"],
            &["c", "f", "g", "h"],
            &["c", "f", "i"],
        ]);

        let LayoutState::Hierarchical { tree } = state.layout_state() else {
            panic!("expected a hierarchical layout");
        };

        let mut seen = RoaringBitmap::new();
        let mut stack: Vec<u32> = tree.dims().iter().map(|(_, ord)| *ord).collect();
        while let Some(ord) = stack.pop() {
            assert!(seen.insert(ord), "ordinal {ord} visited twice");
            stack.extend(tree.children(ord));
        }
        assert_eq!(seen.len(), u64::from(state.value_count()));
    }

    #[test]
    fn label_cursor_resolves_paths_in_both_directions() {
        let (_index, state) = hierarchical_state(&[&["a", "b", "c"], &["a", "d"]]);
        let mut cursor = state.label_cursor();

        let ord = cursor.ord(&["a", "b"]).unwrap().unwrap();
        assert_eq!(cursor.label_components(ord).unwrap(), vec![S("a"), S("b")]);
        assert_eq!(cursor.ord(&["a", "z"]).unwrap(), None);
    }
}
