#![allow(clippy::type_complexity)]

mod error;
pub mod facet_path;
pub mod facet_set;
pub mod index;
pub mod range;
mod result;
pub mod sorted_set;
pub mod value_encoding;

#[cfg(test)]
pub(crate) mod test_index;

pub use self::error::{Error, InternalError, UserError};
pub use self::facet_set::{
    CountMode, DimRange, DoubleFacetSet, ExactFacetSetMatcher, FacetSet, FacetSetMatcher,
    FloatFacetSet, IntFacetSet, LongFacetSet, MatchingFacetSetsCounts, RangeFacetSetMatcher,
};
pub use self::index::{
    BinaryDocValues, DocValuesType, FacetHits, IndexReader, LeafReader, MatchingDocs, ReaderKey,
    SegmentContext, SortedSetDocValues,
};
pub use self::range::{
    DoubleRange, FloatRange, IntRange, LongRange, QueryType, RangeOnRangeFacetCounts,
};
pub use self::result::{FacetResult, LabelAndValue};
pub use self::sorted_set::{FacetLayout, OrdRange, OrdinalFacetCounts, SortedSetFacetState};

pub type Result<T> = std::result::Result<T, error::Error>;

/// A document identifier, local to its segment.
pub type DocumentId = u32;

/// The sentinel ordinal, used where the ordinal space needs a "none" value.
pub const INVALID_ORDINAL: u32 = u32::MAX;
