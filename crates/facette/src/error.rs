use std::io;

use thiserror::Error;

use crate::index::DocValuesType;

#[derive(Error, Debug)]
pub enum Error {
    #[error("internal: {0}.")]
    InternalError(#[from] InternalError),
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    UserError(#[from] UserError),
}

#[derive(Error, Debug)]
pub enum InternalError {
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
    #[error("the facet set payload of field `{field}` is malformed: {reason}")]
    InvalidFacetSetPayload { field: String, reason: &'static str },
    #[error("the range payload of field `{field}` is malformed: {reason}")]
    InvalidRangePayload { field: String, reason: &'static str },
    #[error("the `{field}` dictionary is not sorted, label `{label}` appears out of order")]
    DictionaryNotSorted { field: String, label: String },
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error("`top_n` must be strictly positive, got {0}")]
    InvalidTopN(usize),
    #[error("the `{field}` facet dictionary holds {count} entries, more than the supported maximum")]
    DictionaryTooLarge { field: String, count: u64 },
    #[error("the facet label `{label}` of field `{field}` is not a `dim/value` pair")]
    InvalidFlatLabel { field: String, label: String },
    #[error("the flat facet dimension `{dim}` only supports `dim/value` paths")]
    InvalidFlatPath { dim: String },
    #[error("the hits were collected against another reader than the one this state was built from")]
    ReaderMismatch,
    #[error("unexpected {actual} doc-values for field `{field}`, expected {expected}")]
    InvalidDocValuesType { field: String, expected: DocValuesType, actual: DocValuesType },
    #[error("field `{field}` was not indexed with {expected} doc-values")]
    MissingDocValues { field: String, expected: DocValuesType },
    #[error("NaN is not a valid range bound")]
    NanRangeBound,
    #[error("`{min}` is greater than `{max}` after normalisation, the range matches nothing")]
    EmptyRange { min: String, max: String },
    #[error("the exclusive bound `{value}` sits at the limit of its type and cannot be normalised")]
    RangeBoundOverflow { value: String },
    #[error("expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("at least one facet set is required")]
    EmptyFacetSets,
    #[error("at least one facet set matcher is required")]
    NoFacetSetMatchers,
    #[error("unknown dimension `{dim}`, this counter only answers for `{field}`")]
    UnexpectedDimension { dim: String, field: String },
}
