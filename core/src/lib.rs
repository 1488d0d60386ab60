//! Synchronous client core for a visual search service.
//!
//! # Overview
//! Turns typed request objects into multi-valued form parameters, hands them
//! to an injected `Transport`, and parses the JSON bodies that come back into
//! typed results. The network itself stays outside the crate.
//!
//! # Design
//! - `SearchClient` is stateless apart from its transport.
//! - Only parameter constructors raise (`ClientError`). Transport, remote and
//!   parse failures are recovered into the result's `error`, and the raw body
//!   is always kept for diagnostics.
//! - Response shapes that vary are parsed tolerantly: unknown top-level
//!   fields are ignored, unknown item fields land in `ImageResult::metadata`.

pub mod client;
pub mod error;
pub mod http;
pub mod params;
pub mod parser;
pub mod types;

pub use client::{Operation, SearchClient};
pub use error::{ClientError, ErrorKind, ResponseError, TransportError};
pub use http::{HttpMethod, HttpResponse, ImageUpload, Transport};
pub use params::{
    BaseSearchParams, ColorSearchParams, ImageSource, Params, SearchOptions, SearchParams,
    ToParams, UploadSearchParams,
};
pub use parser::{parse_feature_response, parse_search_response};
pub use types::{
    Facet, FacetItem, FacetRange, FacetValues, FeatureResponseResult, GroupSearchResult,
    ImageResult, Metadata, ObjectSearchResult, PagedSearchResult, ProductType,
};
