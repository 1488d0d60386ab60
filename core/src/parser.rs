//! Parses raw response bodies into result objects.
//!
//! # Design
//! Parsing never fails outward. Each body goes through three gates and the
//! first one that rejects it decides the error classification:
//!
//! 1. JSON syntax. Failure is a parse error.
//! 2. The envelope: an object carrying the fields the operation requires,
//!    with `status` equal to `OK`. A missing field is an invalid format; a
//!    failure status is an application error when the service sent a message
//!    and an invalid format otherwise.
//! 3. Typed extraction of the payload. A known field with the wrong JSON type
//!    is a parse error.
//!
//! Unknown top-level fields are ignored. Unknown fields of a result item are
//! kept in its metadata (see `ImageResult`).

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::client::Operation;
use crate::error::{ErrorKind, ResponseError};
use crate::http::HttpResponse;
use crate::types::{
    image_results, null_as_default, FeatureResponseResult, Facet, GroupSearchResult, ImageResult,
    Metadata, ObjectSearchResult, PagedSearchResult, ProductType,
};

const STATUS_OK: &str = "OK";

#[derive(Deserialize)]
struct SearchPayload {
    page: Option<u32>,
    limit: Option<u32>,
    total: Option<u32>,
    group_limit: Option<u32>,
    group_by_key: Option<String>,
    #[serde(default, deserialize_with = "image_results")]
    result: Vec<ImageResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    facets: Vec<Facet>,
    #[serde(default, deserialize_with = "null_as_default")]
    group_results: Vec<GroupSearchResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    product_types: Vec<ProductType>,
    #[serde(default, deserialize_with = "null_as_default")]
    product_types_list: Vec<ProductType>,
    qinfo: Option<Metadata>,
    im_id: Option<String>,
    reqid: Option<String>,
}

#[derive(Deserialize)]
struct ObjectsPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    objects: Vec<ObjectSearchResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    object_types_list: Vec<ProductType>,
}

#[derive(Deserialize)]
struct FeaturePayload {
    #[serde(default, deserialize_with = "null_as_default")]
    result: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    product_types: Vec<ProductType>,
    #[serde(default, deserialize_with = "null_as_default")]
    product_types_list: Vec<ProductType>,
    im_id: Option<String>,
    reqid: Option<String>,
}

/// Parses the response of any paged search operation.
pub fn parse_search_response(operation: Operation, response: HttpResponse) -> PagedSearchResult {
    let headers = response.header_map();
    match build_search_result(operation, &response.body) {
        Ok(mut result) => {
            result.raw_json = response.body;
            result.headers = headers;
            result
        }
        Err(err) => {
            log_rejection(operation, &err);
            PagedSearchResult::failed(err, response.body, headers)
        }
    }
}

/// Parses the response of `extract_feature`.
pub fn parse_feature_response(response: HttpResponse) -> FeatureResponseResult {
    let headers = response.header_map();
    match build_feature_result(&response.body) {
        Ok(mut result) => {
            result.raw_json = response.body;
            result.headers = headers;
            result
        }
        Err(err) => {
            log_rejection(Operation::ExtractFeature, &err);
            FeatureResponseResult::failed(err, response.body, headers)
        }
    }
}

fn log_rejection(operation: Operation, err: &ResponseError) {
    warn!(
        operation = operation.name(),
        kind = ?err.kind,
        message = %err.message,
        cause = err.cause.as_deref().unwrap_or(""),
        "visual search response rejected"
    );
}

fn build_search_result(operation: Operation, body: &str) -> Result<PagedSearchResult, ResponseError> {
    let value = check_envelope(body, operation.required_fields())?;
    let payload = SearchPayload::deserialize(&value).map_err(parse_error)?;

    let mut result = PagedSearchResult {
        page: payload.page,
        limit: payload.limit,
        total: payload.total,
        group_limit: payload.group_limit,
        group_by_key: payload.group_by_key,
        result: payload.result,
        facets: payload.facets,
        group_results: payload.group_results,
        product_types: payload.product_types,
        product_types_list: payload.product_types_list,
        query_info: payload.qinfo,
        im_id: payload.im_id,
        req_id: payload.reqid,
        ..Default::default()
    };

    if operation.parses_objects() {
        let objects = ObjectsPayload::deserialize(&value).map_err(parse_error)?;
        result.objects = objects.objects;
        result.object_types_list = objects.object_types_list;
    }
    Ok(result)
}

fn build_feature_result(body: &str) -> Result<FeatureResponseResult, ResponseError> {
    let value = check_envelope(body, Operation::ExtractFeature.required_fields())?;
    let payload = FeaturePayload::deserialize(&value).map_err(parse_error)?;
    Ok(FeatureResponseResult {
        result: payload.result,
        product_types: payload.product_types,
        product_types_list: payload.product_types_list,
        im_id: payload.im_id,
        req_id: payload.reqid,
        ..Default::default()
    })
}

fn parse_error(err: serde_json::Error) -> ResponseError {
    ResponseError::new(ErrorKind::ParseError).with_cause(err)
}

/// Runs the syntax and envelope gates, returning the parsed document.
fn check_envelope(body: &str, required: &[&str]) -> Result<Value, ResponseError> {
    let value: Value = serde_json::from_str(body).map_err(parse_error)?;

    let Some(object) = value.as_object() else {
        return Err(ResponseError::new(ErrorKind::InvalidFormat)
            .with_cause("response body is not a JSON object"));
    };
    if let Some(missing) = required.iter().find(|field| !object.contains_key(**field)) {
        return Err(ResponseError::new(ErrorKind::InvalidFormat)
            .with_cause(format!("missing field `{missing}`")));
    }

    if object.get("status").and_then(Value::as_str) != Some(STATUS_OK) {
        let message = match object.get("error") {
            Some(Value::Array(errors)) => errors.first().map(error_text),
            Some(Value::String(error)) => Some(error.clone()),
            _ => None,
        };
        return Err(match message {
            Some(message) if !message.is_empty() => ResponseError::application(message),
            _ => ResponseError::new(ErrorKind::InvalidFormat),
        });
    }
    Ok(value)
}

fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
