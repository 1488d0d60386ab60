//! A stand-in for the visual search service.
//!
//! Serves the six endpoints with canned bodies that echo the request
//! parameters, so client round trips can be checked end to end without the
//! real service. Failures are reported the way the service does it: HTTP 200
//! with `status: fail` and an `error` list.

use axum::{
    extract::Query,
    http::HeaderName,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::debug;
use uuid::Uuid;

pub const LOG_ID_HEADER: &str = "x-log-id";

const DEFAULT_LIMIT: usize = 10;
const TOTAL: usize = 100;

/// Multi-valued request parameters in arrival order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(Vec<(String, String)>);

impl RequestParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    fn number(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse().ok())
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/colorsearch", get(color_search))
        .route("/uploadsearch", post(upload_search))
        .route("/discoversearch", post(discover_search))
        .route("/similarproducts", post(similar_products))
        .route("/extractfeature", post(extract_feature))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Wraps a body with a fresh request ID, both in `reqid` and the log header.
fn respond(mut body: Value) -> Response {
    let req_id = Uuid::new_v4().simple().to_string();
    body["reqid"] = Value::String(req_id.clone());
    (
        [(HeaderName::from_static(LOG_ID_HEADER), req_id)],
        Json(body),
    )
        .into_response()
}

fn fail(method: &str, message: &str) -> Response {
    respond(json!({
        "status": "fail",
        "method": method,
        "error": [message],
        "total": 0,
    }))
}

/// Builds the paged part of a search body: page, limit, total, items,
/// facets and query info.
fn paged(method: &str, prefix: &str, params: &RequestParams) -> Value {
    let page = params.number("page").unwrap_or(1);
    let limit = params.number("limit").unwrap_or(DEFAULT_LIMIT);
    let with_score = params.flag("score");
    let fields = params.get_all("fl");

    let result: Vec<Value> = (0..limit)
        .map(|i| {
            let rank = page.saturating_sub(1) * limit + i;
            let mut item = json!({ "im_name": format!("{prefix}_{rank}") });
            if with_score {
                item["score"] = json!(1.0 / (rank as f64 + 1.0));
            }
            if !fields.is_empty() {
                let value_map: serde_json::Map<String, Value> = fields
                    .iter()
                    .map(|field| (field.to_string(), json!(format!("{field}-{rank}"))))
                    .collect();
                item["value_map"] = Value::Object(value_map);
            }
            item
        })
        .collect();

    let facets: Vec<Value> = params
        .get_all("facets")
        .into_iter()
        .map(|key| {
            let count = params.flag("facets_show_count");
            let items: Vec<Value> = ["a", "b"]
                .iter()
                .map(|v| {
                    let mut item = json!({ "value": format!("{key}-{v}") });
                    if count {
                        item["count"] = json!(limit);
                    }
                    item
                })
                .collect();
            json!({ "key": key, "items": items })
        })
        .collect();

    let mut body = json!({
        "status": "OK",
        "method": method,
        "error": [],
        "page": page,
        "limit": limit,
        "total": TOTAL,
        "result": result,
    });
    if !facets.is_empty() {
        body["facets"] = Value::Array(facets);
    }
    if params.flag("qinfo") {
        body["qinfo"] = json!({ "source": prefix });
    }
    body
}

/// Name of the query image of an upload-style request.
fn upload_source(params: &RequestParams) -> Option<String> {
    if let Some(url) = params.get("im_url") {
        return Some(url.rsplit('/').next().unwrap_or(url).to_string());
    }
    if let Some(im_id) = params.get("im_id") {
        return Some(im_id.to_string());
    }
    params
        .get("trans_id")
        .filter(|_| params.get("im_feature").is_some())
        .map(str::to_string)
}

fn detected(params: &RequestParams) -> Vec<Value> {
    let kind = params.get("detection").unwrap_or("top");
    vec![json!({
        "type": kind,
        "attributes": {},
        "score": 0.98,
        "box": [10, 20, 310, 420],
    })]
}

fn type_catalogue() -> Value {
    json!([
        { "type": "bag", "attributes_list": {} },
        { "type": "shoe", "attributes_list": { "gender": ["men", "women"] } },
        { "type": "top", "attributes_list": { "gender": ["men", "women"] } },
    ])
}

async fn search(Query(params): Query<RequestParams>) -> Response {
    debug!(?params, "search");
    match params.get("im_name") {
        Some(im_name) => respond(paged("search", im_name, &params)),
        None => fail("search", "im_name is required."),
    }
}

async fn color_search(Query(params): Query<RequestParams>) -> Response {
    debug!(?params, "colorsearch");
    match params.get("color") {
        Some(color) if color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit()) => {
            respond(paged("colorsearch", color, &params))
        }
        _ => fail("colorsearch", "A six digit hexadecimal color is required."),
    }
}

async fn upload_search(Form(params): Form<RequestParams>) -> Response {
    debug!(?params, "uploadsearch");
    let Some(source) = upload_source(&params) else {
        return fail("uploadsearch", "An image URL, image ID or feature is required.");
    };
    let mut body = paged("uploadsearch", &source, &params);
    body["im_id"] = json!(source);
    body["product_types"] = Value::Array(detected(&params));
    body["product_types_list"] = type_catalogue();
    respond(body)
}

/// Discover and similar-products share one shape: per-object results, no
/// top-level total.
fn objects_body(method: &str, params: &RequestParams) -> Response {
    let Some(source) = upload_source(params) else {
        return fail(method, "An image URL, image ID or feature is required.");
    };
    let limit = params.number("result_limit").unwrap_or(DEFAULT_LIMIT);
    let objects: Vec<Value> = detected(params)
        .into_iter()
        .map(|mut object| {
            let kind = object["type"].as_str().unwrap_or("top").to_string();
            object["total"] = json!(TOTAL);
            object["result"] = (0..limit)
                .map(|i| json!({ "im_name": format!("{source}_{kind}_{i}") }))
                .collect();
            object["facets"] = json!([]);
            object
        })
        .collect();
    respond(json!({
        "status": "OK",
        "method": method,
        "error": [],
        "page": 1,
        "result_limit": limit,
        "objects": objects,
        "object_types_list": type_catalogue(),
        "im_id": source,
    }))
}

async fn discover_search(Form(params): Form<RequestParams>) -> Response {
    debug!(?params, "discoversearch");
    objects_body("discoversearch", &params)
}

async fn similar_products(Form(params): Form<RequestParams>) -> Response {
    debug!(?params, "similarproducts");
    objects_body("similarproducts", &params)
}

async fn extract_feature(Form(params): Form<RequestParams>) -> Response {
    debug!(?params, "extractfeature");
    let Some(source) = upload_source(&params) else {
        return fail("extractfeature", "An image URL, image ID or feature is required.");
    };
    respond(json!({
        "status": "OK",
        "method": "extractfeature",
        "error": [],
        "result": [format!("feature-{source}")],
        "product_types": detected(&params),
        "product_types_list": type_catalogue(),
        "im_id": source,
    }))
}
