//! Result entities returned by the search operations.
//!
//! # Design
//! Every entity is built once from a single response and handed to the
//! caller by value. Shapes that vary per entry are modelled as enums
//! (`FacetValues`) rather than optional-everything structs. `ImageResult`
//! carries an open `Metadata` map for the fields the service adds per index
//! schema; those are captured in the order they appear in the response.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ErrorKind, ResponseError};

/// Ordered string map for open-ended response fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(Vec<(String, String)>);

impl Metadata {
    /// Sets `key`, replacing the value in place if it was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Folds a JSON object in, rendering non-string values as compact JSON.
    pub(crate) fn extend_from_json(&mut self, object: Map<String, Value>) {
        for (key, value) in object {
            if !value.is_null() {
                self.insert(key, json_to_string(value));
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::default();
        for (k, v) in iter {
            metadata.insert(k, v);
        }
        metadata
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        let mut metadata = Metadata::default();
        metadata.extend_from_json(object);
        Ok(metadata)
    }
}

fn json_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Reads an absent or `null` field as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads a result list, skipping items that carry no `im_name`.
pub(crate) fn image_results<'de, D>(deserializer: D) -> Result<Vec<ImageResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<Map<String, Value>> = null_as_default(deserializer)?;
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        if matches!(item.get("im_name"), None | Some(Value::Null)) {
            warn!(fields = item.len(), "result item without im_name skipped");
            continue;
        }
        results.push(ImageResult::try_from(item).map_err(serde::de::Error::custom)?);
    }
    Ok(results)
}

/// One matched image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ImageResult {
    pub im_name: String,
    pub score: Option<f64>,
    /// `value_map` entries followed by any other field of the item.
    pub metadata: Metadata,
}

impl TryFrom<Map<String, Value>> for ImageResult {
    type Error = String;

    fn try_from(mut item: Map<String, Value>) -> Result<Self, Self::Error> {
        let im_name = match item.remove("im_name") {
            Some(Value::String(name)) => name,
            Some(other) => return Err(format!("im_name must be a string, got {other}")),
            None => return Err("result item without im_name".to_string()),
        };
        let score = match item.remove("score") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(other) => return Err(format!("score must be a number, got {other}")),
        };

        let mut metadata = Metadata::default();
        match item.remove("value_map") {
            None | Some(Value::Null) => {}
            Some(Value::Object(values)) => metadata.extend_from_json(values),
            Some(other) => return Err(format!("value_map must be an object, got {other}")),
        }
        metadata.extend_from_json(item);

        Ok(Self {
            im_name,
            score,
            metadata,
        })
    }
}

/// A value bucket of an item-style facet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FacetItem {
    pub value: String,
    /// Absent unless `facets_show_count` was requested.
    pub count: Option<u32>,
}

/// Bounds of a numeric facet.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FacetRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FacetValues {
    Items(Vec<FacetItem>),
    Range(FacetRange),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawFacet")]
pub struct Facet {
    pub key: String,
    pub values: FacetValues,
}

impl Facet {
    /// Buckets of an item-style facet; empty for a range facet.
    pub fn items(&self) -> &[FacetItem] {
        match &self.values {
            FacetValues::Items(items) => items,
            FacetValues::Range(_) => &[],
        }
    }

    pub fn range(&self) -> Option<FacetRange> {
        match self.values {
            FacetValues::Range(range) => Some(range),
            FacetValues::Items(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct RawFacet {
    key: String,
    items: Option<Vec<FacetItem>>,
    range: Option<FacetRange>,
}

impl TryFrom<RawFacet> for Facet {
    type Error = String;

    fn try_from(raw: RawFacet) -> Result<Self, Self::Error> {
        let values = match (raw.items, raw.range) {
            (Some(_), Some(_)) => {
                return Err(format!("facet {} has both items and range", raw.key));
            }
            (Some(items), None) => FacetValues::Items(items),
            (None, Some(range)) => FacetValues::Range(range),
            (None, None) => FacetValues::Items(Vec::new()),
        };
        Ok(Self {
            key: raw.key,
            values,
        })
    }
}

/// Results sharing one value of the `group_by` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupSearchResult {
    pub group_by_value: String,
    #[serde(default, deserialize_with = "image_results")]
    pub result: Vec<ImageResult>,
}

/// A detected region, or an entry of a supported-types catalogue.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductType {
    #[serde(rename = "type")]
    pub product_type: String,
    pub score: Option<f64>,
    /// `[x1, y1, x2, y2]` in image pixels.
    #[serde(rename = "box")]
    pub bounding_box: Option<[i32; 4]>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Map<String, Value>,
    /// Attribute name to allowed values, filled on catalogue entries.
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes_list: BTreeMap<String, Vec<String>>,
}

/// A detected object together with the results searched within its region.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectSearchResult {
    #[serde(rename = "type")]
    pub product_type: String,
    pub score: Option<f64>,
    #[serde(rename = "box")]
    pub bounding_box: Option<[i32; 4]>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Map<String, Value>,
    pub total: Option<u32>,
    #[serde(default, deserialize_with = "image_results")]
    pub result: Vec<ImageResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub facets: Vec<Facet>,
}

/// Result of the search, color, upload, discover and similar-products
/// operations.
///
/// Check `error` before trusting any payload field: a failed result keeps
/// only `raw_json`, `headers` and the error itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagedSearchResult {
    pub error: Option<ResponseError>,
    /// The response body exactly as received.
    pub raw_json: String,
    pub headers: HashMap<String, String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub total: Option<u32>,
    pub group_limit: Option<u32>,
    pub group_by_key: Option<String>,
    pub result: Vec<ImageResult>,
    pub facets: Vec<Facet>,
    pub group_results: Vec<GroupSearchResult>,
    pub product_types: Vec<ProductType>,
    pub product_types_list: Vec<ProductType>,
    pub objects: Vec<ObjectSearchResult>,
    pub object_types_list: Vec<ProductType>,
    pub query_info: Option<Metadata>,
    pub im_id: Option<String>,
    pub req_id: Option<String>,
}

/// Result of `extract_feature`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureResponseResult {
    pub error: Option<ResponseError>,
    pub raw_json: String,
    pub headers: HashMap<String, String>,
    /// Opaque feature strings, usable with `UploadSearchParams::from_feature`.
    pub result: Vec<String>,
    pub product_types: Vec<ProductType>,
    pub product_types_list: Vec<ProductType>,
    pub im_id: Option<String>,
    pub req_id: Option<String>,
}

macro_rules! impl_error_accessors {
    ($($ty:ty),*) => {
        $(impl $ty {
            pub(crate) fn failed(error: ResponseError, raw_json: String, headers: HashMap<String, String>) -> Self {
                Self {
                    error: Some(error),
                    raw_json,
                    headers,
                    ..Default::default()
                }
            }

            pub fn has_error(&self) -> bool {
                self.error_message().is_some_and(|m| !m.is_empty())
            }

            pub fn error_message(&self) -> Option<&str> {
                self.error.as_ref().map(|e| e.message.as_str())
            }

            pub fn error_kind(&self) -> Option<ErrorKind> {
                self.error.as_ref().map(|e| e.kind)
            }

            pub fn cause(&self) -> Option<&str> {
                self.error.as_ref().and_then(|e| e.cause.as_deref())
            }

            /// The raw body, but only when the result carries an error.
            pub fn raw_response_message(&self) -> Option<&str> {
                self.error.as_ref().map(|_| self.raw_json.as_str())
            }
        })*
    };
}

impl_error_accessors!(PagedSearchResult, FeatureResponseResult);
