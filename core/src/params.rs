//! Typed request parameters and their encoding into a multi-valued set.
//!
//! # Design
//! Each request type owns a primary selector (image name, color code, image
//! source) plus a shared `BaseSearchParams` block of optional filters. The
//! chained setters live on the `SearchOptions` trait so every request type
//! gets them from one place. `ToParams` turns a request into `Params`, an
//! ordered multimap: unset fields are never emitted, repeated keys keep the
//! order they were produced in, and the `score` flag is always present.

use std::path::{Path, PathBuf};

use url::form_urlencoded;

use crate::error::ClientError;

/// Ordered multi-valued parameter set sent as a query string or form body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    fn push_opt<V: ToString>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    /// First value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value recorded under `key`, in emission order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
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

    /// `application/x-www-form-urlencoded` rendering, usable as a query
    /// string or a form body.
    pub fn to_form_urlencoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Encodes a request object into the parameters sent to the service.
pub trait ToParams {
    fn to_params(&self) -> Params;
}

/// Optional filters shared by every search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseSearchParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub score: Option<bool>,
    pub score_min: Option<f32>,
    pub score_max: Option<f32>,
    /// Exact-match field filters, sent as `key:value` in insertion order.
    pub fq: Vec<(String, String)>,
    /// Metadata fields to return.
    pub fl: Vec<String>,
    pub get_all_fl: Option<bool>,
    pub qinfo: Option<bool>,
    pub facets: Vec<String>,
    pub facets_limit: Option<u32>,
    pub facets_show_count: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_group_by: Option<String>,
    pub sort_group_strategy: Option<String>,
    pub group_by: Option<String>,
    pub group_limit: Option<u32>,
    /// Free-form parameters sent under their own names, in insertion order.
    pub custom: Vec<(String, String)>,
}

impl BaseSearchParams {
    fn encode_into(&self, params: &mut Params) {
        params.push_opt("page", self.page);
        params.push_opt("limit", self.limit);
        params.push("score", self.score.unwrap_or(false));
        params.push_opt("score_min", self.score_min);
        params.push_opt("score_max", self.score_max);
        for (field, value) in &self.fq {
            params.push("fq", format!("{field}:{value}"));
        }
        for field in &self.fl {
            params.push("fl", field);
        }
        params.push_opt("get_all_fl", self.get_all_fl);
        params.push_opt("qinfo", self.qinfo);
        for facet in &self.facets {
            params.push("facets", facet);
        }
        params.push_opt("facets_limit", self.facets_limit);
        params.push_opt("facets_show_count", self.facets_show_count);
        params.push_opt("sort_by", self.sort_by.as_deref());
        params.push_opt("sort_group_by", self.sort_group_by.as_deref());
        params.push_opt("sort_group_strategy", self.sort_group_strategy.as_deref());
        params.push_opt("group_by", self.group_by.as_deref());
        params.push_opt("group_limit", self.group_limit);
        for (key, value) in &self.custom {
            params.push(key.as_str(), value);
        }
    }
}

/// Sets `key` in an ordered entry list. An existing key keeps its position.
fn upsert(entries: &mut Vec<(String, String)>, key: String, value: String) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

/// Chained setters for the shared filters.
pub trait SearchOptions: Sized {
    fn base(&self) -> &BaseSearchParams;
    fn base_mut(&mut self) -> &mut BaseSearchParams;

    fn page(mut self, page: u32) -> Self {
        self.base_mut().page = Some(page);
        self
    }

    fn limit(mut self, limit: u32) -> Self {
        self.base_mut().limit = Some(limit);
        self
    }

    fn score(mut self, score: bool) -> Self {
        self.base_mut().score = Some(score);
        self
    }

    fn score_min(mut self, score_min: f32) -> Self {
        self.base_mut().score_min = Some(score_min);
        self
    }

    fn score_max(mut self, score_max: f32) -> Self {
        self.base_mut().score_max = Some(score_max);
        self
    }

    fn fq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        upsert(&mut self.base_mut().fq, field.into(), value.into());
        self
    }

    fn fl<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_mut().fl = fields.into_iter().map(Into::into).collect();
        self
    }

    fn get_all_fl(mut self, get_all_fl: bool) -> Self {
        self.base_mut().get_all_fl = Some(get_all_fl);
        self
    }

    fn qinfo(mut self, qinfo: bool) -> Self {
        self.base_mut().qinfo = Some(qinfo);
        self
    }

    fn facets<I, S>(mut self, facets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_mut().facets = facets.into_iter().map(Into::into).collect();
        self
    }

    fn facets_limit(mut self, facets_limit: u32) -> Self {
        self.base_mut().facets_limit = Some(facets_limit);
        self
    }

    fn facets_show_count(mut self, show_count: bool) -> Self {
        self.base_mut().facets_show_count = Some(show_count);
        self
    }

    /// Sort directive such as `price:asc`.
    fn sort_by(mut self, sort_by: impl Into<String>) -> Self {
        self.base_mut().sort_by = Some(sort_by.into());
        self
    }

    fn sort_group_by(mut self, sort_group_by: impl Into<String>) -> Self {
        self.base_mut().sort_group_by = Some(sort_group_by.into());
        self
    }

    fn sort_group_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.base_mut().sort_group_strategy = Some(strategy.into());
        self
    }

    fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.base_mut().group_by = Some(group_by.into());
        self
    }

    fn group_limit(mut self, group_limit: u32) -> Self {
        self.base_mut().group_limit = Some(group_limit);
        self
    }

    fn custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        upsert(&mut self.base_mut().custom, key.into(), value.into());
        self
    }
}

macro_rules! impl_search_options {
    ($($ty:ty),*) => {
        $(impl SearchOptions for $ty {
            fn base(&self) -> &BaseSearchParams {
                &self.base
            }

            fn base_mut(&mut self) -> &mut BaseSearchParams {
                &mut self.base
            }
        })*
    };
}

impl_search_options!(SearchParams, ColorSearchParams, UploadSearchParams);

/// Search by the name of an image already in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    im_name: String,
    pub base: BaseSearchParams,
}

impl SearchParams {
    pub fn new(im_name: impl Into<String>) -> Self {
        Self {
            im_name: im_name.into(),
            base: BaseSearchParams::default(),
        }
    }

    pub fn im_name(&self) -> &str {
        &self.im_name
    }
}

impl ToParams for SearchParams {
    fn to_params(&self) -> Params {
        let mut params = Params::new();
        params.push("im_name", &self.im_name);
        self.base.encode_into(&mut params);
        params
    }
}

/// Search by a dominant color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorSearchParams {
    color: String,
    pub base: BaseSearchParams,
}

impl ColorSearchParams {
    /// `color` must be six hexadecimal digits without a leading `#`.
    pub fn new(color: impl Into<String>) -> Result<Self, ClientError> {
        let color = color.into();
        if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ClientError::InvalidColor(color));
        }
        Ok(Self {
            color,
            base: BaseSearchParams::default(),
        })
    }

    pub fn color(&self) -> &str {
        &self.color
    }
}

impl ToParams for ColorSearchParams {
    fn to_params(&self) -> Params {
        let mut params = Params::new();
        params.push("color", &self.color);
        self.base.encode_into(&mut params);
        params
    }
}

/// Where the query image of an upload-style request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Local file, read when the request is sent.
    File(PathBuf),
    /// Image bytes already in memory.
    Stream(Vec<u8>),
    Url(String),
    /// Identifier of an image uploaded by an earlier request.
    ImId(String),
    /// Feature vector from `extract_feature`, with its transaction ID.
    Feature { feature: String, trans_id: String },
}

/// Parameters for upload, discover, similar-products and feature extraction
/// requests.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSearchParams {
    image: ImageSource,
    pub base: BaseSearchParams,
    pub detection: Option<String>,
    pub detection_limit: Option<u32>,
    pub detection_sensitivity: Option<String>,
    pub result_limit: Option<u32>,
    /// Region of interest as `[x1, y1, x2, y2]`.
    pub bounding_box: Option<[i32; 4]>,
}

impl UploadSearchParams {
    fn with_source(image: ImageSource) -> Self {
        Self {
            image,
            base: BaseSearchParams::default(),
            detection: None,
            detection_limit: None,
            detection_sensitivity: None,
            result_limit: None,
            bounding_box: None,
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self::with_source(ImageSource::Url(url.into()))
    }

    pub fn from_im_id(im_id: impl Into<String>) -> Self {
        Self::with_source(ImageSource::ImId(im_id.into()))
    }

    pub fn from_feature(feature: impl Into<String>, trans_id: impl Into<String>) -> Self {
        Self::with_source(ImageSource::Feature {
            feature: feature.into(),
            trans_id: trans_id.into(),
        })
    }

    /// Fails on an empty path. A path that does not exist is accepted here and
    /// reported on the result of the operation that tries to read it.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ClientError::MissingImageFile);
        }
        Ok(Self::with_source(ImageSource::File(path)))
    }

    pub fn from_stream(bytes: impl Into<Vec<u8>>) -> Result<Self, ClientError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ClientError::MissingImageStream);
        }
        Ok(Self::with_source(ImageSource::Stream(bytes)))
    }

    pub fn image(&self) -> &ImageSource {
        &self.image
    }

    pub fn image_url(&self) -> Option<&str> {
        match &self.image {
            ImageSource::Url(url) => Some(url),
            _ => None,
        }
    }

    pub fn image_file(&self) -> Option<&Path> {
        match &self.image {
            ImageSource::File(path) => Some(path),
            _ => None,
        }
    }

    /// Product type to restrict detection to, e.g. `dress`.
    pub fn detection(mut self, detection: impl Into<String>) -> Self {
        self.detection = Some(detection.into());
        self
    }

    pub fn detection_limit(mut self, limit: u32) -> Self {
        self.detection_limit = Some(limit);
        self
    }

    pub fn detection_sensitivity(mut self, sensitivity: impl Into<String>) -> Self {
        self.detection_sensitivity = Some(sensitivity.into());
        self
    }

    pub fn result_limit(mut self, limit: u32) -> Self {
        self.result_limit = Some(limit);
        self
    }

    pub fn bounding_box(mut self, bounding_box: [i32; 4]) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}

impl ToParams for UploadSearchParams {
    fn to_params(&self) -> Params {
        let mut params = Params::new();
        match &self.image {
            ImageSource::Url(url) => params.push("im_url", url),
            ImageSource::ImId(im_id) => params.push("im_id", im_id),
            ImageSource::File(_) | ImageSource::Stream(_) | ImageSource::Feature { .. } => {}
        }
        self.base.encode_into(&mut params);
        params.push_opt("detection", self.detection.as_deref());
        params.push_opt("detection_limit", self.detection_limit);
        params.push_opt("detection_sensitivity", self.detection_sensitivity.as_deref());
        params.push_opt("result_limit", self.result_limit);
        if let Some([x1, y1, x2, y2]) = self.bounding_box {
            params.push("box", format!("{x1},{y1},{x2},{y2}"));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(params: &Params) -> Vec<(&str, &str)> {
        params.iter().collect()
    }

    #[test]
    fn basic_search_emits_name_and_score() {
        let params = SearchParams::new("test_im").to_params();
        assert_eq!(pairs(&params), vec![("im_name", "test_im"), ("score", "false")]);
    }

    #[test]
    fn facet_params() {
        let params = SearchParams::new("test_im")
            .facets(["brand"])
            .facets_limit(10)
            .facets_show_count(true)
            .to_params();
        assert_eq!(
            pairs(&params),
            vec![
                ("im_name", "test_im"),
                ("score", "false"),
                ("facets", "brand"),
                ("facets_limit", "10"),
                ("facets_show_count", "true"),
            ]
        );
    }

    #[test]
    fn full_search_params() {
        let params = SearchParams::new("test_im")
            .page(10)
            .limit(1)
            .score(true)
            .score_min(0.1)
            .score_max(0.75)
            .fq("field_a", "value_a")
            .fq("field_b", "value_b")
            .fl(["field_x", "field_y"])
            .get_all_fl(true)
            .qinfo(true)
            .custom("custom_key", "custom_value")
            .to_params();
        assert_eq!(
            pairs(&params),
            vec![
                ("im_name", "test_im"),
                ("page", "10"),
                ("limit", "1"),
                ("score", "true"),
                ("score_min", "0.1"),
                ("score_max", "0.75"),
                ("fq", "field_a:value_a"),
                ("fq", "field_b:value_b"),
                ("fl", "field_x"),
                ("fl", "field_y"),
                ("get_all_fl", "true"),
                ("qinfo", "true"),
                ("custom_key", "custom_value"),
            ]
        );
    }

    #[test]
    fn fq_and_custom_keep_insertion_order() {
        let params = SearchParams::new("a")
            .fq("zeta", "1")
            .fq("alpha", "2")
            .fq("zeta", "3")
            .custom("z_key", "z")
            .custom("a_key", "a")
            .to_params();
        assert_eq!(params.get_all("fq"), vec!["zeta:3", "alpha:2"]);
        let tail: Vec<(&str, &str)> = params.iter().skip(params.len() - 2).collect();
        assert_eq!(tail, vec![("z_key", "z"), ("a_key", "a")]);
    }

    #[test]
    fn floats_never_use_exponent_notation() {
        let params = SearchParams::new("a").score_min(0.0001).score_max(1.0).to_params();
        assert_eq!(params.get("score_min"), Some("0.0001"));
        assert_eq!(params.get("score_max"), Some("1"));
    }

    #[test]
    fn group_sort_params() {
        let params = SearchParams::new("test_im")
            .sort_group_by("price:asc")
            .sort_group_strategy("first")
            .group_by("mpid")
            .group_limit(2)
            .to_params();
        assert_eq!(params.get("sort_group_by"), Some("price:asc"));
        assert_eq!(params.get("sort_group_strategy"), Some("first"));
        assert_eq!(params.get("group_by"), Some("mpid"));
        assert_eq!(params.get("group_limit"), Some("2"));
    }

    #[test]
    fn fl_keeps_caller_order() {
        let params = SearchParams::new("a").fl(["z", "a", "m"]).to_params();
        assert_eq!(params.get_all("fl"), vec!["z", "a", "m"]);
    }

    #[test]
    fn color_code_validation() {
        let params = ColorSearchParams::new("123ABC").unwrap();
        assert_eq!(params.color(), "123ABC");
        assert_eq!(
            pairs(&params.to_params()),
            vec![("color", "123ABC"), ("score", "false")]
        );

        assert_eq!(
            ColorSearchParams::new("#123ABC").unwrap_err(),
            ClientError::InvalidColor("#123ABC".to_string())
        );
        assert!(ColorSearchParams::new("12345").is_err());
        assert!(ColorSearchParams::new("12345G").is_err());
        assert!(ColorSearchParams::new("abcdef").is_ok());
    }

    #[test]
    fn upload_url_params_with_detection() {
        let params = UploadSearchParams::from_url("http://www.example.com/test_im.jpeg")
            .detection("dress")
            .bounding_box([1, 2, 30, 40])
            .to_params();
        assert_eq!(
            pairs(&params),
            vec![
                ("im_url", "http://www.example.com/test_im.jpeg"),
                ("score", "false"),
                ("detection", "dress"),
                ("box", "1,2,30,40"),
            ]
        );
    }

    #[test]
    fn upload_im_id_params() {
        let params = UploadSearchParams::from_im_id("abc").to_params();
        assert_eq!(pairs(&params), vec![("im_id", "abc"), ("score", "false")]);
    }

    #[test]
    fn feature_source_stays_out_of_params() {
        let params = UploadSearchParams::from_feature("feature123", "trans123").to_params();
        assert_eq!(pairs(&params), vec![("score", "false")]);
    }

    #[test]
    fn empty_file_and_stream_fail_fast() {
        assert_eq!(
            UploadSearchParams::from_file("").unwrap_err(),
            ClientError::MissingImageFile
        );
        assert_eq!(
            UploadSearchParams::from_stream(Vec::new()).unwrap_err(),
            ClientError::MissingImageStream
        );
    }

    #[test]
    fn missing_file_is_accepted_at_construction() {
        let params = UploadSearchParams::from_file("nonFile").unwrap();
        assert_eq!(params.image_file(), Some(Path::new("nonFile")));
    }

    #[test]
    fn form_urlencoding_escapes_values() {
        let params: Params = [("fq", "brand:A&B"), ("fl", "title")].into_iter().collect();
        assert_eq!(params.to_form_urlencoded(), "fq=brand%3AA%26B&fl=title");
    }
}
