//! Transport seam between the client core and the network.
//!
//! # Design
//! The core never opens a connection. Every operation hands an encoded
//! `Params` set to an injected `Transport` and gets back an `HttpResponse`
//! described as plain data. Tests supply canned responses through the same
//! trait; production code wraps whatever HTTP stack the host already uses.
//!
//! Three entry points mirror the three ways the service accepts a request:
//! query-string GETs, form or multipart POSTs, and feature-bearing POSTs where
//! the feature vector and its transaction ID travel outside the ordinary
//! parameter set.

use std::collections::HashMap;

use crate::error::TransportError;
use crate::params::Params;

/// Multipart field name under which image bytes are uploaded.
pub const IMAGE_FIELD: &str = "image";

/// HTTP method an operation is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Image bytes to upload alongside the parameters of a POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Headers folded into a map; a repeated name keeps its last value.
    pub fn header_map(&self) -> HashMap<String, String> {
        self.headers.iter().cloned().collect()
    }
}

/// Executes requests on behalf of `SearchClient`.
///
/// Implementations own connection handling, signing, retries and timeouts.
/// Non-2xx responses should still be returned as `Ok`: the service reports
/// failures inside the JSON body and the parser classifies them.
pub trait Transport {
    /// Sends `params` as a query string.
    fn get(&self, path: &str, params: &Params) -> Result<HttpResponse, TransportError>;

    /// Sends `params` as a form body, or as multipart fields next to `image`
    /// when one is given.
    fn post(
        &self,
        path: &str,
        params: &Params,
        image: Option<&ImageUpload>,
    ) -> Result<HttpResponse, TransportError>;

    /// Sends `params` together with a precomputed feature vector and the
    /// transaction ID it was extracted under.
    fn post_with_feature(
        &self,
        path: &str,
        params: &Params,
        trans_id: &str,
        feature: &str,
    ) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, path: &str, params: &Params) -> Result<HttpResponse, TransportError> {
        (**self).get(path, params)
    }

    fn post(
        &self,
        path: &str,
        params: &Params,
        image: Option<&ImageUpload>,
    ) -> Result<HttpResponse, TransportError> {
        (**self).post(path, params, image)
    }

    fn post_with_feature(
        &self,
        path: &str,
        params: &Params,
        trans_id: &str,
        feature: &str,
    ) -> Result<HttpResponse, TransportError> {
        (**self).post_with_feature(path, params, trans_id, feature)
    }
}
