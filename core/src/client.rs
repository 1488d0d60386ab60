//! Operations facade: encode, send through the transport, parse.
//!
//! # Design
//! `SearchClient` holds only its transport and carries no mutable state
//! between calls. Every operation performs at most one round trip and always
//! returns a result object; remote, transport and parse failures end up in
//! the result's `error`. The only raised faults are the `ClientError`s of
//! the parameter constructors, which fire before a client is involved.
//!
//! `Operation` is the routing table: verb, path, the envelope fields its
//! responses must carry, and whether detected objects are read.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ErrorKind, ResponseError};
use crate::http::{HttpMethod, HttpResponse, ImageUpload, Transport, IMAGE_FIELD};
use crate::params::{ColorSearchParams, ImageSource, Params, SearchParams, ToParams, UploadSearchParams};
use crate::parser::{parse_feature_response, parse_search_response};
use crate::types::{FeatureResponseResult, PagedSearchResult};

/// The six operations of the visual search service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Search,
    ColorSearch,
    UploadSearch,
    DiscoverSearch,
    SimilarProductsSearch,
    ExtractFeature,
}

impl Operation {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::ColorSearch => "colorsearch",
            Self::UploadSearch => "uploadsearch",
            Self::DiscoverSearch => "discoversearch",
            Self::SimilarProductsSearch => "similarproducts",
            Self::ExtractFeature => "extractfeature",
        }
    }

    pub const fn path(self) -> &'static str {
        match self {
            Self::Search => "/search",
            Self::ColorSearch => "/colorsearch",
            Self::UploadSearch => "/uploadsearch",
            Self::DiscoverSearch => "/discoversearch",
            Self::SimilarProductsSearch => "/similarproducts",
            Self::ExtractFeature => "/extractfeature",
        }
    }

    pub const fn method(self) -> HttpMethod {
        match self {
            Self::Search | Self::ColorSearch => HttpMethod::Get,
            _ => HttpMethod::Post,
        }
    }

    /// Top-level fields a response must carry to be accepted.
    ///
    /// Discover and similar-products responses report totals per detected
    /// object, and feature extraction is not paged.
    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Search | Self::ColorSearch | Self::UploadSearch => &["status", "method", "total"],
            Self::DiscoverSearch | Self::SimilarProductsSearch | Self::ExtractFeature => {
                &["status", "method"]
            }
        }
    }

    pub const fn parses_objects(self) -> bool {
        matches!(self, Self::DiscoverSearch | Self::SimilarProductsSearch)
    }
}

/// File name reported for images uploaded from memory.
const STREAM_FILE_NAME: &str = "image";

/// Synchronous client for the visual search service.
#[derive(Debug, Clone)]
pub struct SearchClient<T> {
    transport: T,
}

impl<T: Transport> SearchClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Searches by the name of an indexed image.
    pub fn search(&self, params: &SearchParams) -> PagedSearchResult {
        let response = self.send(Operation::Search, &params.to_params(), None);
        finish_search(Operation::Search, response)
    }

    pub fn color_search(&self, params: &ColorSearchParams) -> PagedSearchResult {
        let response = self.send(Operation::ColorSearch, &params.to_params(), None);
        finish_search(Operation::ColorSearch, response)
    }

    pub fn upload_search(&self, params: &UploadSearchParams) -> PagedSearchResult {
        self.upload_style(Operation::UploadSearch, params)
    }

    /// Detects objects in the image and searches within each of them.
    pub fn discover_search(&self, params: &UploadSearchParams) -> PagedSearchResult {
        self.upload_style(Operation::DiscoverSearch, params)
    }

    pub fn similar_products_search(&self, params: &UploadSearchParams) -> PagedSearchResult {
        self.upload_style(Operation::SimilarProductsSearch, params)
    }

    /// Extracts the feature vector of an image for later feature searches.
    pub fn extract_feature(&self, params: &UploadSearchParams) -> FeatureResponseResult {
        let operation = Operation::ExtractFeature;
        match self.send(operation, &params.to_params(), Some(params.image())) {
            Ok(response) => parse_feature_response(response),
            Err(err) => {
                log_unsent(operation, &err);
                FeatureResponseResult::failed(err, String::new(), HashMap::new())
            }
        }
    }

    fn upload_style(&self, operation: Operation, params: &UploadSearchParams) -> PagedSearchResult {
        let response = self.send(operation, &params.to_params(), Some(params.image()));
        finish_search(operation, response)
    }

    /// Routes one request by the operation's verb. A POST carries the query
    /// image the way its source requires.
    fn send(
        &self,
        operation: Operation,
        params: &Params,
        image: Option<&ImageSource>,
    ) -> Result<HttpResponse, ResponseError> {
        let path = operation.path();
        log_dispatch(operation, params);

        let response = match (operation.method(), image) {
            (HttpMethod::Get, _) => self.transport.get(path, params),
            (HttpMethod::Post, Some(ImageSource::Feature { feature, trans_id })) => {
                self.transport.post_with_feature(path, params, trans_id, feature)
            }
            (HttpMethod::Post, Some(ImageSource::File(file))) => {
                let upload = read_image_file(file)?;
                self.transport.post(path, params, Some(&upload))
            }
            (HttpMethod::Post, Some(ImageSource::Stream(bytes))) => {
                let upload = ImageUpload {
                    file_name: STREAM_FILE_NAME.to_string(),
                    bytes: bytes.clone(),
                };
                self.transport.post(path, params, Some(&upload))
            }
            (HttpMethod::Post, Some(ImageSource::Url(_) | ImageSource::ImId(_)) | None) => {
                self.transport.post(path, params, None)
            }
        };
        response.map_err(ResponseError::from)
    }
}

fn finish_search(
    operation: Operation,
    response: Result<HttpResponse, ResponseError>,
) -> PagedSearchResult {
    match response {
        Ok(response) => parse_search_response(operation, response),
        Err(err) => {
            log_unsent(operation, &err);
            PagedSearchResult::failed(err, String::new(), HashMap::new())
        }
    }
}

fn read_image_file(path: &Path) -> Result<ImageUpload, ResponseError> {
    let bytes = std::fs::read(path).map_err(|e| {
        ResponseError::new(ErrorKind::InvalidImageOrUrl)
            .with_cause(format!("{}: {e}", path.display()))
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| IMAGE_FIELD.to_string());
    Ok(ImageUpload { file_name, bytes })
}

fn log_dispatch(operation: Operation, params: &Params) {
    debug!(
        operation = operation.name(),
        method = ?operation.method(),
        path = operation.path(),
        params = params.len(),
        "sending visual search request"
    );
}

fn log_unsent(operation: Operation, err: &ResponseError) {
    warn!(
        operation = operation.name(),
        kind = ?err.kind,
        cause = err.cause.as_deref().unwrap_or(""),
        "visual search request not completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    /// Transport that fails every call.
    struct Unreachable;

    impl Transport for Unreachable {
        fn get(&self, _: &str, _: &Params) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Request("connection refused".into()))
        }

        fn post(
            &self,
            _: &str,
            _: &Params,
            image: Option<&ImageUpload>,
        ) -> Result<HttpResponse, TransportError> {
            match image {
                Some(_) => Err(TransportError::Image("payload too large".into())),
                None => Err(TransportError::Request("connection refused".into())),
            }
        }

        fn post_with_feature(
            &self,
            _: &str,
            _: &Params,
            _: &str,
            _: &str,
        ) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Request("connection refused".into()))
        }
    }

    #[test]
    fn routing_table() {
        assert_eq!(Operation::Search.path(), "/search");
        assert_eq!(Operation::Search.method(), HttpMethod::Get);
        assert_eq!(Operation::ColorSearch.path(), "/colorsearch");
        assert_eq!(Operation::ColorSearch.method(), HttpMethod::Get);
        assert_eq!(Operation::UploadSearch.path(), "/uploadsearch");
        assert_eq!(Operation::DiscoverSearch.path(), "/discoversearch");
        assert_eq!(Operation::SimilarProductsSearch.path(), "/similarproducts");
        assert_eq!(Operation::ExtractFeature.path(), "/extractfeature");
        assert_eq!(Operation::ExtractFeature.method(), HttpMethod::Post);
    }

    /// Records the verb of every call and fails it.
    #[derive(Default)]
    struct Verbs(std::cell::RefCell<Vec<(HttpMethod, String)>>);

    impl Verbs {
        fn record(&self, method: HttpMethod, path: &str) -> Result<HttpResponse, TransportError> {
            self.0.borrow_mut().push((method, path.to_string()));
            Err(TransportError::Request("recorded".into()))
        }
    }

    impl Transport for Verbs {
        fn get(&self, path: &str, _: &Params) -> Result<HttpResponse, TransportError> {
            self.record(HttpMethod::Get, path)
        }

        fn post(
            &self,
            path: &str,
            _: &Params,
            _: Option<&ImageUpload>,
        ) -> Result<HttpResponse, TransportError> {
            self.record(HttpMethod::Post, path)
        }

        fn post_with_feature(
            &self,
            path: &str,
            _: &Params,
            _: &str,
            _: &str,
        ) -> Result<HttpResponse, TransportError> {
            self.record(HttpMethod::Post, path)
        }
    }

    #[test]
    fn dispatch_follows_routing_table() {
        let client = SearchClient::new(Verbs::default());
        let upload = UploadSearchParams::from_im_id("abc");
        client.search(&SearchParams::new("a"));
        client.color_search(&ColorSearchParams::new("123ABC").unwrap());
        client.upload_search(&upload);
        client.discover_search(&upload);
        client.similar_products_search(&UploadSearchParams::from_feature("f", "t"));
        client.extract_feature(&upload);

        let expected: Vec<(HttpMethod, String)> = [
            Operation::Search,
            Operation::ColorSearch,
            Operation::UploadSearch,
            Operation::DiscoverSearch,
            Operation::SimilarProductsSearch,
            Operation::ExtractFeature,
        ]
        .into_iter()
        .map(|op| (op.method(), op.path().to_string()))
        .collect();
        assert_eq!(*client.transport().0.borrow(), expected);
    }

    #[test]
    fn only_discover_style_operations_read_objects() {
        assert!(Operation::DiscoverSearch.parses_objects());
        assert!(Operation::SimilarProductsSearch.parses_objects());
        assert!(!Operation::UploadSearch.parses_objects());
        assert!(!Operation::Search.parses_objects());
    }

    #[test]
    fn transport_failure_is_recovered_into_result() {
        let client = SearchClient::new(Unreachable);
        let result = client.search(&SearchParams::new("test_im"));
        assert_eq!(result.error_kind(), Some(ErrorKind::RequestFailed));
        assert_eq!(result.cause(), Some("request failed: connection refused"));
        assert!(result.raw_json.is_empty());
    }

    #[test]
    fn refused_image_is_invalid_image() {
        let client = SearchClient::new(Unreachable);
        let params = UploadSearchParams::from_stream(vec![0xff, 0xd8]).unwrap();
        let result = client.upload_search(&params);
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidImageOrUrl));
    }

    #[test]
    fn unreadable_file_never_reaches_transport() {
        let client = SearchClient::new(Unreachable);
        let params = UploadSearchParams::from_file("does/not/exist.jpg").unwrap();
        let result = client.extract_feature(&params);
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidImageOrUrl));
        assert!(result.cause().unwrap().starts_with("does/not/exist.jpg"));
    }
}
