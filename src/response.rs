//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Probes speak plain text. A [`Response`] is a status, an optional content
//! type and a body; nothing else is needed to answer a kubelet.

use bytes::Bytes;
use http::StatusCode;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderValue};
use http_body_util::Full;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// An outgoing HTTP response.
///
/// ```rust
/// use auth_probe::Response;
/// use http::StatusCode;
///
/// Response::text("OK");
/// Response::status(StatusCode::NOT_FOUND);
/// Response::builder()
///     .status(StatusCode::INTERNAL_SERVER_ERROR)
///     .text("db not ready");
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: Bytes,
}

impl Response {
    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Builder for responses that need a status other than `200`.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        let headers = res.headers_mut();
        if let Some(content_type) = self.content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        // Probe answers describe this instant only.
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        res
    }
}

/// Fluent builder for [`Response`]. Defaults to `200 OK`.
pub struct ResponseBuilder {
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Terminate with a plain-text body.
    pub fn text(self, body: impl Into<String>) -> Response {
        Response {
            status: self.status,
            content_type: Some(TEXT_PLAIN),
            body: Bytes::from(body.into()),
        }
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { status: self.status, content_type: None, body: Bytes::new() }
    }
}

/// Conversion into an HTTP [`Response`], so handlers can return whatever is
/// most natural.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_ok_plain_text() {
        let res = Response::text("OK").into_inner();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], TEXT_PLAIN);
        assert_eq!(res.headers()[CACHE_CONTROL], "no-store");
    }

    #[test]
    fn builder_carries_status_and_body() {
        let res = Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .text("db not ready");

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), b"db not ready");
    }

    #[test]
    fn bare_status_has_no_content_type() {
        let res = StatusCode::NOT_FOUND.into_response();
        assert!(res.body().is_empty());

        let res = res.into_inner();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.headers().get(CONTENT_TYPE).is_none());
    }
}
