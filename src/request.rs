//! Incoming HTTP request type.

use std::net::SocketAddr;

use http::Method;

/// The head of an incoming request: enough to route it and log it. Probes
/// carry no meaningful headers or body, so neither is kept.
pub struct Request {
    method: Method,
    path: String,
    peer: SocketAddr,
}

impl Request {
    pub(crate) fn new(parts: http::request::Parts, peer: SocketAddr) -> Self {
        Self { method: parts.method, path: parts.uri.path().to_owned(), peer }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn peer(&self) -> SocketAddr { self.peer }
}

#[cfg(test)]
impl Request {
    pub(crate) fn fake(method: Method, path: &str) -> Self {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(path)
            .body(())
            .unwrap()
            .into_parts();
        Self::new(parts, SocketAddr::from(([127, 0, 0, 1], 40000)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_path_without_query() {
        let req = Request::fake(Method::GET, "/readyz?verbose=1");

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.path(), "/readyz");
        assert_eq!(req.peer().port(), 40000);
    }
}
