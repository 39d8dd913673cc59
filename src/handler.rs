//! Route handlers.
//!
//! The router keeps every route as an `Arc<dyn Handler>`. Plain
//! `async fn(Request) -> impl IntoResponse` items and closures get a blanket
//! impl; types that carry state, like [`Readiness`](crate::Readiness),
//! implement the trait themselves.

use std::future::Future;
use std::pin::Pin;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Boxed future returned by [`Handler::call`].
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Answers one request. Shared by every connection, hence `&self`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request) -> ResponseFuture;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, req: Request) -> ResponseFuture {
        let fut = (self)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
