use crate::config::{Config, MergeStrategyKind};
use crate::errors::{AggregatorError, Result};
use crate::executor::Aggregator;
use crate::fetcher::{Fetcher, NumbersPayload};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::query::parse_query;
use crate::render::{ResponseBody, render_json};
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode, Uri};
use shared::http::{make_error_response, make_text_response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub const NUMBERS_PATH: &str = "/numbers";

/// Public `/numbers` endpoint.
#[derive(Clone)]
pub struct NumbersService {
    inner: Arc<Inner>,
}

struct Inner {
    aggregator: Aggregator,
    strategy: MergeStrategyKind,
    max_urls: usize,
}

impl NumbersService {
    pub fn new(config: &Config) -> Self {
        let fetcher = Fetcher::new(
            config.timeouts.fetch_timeout(),
            config.limits.max_body_bytes,
        );
        let aggregator = Aggregator::new(fetcher, config.timeouts.clone(), &config.limits);
        Self::with_aggregator(aggregator, config.strategy, config.limits.max_urls)
    }

    pub fn with_aggregator(
        aggregator: Aggregator,
        strategy: MergeStrategyKind,
        max_urls: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                aggregator,
                strategy,
                max_urls,
            }),
        }
    }

    /// Answers one request. Only the method and URI are looked at.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<ResponseBody> {
        let started = Instant::now();
        let _inflight = InflightGuard::new();

        let (parts, _) = request.into_parts();
        let response = self.route(&parts.method, &parts.uri).await;

        shared::histogram!(
            REQUEST_DURATION,
            "status" => response.status().as_str().to_owned(),
            "strategy" => self.inner.strategy.as_str(),
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    async fn route(&self, method: &Method, uri: &Uri) -> Response<ResponseBody> {
        if uri.path() != NUMBERS_PATH {
            return make_error_response(StatusCode::NOT_FOUND);
        }

        if method != Method::GET {
            tracing::debug!(%method, "method is not supported");
            return make_text_response(StatusCode::NOT_FOUND, "not supported method\n".into());
        }

        match self.numbers(uri.query()).await {
            Ok(response) => response,
            Err(e) => error_response(e),
        }
    }

    async fn numbers(&self, query: Option<&str>) -> Result<Response<ResponseBody>> {
        let urls = parse_query(query, self.inner.max_urls)?;
        tracing::debug!(
            upstreams = urls.len(),
            strategy = self.inner.strategy.as_str(),
            "aggregating"
        );

        let numbers = self
            .inner
            .aggregator
            .aggregate(urls, self.inner.strategy)
            .await?;

        render_json(StatusCode::OK, &NumbersPayload { numbers })
    }
}

/// Holds one unit of the inflight gauge, released on drop so that requests
/// whose connection went away mid-flight are not counted forever.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        shared::gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        shared::gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

fn error_response(error: AggregatorError) -> Response<ResponseBody> {
    let status = error.status_code();

    if status.is_server_error() {
        tracing::error!(error = %error, "failed to answer numbers request");
        make_error_response(status)
    } else {
        tracing::debug!(error = %error, "rejected numbers request");
        make_text_response(status, format!("{error}\n"))
    }
}

impl Service<Request<Incoming>> for NumbersService {
    type Response = Response<ResponseBody>;
    type Error = AggregatorError;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}
