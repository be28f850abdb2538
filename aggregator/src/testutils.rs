use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// Canned behaviour of a mock upstream.
#[derive(Clone, Debug)]
pub struct MockUpstream {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl MockUpstream {
    pub fn numbers(numbers: &[i64]) -> Self {
        Self::raw(&serde_json::json!({ "numbers": numbers }).to_string())
    }

    pub fn raw(body: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::raw("")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Starts a mock upstream on an ephemeral port and returns its numbers URL.
pub async fn start_mock_upstream(upstream: MockUpstream) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let upstream = upstream.clone();

            tokio::spawn(async move {
                let service = service_fn(move |_req: Request<Incoming>| {
                    let upstream = upstream.clone();
                    async move {
                        tokio::time::sleep(upstream.delay).await;
                        let mut response = Response::new(Full::new(Bytes::from(upstream.body)));
                        *response.status_mut() = upstream.status;
                        response.headers_mut().insert(
                            hyper::header::CONTENT_TYPE,
                            hyper::header::HeaderValue::from_static("application/json"),
                        );
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await;
            });
        }
    });

    Url::parse(&format!("http://127.0.0.1:{port}/numbers")).unwrap()
}

/// A URL that refuses connections.
pub async fn unreachable_upstream() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{port}/numbers")).unwrap()
}
