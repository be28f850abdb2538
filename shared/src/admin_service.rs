use crate::http::{make_error_response, make_text_response};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Readiness flag shared between a service and its admin listener.
///
/// Starts out not ready. The owner flips it once it accepts traffic and back
/// off when it starts draining for shutdown.
#[derive(Clone, Debug, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.0.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Serves `/health` (always ok) and `/ready` (ok while the readiness flag is set).
pub struct AdminService<E> {
    readiness: Readiness,
    _error: PhantomData<fn() -> E>,
}

impl<E> AdminService<E> {
    pub fn new(readiness: Readiness) -> Self {
        Self {
            readiness,
            _error: PhantomData,
        }
    }
}

impl<E> Service<Request<Incoming>> for AdminService<E>
where
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let response = admin_response(req.uri().path(), self.readiness.is_ready());
        Box::pin(async move { Ok(response) })
    }
}

fn admin_response<E: 'static>(path: &str, is_ready: bool) -> Response<BoxBody<Bytes, E>> {
    match path {
        "/health" => make_text_response(StatusCode::OK, "ok\n".into()),
        "/ready" if is_ready => make_text_response(StatusCode::OK, "ok\n".into()),
        "/ready" => make_error_response(StatusCode::SERVICE_UNAVAILABLE),
        _ => make_error_response(StatusCode::NOT_FOUND),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::serve;
    use http_body_util::{BodyExt, Empty};
    use hyper_util::client::legacy::Client;
    use hyper_util::client::legacy::connect::HttpConnector;
    use hyper_util::rt::TokioExecutor;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[derive(thiserror::Error, Debug)]
    enum TestError {
        #[error("io error: {0}")]
        Io(#[from] std::io::Error),
    }

    async fn get(client: &Client<HttpConnector, Empty<Bytes>>, url: String) -> StatusCode {
        let request = Request::builder()
            .uri(url)
            .body(Empty::<Bytes>::new())
            .unwrap();
        let response = client.request(request).await.unwrap();
        let status = response.status();
        // Drain the body so the connection can be reused
        let _ = response.into_body().collect().await;
        status
    }

    #[tokio::test]
    async fn test_health_and_readiness() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let readiness = Readiness::new();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve::<_, TestError, _>(
            listener,
            AdminService::new(readiness.clone()),
            async move {
                let _ = stop_rx.await;
            },
            Duration::from_secs(1),
        ));

        let client: Client<HttpConnector, Empty<Bytes>> =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let base = format!("http://127.0.0.1:{port}");

        assert_eq!(get(&client, format!("{base}/health")).await, StatusCode::OK);
        assert_eq!(
            get(&client, format!("{base}/ready")).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        readiness.set_ready(true);
        assert_eq!(get(&client, format!("{base}/ready")).await, StatusCode::OK);
        assert_eq!(
            get(&client, format!("{base}/unknown")).await,
            StatusCode::NOT_FOUND
        );

        stop_tx.send(()).unwrap();
        assert!(server.await.unwrap().is_ok());
    }
}
