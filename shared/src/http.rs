use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use hyper_util::server::graceful::GracefulShutdown;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Binds `host:port` and serves `service` until `shutdown` resolves, then
/// drains for at most `grace`.
pub async fn run_http_service<S, E, F>(
    host: &str,
    port: u16,
    service: S,
    shutdown: F,
    grace: Duration,
) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
    F: Future<Output = ()>,
{
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    serve(listener, service, shutdown, grace).await
}

/// Accept loop over an already bound listener.
///
/// Once `shutdown` resolves the listener is closed and every open connection
/// is asked to finish its current request and close. Returns when all of them
/// are gone or `grace` has elapsed, whichever comes first.
pub async fn serve<S, E, F>(
    listener: TcpListener,
    service: S,
    shutdown: F,
    grace: Duration,
) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
    F: Future<Output = ()>,
{
    let service_arc = Arc::new(service);
    let builder = Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }

    loop {
        let (stream, _peer_addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, no longer accepting connections");
                break;
            }
        };
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service_arc.clone();

        // Hand the connection to hyper; auto-detect h1/h2 on this socket
        let conn = graceful.watch(builder.serve_connection(io, svc).into_owned());
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "connection closed with error");
            }
        });
    }

    drop(listener);
    match tokio::time::timeout(grace, graceful.shutdown()).await {
        Ok(()) => tracing::info!("all connections drained"),
        Err(_) => tracing::warn!(?grace, "grace period elapsed with connections still open"),
    }
    Ok(())
}

/// Plain-text response carrying the canonical reason of `status_code`.
pub fn make_error_response<E: 'static>(status_code: StatusCode) -> Response<BoxBody<Bytes, E>> {
    let message = status_code
        .canonical_reason()
        .unwrap_or("an error occurred");
    make_text_response(status_code, message.to_string())
}

pub fn make_text_response<E: 'static>(
    status_code: StatusCode,
    message: String,
) -> Response<BoxBody<Bytes, E>> {
    let mut response =
        Response::new(Full::new(Bytes::from(message)).map_err(|e| match e {}).boxed());
    *response.status_mut() = status_code;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Empty;
    use hyper::service::service_fn;
    use hyper_util::client::legacy::Client;
    use hyper_util::client::legacy::connect::HttpConnector;
    use std::convert::Infallible;
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    #[derive(thiserror::Error, Debug)]
    enum TestError {
        #[error("io error: {0}")]
        Io(#[from] std::io::Error),
    }

    /// Serves a handler that answers after `delay` and returns the port and a
    /// trigger for `shutdown`.
    async fn start_slow_server(
        delay: Duration,
        grace: Duration,
    ) -> (u16, oneshot::Sender<()>, tokio::task::JoinHandle<Result<(), TestError>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let service = service_fn(move |_req: Request<Incoming>| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, TestError>(make_text_response(StatusCode::OK, "done".into()))
        });

        let server = tokio::spawn(serve(
            listener,
            service,
            async move {
                let _ = stop_rx.await;
            },
            grace,
        ));
        (port, stop_tx, server)
    }

    fn send(port: u16) -> tokio::task::JoinHandle<(StatusCode, Bytes)> {
        let client: Client<HttpConnector, Empty<Bytes>> =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        tokio::spawn(async move {
            let request = Request::builder()
                .uri(format!("http://127.0.0.1:{port}/"))
                .body(Empty::<Bytes>::new())
                .unwrap();
            let response = client.request(request).await.unwrap();
            let status = response.status();
            let body = response.into_body().collect().await.unwrap().to_bytes();
            (status, body)
        })
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_inflight_request() {
        let (port, stop_tx, server) =
            start_slow_server(Duration::from_millis(400), Duration::from_secs(5)).await;

        let sent = Instant::now();
        let request = send(port);
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop_tx.send(()).unwrap();

        assert!(server.await.unwrap().is_ok());
        // serve only returns once the in-flight request was answered
        assert!(sent.elapsed() >= Duration::from_millis(400));

        let (status, body) = request.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"done");

        // The listener is closed after the drain
        assert!(tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_drain_is_bounded_by_grace() {
        let (port, stop_tx, server) =
            start_slow_server(Duration::from_secs(30), Duration::from_millis(100)).await;

        let _request = send(port);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stopping = Instant::now();
        stop_tx.send(()).unwrap();
        assert!(server.await.unwrap().is_ok());
        assert!(stopping.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_shutdown_without_connections_returns_at_once() {
        let (_port, stop_tx, server) =
            start_slow_server(Duration::ZERO, Duration::from_secs(30)).await;

        let stopping = Instant::now();
        stop_tx.send(()).unwrap();
        assert!(server.await.unwrap().is_ok());
        assert!(stopping.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_error_response_uses_canonical_reason() {
        let response = make_error_response::<Infallible>(StatusCode::NOT_FOUND);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(hyper::header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"Not Found");
    }

    #[tokio::test]
    async fn test_text_response_keeps_message() {
        let response =
            make_text_response::<Infallible>(StatusCode::BAD_REQUEST, "missing `u`".into());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"missing `u`");
    }
}
