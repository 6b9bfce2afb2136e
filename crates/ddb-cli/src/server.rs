//! Binds the single JSON-RPC-style endpoint onto a `ddb_router::Router` and
//! serves it over HTTP with hyper, bridging request/response types at the
//! transport boundary.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request as HyperRequest, Response as HyperResponse, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use ddb_router::{Method, Request, Response, Router};
use ddb_service::Service;

const TARGET_HEADER: &str = "x-amz-target";

fn build_router(service: Arc<Service>) -> Router {
    Router::new().post("/", move |req: Request| {
        let service = service.clone();
        async move {
            let Some(target) = req.get_header(TARGET_HEADER).map(str::to_string) else {
                return Response::new(400).body(b"missing X-Amz-Target header".to_vec());
            };
            let (status, body) = ddb_service::dispatch(&service, &target, &req.body).await;
            Response::new(status)
                .header("Content-Type", "application/x-amz-json-1.0")
                .body(body)
        }
    })
}

async fn bridge(
    req: HyperRequest<Incoming>,
    router: Arc<Router>,
) -> Result<HyperResponse<Full<Bytes>>, Infallible> {
    let method = Method::from_str(req.method().as_str()).unwrap_or(Method::Get);
    let path = req.uri().path().to_string();

    let mut request = Request::new(method, &path);
    if let Some(query) = req.uri().query() {
        request.query = Request::parse_query_string(query);
    }
    for (key, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            request.headers.insert(key.to_string(), v.to_string());
        }
    }
    request.body = req.collect().await.map(|b| b.to_bytes().to_vec()).unwrap_or_default();

    let response = router.handle(request).await;

    let mut builder = HyperResponse::builder()
        .status(StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    Ok(builder.body(Full::new(Bytes::from(response.body))).unwrap())
}

/// Runs the HTTP server on `port` until the process is killed.
pub async fn serve(port: u16, service: Service) -> anyhow::Result<()> {
    let router = Arc::new(build_router(Arc::new(service)));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let router = router.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| bridge(req, router.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::warn!(%err, "connection error");
            }
        });
    }
}
