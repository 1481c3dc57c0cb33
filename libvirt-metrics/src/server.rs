//! Scrape HTTP server.
use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use http::{header, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::{body::Bytes, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, sync::Mutex, task};

use libvirt_metrics_common::{
    collector::Collector,
    hypervisor::Hypervisor,
    openmetrics::{self, OPENMETRICS_TEXT_CONTENT_TYPE},
};

pub const METRICS_PATH: &str = "/metrics";

pub struct ScrapeState<H> {
    collector: Arc<Collector<H>>,
    /// Only one collection pass runs at a time.
    pass: Mutex<()>,
}

impl<H> ScrapeState<H> {
    pub fn new(collector: Collector<H>) -> Self {
        Self {
            collector: Arc::new(collector),
            pass: Mutex::new(()),
        }
    }
}

fn text_response(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));

    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));

    response
}

/// Run a collection pass on the blocking pool and render it.
pub async fn scrape<H>(state: &ScrapeState<H>) -> anyhow::Result<String>
where
    H: Hypervisor + Send + Sync + 'static,
{
    let _pass = state.pass.lock().await;
    let collector = state.collector.clone();

    let metrics = task::spawn_blocking(move || collector.collect()).await??;

    Ok(openmetrics::render(&metrics))
}

pub async fn handle<H, B>(
    state: Arc<ScrapeState<H>>,
    request: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    H: Hypervisor + Send + Sync + 'static,
{
    tracing::debug!("{} {}", request.method(), request.uri());

    if request.uri().path() != METRICS_PATH {
        return Ok(text_response(
            StatusCode::NOT_FOUND,
            "text/plain",
            "Not Found\n".into(),
        ));
    }

    if request.method() != Method::GET {
        return Ok(text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain",
            "Method Not Allowed\n".into(),
        ));
    }

    Ok(match scrape(&state).await {
        Ok(text) => text_response(StatusCode::OK, OPENMETRICS_TEXT_CONTENT_TYPE, text),
        Err(e) => {
            tracing::error!("Collection failed: {e}");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                format!("collection failed: {e}\n"),
            )
        }
    })
}

pub async fn serve<H>(addr: SocketAddr, state: Arc<ScrapeState<H>>) -> anyhow::Result<()>
where
    H: Hypervisor + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Starting server on {addr}");

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!("Accepted connection from {peer}");

        let io = TokioIo::new(stream);
        let state = state.clone();

        task::spawn(async move {
            let service = service_fn(move |request| handle(state.clone(), request));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::warn!("Connection from {peer} failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod test;
