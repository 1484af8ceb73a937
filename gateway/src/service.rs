use crate::ServerError;
use crate::handler::{DownloadRequest, GatewayHandler};
use crate::metrics_defs::REQUEST_DURATION;
use crate::routing::DownloadRoute;
use http::header::{CACHE_CONTROL, LOCATION};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::histogram;
use shared::http::{PeerAddr, make_error_response};
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

type GatewayResponse = Response<BoxBody<Bytes, ServerError>>;

/// Serves the artifact download route.
#[derive(Clone)]
pub struct GatewayService {
    handler: Arc<GatewayHandler>,
    route: Arc<DownloadRoute>,
    shutdown: CancellationToken,
}

impl GatewayService {
    /// Requests in flight are cancelled together with `shutdown`.
    pub fn new(handler: GatewayHandler, base_path: &str, shutdown: CancellationToken) -> Self {
        GatewayService {
            handler: Arc::new(handler),
            route: Arc::new(DownloadRoute::new(base_path)),
            shutdown,
        }
    }

    pub async fn handle_request<B>(&self, req: Request<B>) -> GatewayResponse {
        let path = req.uri().path();
        let Some(download) = self.route.matches(path) else {
            tracing::debug!(path, "no route");
            return make_error_response(StatusCode::NOT_FOUND);
        };
        if req.method() != Method::GET {
            return make_error_response(StatusCode::METHOD_NOT_ALLOWED);
        }

        let peer_addr = req.extensions().get::<PeerAddr>().map(|peer| peer.0);
        let span = tracing::info_span!(
            "download",
            addr = peer_addr.map(tracing::field::display),
            path,
            target_name = %download.target,
            run = %download.run,
            artifact = %download.artifact,
            filename = %download.filename,
        );
        self.download(download).instrument(span).await
    }

    async fn download(&self, download: DownloadRequest) -> GatewayResponse {
        let started = Instant::now();
        let cancel = self.shutdown.child_token();
        tracing::info!("handling request");

        let response = match self.handler.handle(&download, &cancel).await {
            Ok(location) => {
                tracing::info!(%location, "redirecting");
                redirect(&location)
            }
            Err(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!(error = %err, "download request failed");
                } else {
                    tracing::warn!(error = %err, "download request failed");
                }
                make_error_response(status)
            }
        };

        histogram!(REQUEST_DURATION, "status" => response.status().as_u16().to_string())
            .record(started.elapsed().as_secs_f64());
        response
    }
}

fn redirect(location: &Url) -> GatewayResponse {
    Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(LOCATION, location.as_str())
        .header(CACHE_CONTROL, "no-cache")
        .body(Empty::new().map_err(|e| match e {}).boxed())
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "invalid redirect response");
            make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        })
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = GatewayResponse;
    type Error = ServerError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle_request(req).await) })
    }
}
