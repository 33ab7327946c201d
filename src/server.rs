use crate::{
    catalog::{self, search::SearchLimits},
    config::{Config, Cors},
    convert::{download_name, DynEncoder, TargetFormat},
    errors::{AppError, AppResult},
};
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Instant,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub encoder: DynEncoder,
}

pub async fn serve(cfg: Config, encoder: DynEncoder) -> anyhow::Result<()> {
    let ip: IpAddr = cfg.server.bind_addr.parse().context("parsing bind_addr")?;
    let addr = SocketAddr::new(ip, cfg.server.port);
    let app = build_router(AppState { cfg: Arc::new(cfg), encoder });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}

pub fn build_router(shared: AppState) -> Router {
    let base = shared.cfg.server.base_path.trim_end_matches('/').to_string();
    let upload_bytes = shared.cfg.limits.max_upload_kb * 1024;
    let mut router = Router::new()
        .route("/healthz", get(health))
        .route(&format!("{base}/browse"), get(browse))
        .route(&format!("{base}/file"), get(file))
        .route(&format!("{base}/search"), get(search))
        .route(&format!("{base}/check-ffmpeg"), get(check_encoder))
        .route(
            &format!("{base}/convert-video"),
            post(convert_video)
                .layer::<_, Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(upload_bytes)),
        );
    if let Some(dir) = &shared.cfg.server.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }
    router
        .layer(cors_layer(&shared.cfg.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

fn cors_layer(cors: &Cors) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]).allow_headers(Any);
    if cors.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<catalog::search::SearchHit>,
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

async fn browse(State(state): State<AppState>, Query(q): Query<PathQuery>) -> Response {
    let started = Instant::now();
    let root = state.cfg.root_dir().to_path_buf();
    let result = blocking(move || catalog::browse::list(&root, &q.path)).await;
    respond("browse", started, result)
}

async fn file(State(state): State<AppState>, Query(q): Query<PathQuery>) -> Response {
    let started = Instant::now();
    let root = state.cfg.root_dir().to_path_buf();
    let result = blocking(move || catalog::read::read(&root, &q.path)).await;
    respond("file", started, result)
}

async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> Response {
    let started = Instant::now();
    let root = state.cfg.root_dir().to_path_buf();
    let limits = SearchLimits::from(&state.cfg.limits);
    let result = blocking(move || catalog::search::search(&root, &q.q, &limits))
        .await
        .map(|results| SearchResponse { results });
    respond("search", started, result)
}

async fn check_encoder(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let available = state.encoder.available();
    audit("check-ffmpeg", "allow", "OK", started);
    (StatusCode::OK, Json(json!({"available": available}))).into_response()
}

async fn convert_video(State(state): State<AppState>, multipart: Multipart) -> Response {
    let started = Instant::now();
    match convert_upload(&state, multipart).await {
        Ok((name, bytes)) => {
            audit("convert-video", "allow", "OK", started);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            audit("convert-video", "error", e.code(), started);
            e.into_response()
        }
    }
}

async fn convert_upload(state: &AppState, mut multipart: Multipart) -> AppResult<(String, Vec<u8>)> {
    if !state.encoder.available() {
        return Err(AppError::EncoderUnavailable(state.encoder.name().to_string()));
    }
    let mut video = None;
    let mut format = None;
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("video") => video = Some(field.bytes().await.map_err(upload_error)?),
            Some("format") => format = Some(field.text().await.map_err(upload_error)?),
            _ => {}
        }
    }
    let video = video.ok_or_else(|| AppError::BadRequest("No video file provided".into()))?;
    let format: TargetFormat = format.as_deref().unwrap_or("mp4").parse()?;

    let bytes = state.encoder.convert(video.to_vec(), format).await?;
    Ok((download_name(format, chrono::Local::now()), bytes))
}

fn upload_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::RequestTooLarge
    } else {
        AppError::BadRequest(format!("invalid upload: {e}"))
    }
}

/// Runs filesystem work on the blocking pool.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("worker failed: {e}")))?
}

fn respond<T: Serialize>(route: &str, started: Instant, result: AppResult<T>) -> Response {
    match result {
        Ok(body) => {
            audit(route, "allow", "OK", started);
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            let decision = if matches!(e, AppError::InvalidPath) { "deny" } else { "error" };
            audit(route, decision, e.code(), started);
            e.into_response()
        }
    }
}

fn audit(route: &str, decision: &str, code: &str, started: Instant) {
    tracing::info!(
        request_id = %uuid::Uuid::new_v4(),
        route = route,
        decision = decision,
        code = code,
        duration_ms = started.elapsed().as_millis() as u64,
        "audit"
    );
}
