use crate::{
    browse::{
        file::{FileContent, FileReader},
        filter::EntryFilter,
        roots::{LogicalRoot, RootRegistry},
        tree::{TreeBuilder, TreeNode},
    },
    config::Config,
    errors::{AppError, AppResult},
    metadata::MetadataStore,
    security,
    upstream::{Service, Upstream},
};
use axum::{
    body::{to_bytes, Body},
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

const ANALYTICS_PREFIX: &str = "/api/fastapi/";

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub roots: Arc<RootRegistry>,
    pub tree: Arc<TreeBuilder>,
    pub reader: Arc<FileReader>,
    pub metadata: Arc<MetadataStore>,
    pub upstream: Arc<Upstream>,
}

impl AppState {
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        let filter = EntryFilter::from_config(&cfg.files);
        Ok(Self {
            roots: Arc::new(RootRegistry::from_config(&cfg.files)),
            tree: Arc::new(TreeBuilder::new(filter, cfg.files.max_depth)),
            reader: Arc::new(FileReader::new(cfg.files.max_file_bytes)),
            metadata: Arc::new(MetadataStore::from_config(&cfg.files)),
            upstream: Arc::new(Upstream::new(&cfg.upstream)?),
            cfg: Arc::new(cfg),
        })
    }
}

pub async fn serve(cfg: Config) -> anyhow::Result<()> {
    let state = AppState::new(cfg)?;
    let addr: std::net::SocketAddr =
        format!("{}:{}", state.cfg.server.bind_addr, state.cfg.server.port).parse()?;
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cfg.server.allowed_origins);
    let router = Router::new()
        .route("/healthz", get(health))
        .route("/api/docs/roots", get(docs_roots))
        .route("/api/docs/tree", get(docs_tree))
        .route("/api/docs/file", get(docs_file))
        .route("/api/metadata/:page", get(metadata_index))
        .route("/api/backtests/runs", get(backtest_runs))
        .route("/api/backtests/run", get(backtest_run))
        .route("/api/backtests/query", post(backtest_query))
        .route("/api/fastapi/*path", get(analytics).post(analytics))
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    match cors {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let values: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if values.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(values))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

#[derive(Debug, Serialize)]
struct RootSummary<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "rootRel")]
    root_rel: String,
}

#[derive(Debug, Serialize)]
struct RootTree<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "rootRel")]
    root_rel: String,
    node: TreeNode,
}

#[derive(Debug, Serialize)]
struct FileResponse {
    ok: bool,
    #[serde(flatten)]
    file: FileContent,
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub root: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub root: Option<String>,
    pub path: Option<String>,
}

async fn docs_roots(State(state): State<AppState>) -> Response {
    let audit = Audit::start("docs.roots", "*");
    match state.roots.all() {
        Ok(roots) => {
            let summaries: Vec<RootSummary> = roots
                .iter()
                .map(|r| RootSummary { id: &r.id, name: &r.display_name, root_rel: r.root_rel() })
                .collect();
            audit.ok();
            (StatusCode::OK, Json(json!({"ok": true, "roots": summaries}))).into_response()
        }
        Err(e) => audit.fail(e).into_response(),
    }
}

async fn docs_tree(State(state): State<AppState>, Query(q): Query<TreeQuery>) -> Response {
    let root_id = q
        .root
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| state.roots.default_id().to_string());
    let audit = Audit::start("docs.tree", &root_id);
    let selected: AppResult<Vec<&LogicalRoot>> = if root_id == "*" {
        state.roots.all().map(|all| all.iter().collect())
    } else {
        state.roots.resolve(&root_id).map(|r| vec![r])
    };
    let selected = match selected {
        Ok(s) => s,
        Err(e) => return audit.fail(e).into_response(),
    };

    let mut payload = Vec::with_capacity(selected.len());
    for root in selected {
        let node = state.tree.list(&root.physical_path, &root.display_name).await;
        payload.push(RootTree { id: &root.id, name: &root.display_name, root_rel: root.root_rel(), node });
    }
    audit.ok();
    (StatusCode::OK, Json(json!({"ok": true, "roots": payload}))).into_response()
}

async fn docs_file(State(state): State<AppState>, Query(q): Query<FileQuery>) -> Response {
    let root_id = q
        .root
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| state.roots.default_id().to_string());
    let relative = q.path.unwrap_or_default();
    let audit = Audit::start("docs.file", &root_id).with_path(&relative);
    match read_doc(&state, &root_id, &relative).await {
        Ok(file) => {
            audit.ok();
            (StatusCode::OK, Json(FileResponse { ok: true, file })).into_response()
        }
        Err(e) => audit.fail(e).into_response(),
    }
}

async fn read_doc(state: &AppState, root_id: &str, relative: &str) -> AppResult<FileContent> {
    let root = state.roots.resolve(root_id)?;
    state.reader.read(&root.physical_path, relative).await
}

async fn metadata_index(State(state): State<AppState>, Path(page): Path<String>) -> Response {
    let audit = Audit::start("metadata", &page);
    match state.metadata.load(&page).await {
        Ok(index) => {
            audit.ok();
            (StatusCode::OK, Json(json!({"ok": true, "index": index}))).into_response()
        }
        Err(e) => audit.fail(e).into_response(),
    }
}

async fn backtest_runs(State(state): State<AppState>) -> Response {
    relay(&state, "backtests.runs", Service::Backtest, Method::GET, "/v1/backtests/runs", None, None, Bytes::new())
        .await
}

async fn backtest_run(State(state): State<AppState>, uri: Uri) -> Response {
    relay(&state, "backtests.run", Service::Backtest, Method::GET, "/v1/backtests/run", uri.query(), None, Bytes::new())
        .await
}

async fn backtest_query(State(state): State<AppState>, headers: HeaderMap, body: Body) -> Response {
    let body = match read_body(&state, &headers, body).await {
        Ok(b) => b,
        Err(e) => return Audit::start("backtests.query", "backtest").fail(e).into_response(),
    };
    let ct = content_type(&headers);
    relay(&state, "backtests.query", Service::Backtest, Method::POST, "/v1/backtests/query", None, ct.as_deref(), body)
        .await
}

async fn analytics(State(state): State<AppState>, method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Response {
    let body = match read_body(&state, &headers, body).await {
        Ok(b) => b,
        Err(e) => return Audit::start("analytics", "analytics").fail(e).into_response(),
    };
    // forward the path exactly as the client sent it, still percent-encoded
    let path = uri.path().strip_prefix(ANALYTICS_PREFIX).unwrap_or_default();
    let ct = content_type(&headers);
    relay(&state, "analytics", Service::Analytics, method, path, uri.query(), ct.as_deref(), body).await
}

#[allow(clippy::too_many_arguments)]
async fn relay(
    state: &AppState,
    route: &str,
    service: Service,
    method: Method,
    path: &str,
    query: Option<&str>,
    content_type: Option<&str>,
    body: Bytes,
) -> Response {
    let audit = Audit::start(route, service.as_str());
    match state.upstream.forward(service, method, path, query, content_type, body).await {
        Ok(fwd) => {
            audit.relayed(fwd.status);
            fwd.into_response()
        }
        Err(e) => audit.fail(e).into_response(),
    }
}

async fn read_body(state: &AppState, headers: &HeaderMap, body: Body) -> AppResult<Bytes> {
    let max_kb = state.cfg.limits.max_request_kb;
    security::content_length_ok(headers, max_kb)?;
    to_bytes(body, max_kb * 1024).await.map_err(|_| AppError::RequestTooLarge)
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// One structured `audit` line per request. Only client-supplied values are
/// logged; resolved filesystem locations never are.
struct Audit<'a> {
    request_id: String,
    route: &'a str,
    target: &'a str,
    path: Option<&'a str>,
    started: Instant,
}

impl<'a> Audit<'a> {
    fn start(route: &'a str, target: &'a str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            route,
            target,
            path: None,
            started: Instant::now(),
        }
    }

    fn with_path(mut self, path: &'a str) -> Self {
        self.path = Some(path);
        self
    }

    fn ok(self) {
        self.emit("allow", "OK", StatusCode::OK);
    }

    fn relayed(self, status: StatusCode) {
        self.emit("allow", "Relayed", status);
    }

    fn fail(self, err: AppError) -> AppError {
        let decision = if err.status().is_server_error() { "error" } else { "deny" };
        self.emit(decision, err.code(), err.status());
        err
    }

    fn emit(&self, decision: &str, code: &str, status: StatusCode) {
        tracing::info!(
            request_id = %self.request_id,
            route = self.route,
            target = self.target,
            path = ?self.path,
            decision = decision,
            code = code,
            status = status.as_u16(),
            duration_ms = self.started.elapsed().as_millis() as u64,
            "audit"
        );
    }
}
