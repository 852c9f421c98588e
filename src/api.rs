use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::live::LiveStore;
use crate::poll::PollConfig;
use crate::protocol::{
    File, InvalidFile, PushRequest, ReadRequest, SyncRequest, SyncResponse, UnlockRequest,
    WatchRequest, WatchResponse,
};
use crate::read::Reader;
use crate::reconcile::Reconciler;
use crate::store::FileStore;

/// Shared server state: both stores and the engines built over them.
pub struct ServerState {
    pub static_store: Arc<FileStore>,
    pub live_store: Arc<FileStore>,
    pub reconciler: Reconciler,
    pub live: LiveStore,
    pub reader: Reader,
}

impl ServerState {
    /// Fresh, empty stores. `static_poll` governs `sync` and `read`,
    /// `live_poll` governs `watch`.
    pub fn new(static_poll: PollConfig, live_poll: PollConfig) -> Self {
        let static_store = Arc::new(FileStore::new());
        let live_store = Arc::new(FileStore::new());
        Self {
            reconciler: Reconciler::new(static_store.clone(), static_poll),
            live: LiveStore::new(live_store.clone(), live_poll),
            reader: Reader::new(static_store.clone(), live_store.clone(), static_poll),
            static_store,
            live_store,
        }
    }
}

pub type ApiState = Arc<ServerState>;

impl IntoResponse for InvalidFile {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Static sync
        .route("/sync", post(sync))
        .route("/read", post(read))
        // Live channel
        .route("/watch", post(watch))
        .route("/push", post(push))
        .route("/unlock", post(unlock))
        // Diagnostics
        .route("/static", get(dump_static))
        .route("/live", get(dump_live))
        .route("/files", get(list_files))
        .with_state(state)
}

async fn sync(
    State(state): State<ApiState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, InvalidFile> {
    Ok(Json(state.reconciler.sync(&request).await?))
}

async fn read(State(state): State<ApiState>, Json(request): Json<ReadRequest>) -> Json<File> {
    Json(state.reader.read(&request.key, &request.target).await)
}

async fn watch(
    State(state): State<ApiState>,
    Json(request): Json<WatchRequest>,
) -> Json<WatchResponse> {
    Json(state.live.watch(&request.key, &request.target).await)
}

async fn push(
    State(state): State<ApiState>,
    Json(request): Json<PushRequest>,
) -> Result<&'static str, InvalidFile> {
    Ok(state.live.push(&request.key, request.updated).await?.as_str())
}

async fn unlock(State(state): State<ApiState>, Json(request): Json<UnlockRequest>) -> &'static str {
    state.live.unlock(&request.key).await.as_str()
}

async fn dump_static(State(state): State<ApiState>) -> Json<BTreeMap<String, File>> {
    Json(state.static_store.snapshot().await)
}

async fn dump_live(State(state): State<ApiState>) -> Json<BTreeMap<String, File>> {
    Json(state.live_store.snapshot().await)
}

async fn list_files(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.static_store.keys().await)
}
