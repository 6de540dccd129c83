use super::{AppResult, AppState, JsonResponse};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tagmesh_core::*;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/tags/resolve", post(resolve_tag))
        .route("/tags/search", get(search_tags))
        .route("/tags/merge", post(merge_tags))
        .route("/tags/:id", get(get_tag).patch(rename_tag))
        .route("/tags/:id/approval", put(set_approval))
        .route("/videos/:id/tags", get(video_tags).post(add_video_tag))
        .route("/videos/:id/tags/:tag_id", delete(remove_video_tag))
        .route("/admin/backfill", post(run_backfill))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    version: String,
    uptime_seconds: u64,
    canonical_count: u64,
}

async fn health(State(state): State<AppState>) -> AppResult<Json<JsonResponse<HealthResponse>>> {
    let stats = state.service.stats()?;
    Ok(Json(JsonResponse::ok(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        canonical_count: stats.store.canonical_count,
    })))
}

async fn stats(State(state): State<AppState>) -> AppResult<Json<JsonResponse<ServiceStats>>> {
    Ok(Json(JsonResponse::ok(state.service.stats()?)))
}

// ── Tags ──

#[derive(Deserialize)]
struct ResolveRequest {
    text: String,
}

#[derive(Serialize)]
struct ResolveResponse {
    tag: CanonicalTag,
    matched_text: String,
    is_new: bool,
    layer: ResolutionLayer,
    similarity: f32,
}

async fn resolve_tag(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> AppResult<Json<JsonResponse<ResolveResponse>>> {
    let resolution = state.service.resolve(&req.text).await?;
    Ok(Json(JsonResponse::ok(ResolveResponse {
        tag: resolution.canonical,
        matched_text: resolution.matched_text,
        is_new: resolution.is_new,
        layer: resolution.layer,
        similarity: resolution.similarity,
    })))
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    approved_only: Option<bool>,
}

async fn search_tags(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<JsonResponse<Vec<CanonicalTag>>>> {
    let hits = state
        .service
        .search(
            &query.q,
            query.limit.unwrap_or(0),
            query.approved_only.unwrap_or(false),
        )
        .await?;
    Ok(Json(JsonResponse::ok(hits)))
}

async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JsonResponse<CanonicalWithAliases>>> {
    Ok(Json(JsonResponse::ok(state.service.get_canonical(id)?)))
}

#[derive(Deserialize)]
struct RenameRequest {
    display_name: String,
}

async fn rename_tag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameRequest>,
) -> AppResult<Json<JsonResponse<CanonicalTag>>> {
    Ok(Json(JsonResponse::ok(
        state.service.rename(id, &req.display_name)?,
    )))
}

#[derive(Deserialize)]
struct ApprovalRequest {
    is_approved: bool,
}

async fn set_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApprovalRequest>,
) -> AppResult<Json<JsonResponse<CanonicalTag>>> {
    Ok(Json(JsonResponse::ok(
        state.service.set_approval(id, req.is_approved)?,
    )))
}

#[derive(Deserialize)]
struct MergeRequest {
    source_id: Uuid,
    target_id: Uuid,
}

async fn merge_tags(
    State(state): State<AppState>,
    Json(req): Json<MergeRequest>,
) -> AppResult<Json<JsonResponse<MergeOutcome>>> {
    Ok(Json(JsonResponse::ok(
        state.service.merge(req.source_id, req.target_id)?,
    )))
}

// ── Videos ──

async fn video_tags(
    State(state): State<AppState>,
    Path(video): Path<Uuid>,
) -> AppResult<Json<JsonResponse<Vec<CanonicalTag>>>> {
    Ok(Json(JsonResponse::ok(state.service.video_tags(video)?)))
}

/// Exactly one of `tag_id` and `name`.
#[derive(Deserialize)]
struct AddVideoTagRequest {
    #[serde(default)]
    tag_id: Option<Uuid>,
    #[serde(default)]
    name: Option<String>,
}

impl AddVideoTagRequest {
    fn into_tag_ref(self) -> Result<TagRef> {
        match (self.tag_id, self.name) {
            (Some(id), None) => Ok(TagRef::Id(id)),
            (None, Some(name)) => Ok(TagRef::Name(name)),
            _ => Err(TagError::InvalidInput(
                "provide exactly one of tag_id or name".to_string(),
            )),
        }
    }
}

async fn add_video_tag(
    State(state): State<AppState>,
    Path(video): Path<Uuid>,
    Json(req): Json<AddVideoTagRequest>,
) -> AppResult<Json<JsonResponse<CanonicalTag>>> {
    let tag = req.into_tag_ref()?;
    Ok(Json(JsonResponse::ok(
        state.service.add_tag_to_video(video, tag).await?,
    )))
}

#[derive(Serialize)]
struct RemovedLink {
    video_id: Uuid,
    tag_id: Uuid,
}

async fn remove_video_tag(
    State(state): State<AppState>,
    Path((video, tag)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<JsonResponse<RemovedLink>>> {
    state.service.remove_tag_from_video(video, tag)?;
    Ok(Json(JsonResponse::ok(RemovedLink {
        video_id: video,
        tag_id: tag,
    })))
}

// ── Admin ──

#[derive(Deserialize)]
struct BackfillQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn run_backfill(
    State(state): State<AppState>,
    Query(query): Query<BackfillQuery>,
) -> AppResult<Json<JsonResponse<BackfillReport>>> {
    let limit = query.limit.unwrap_or(state.backfill_batch);
    Ok(Json(JsonResponse::ok(
        state.service.backfill_embeddings(limit).await?,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Fixed 2-d vectors; unknown text fails like an unreachable provider.
    struct TableEmbedder(HashMap<String, Embedding>);

    #[async_trait]
    impl EmbeddingProvider for TableEmbedder {
        async fn embed(&self, text: &str) -> tagmesh_core::Result<Embedding> {
            self.0
                .get(&normalize(text))
                .cloned()
                .ok_or_else(|| TagError::Provider(format!("no vector for {:?}", text)))
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "table"
        }
    }

    fn app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let embedder = TableEmbedder(HashMap::from([
            ("money".to_string(), vec![1.0, 0.0]),
            ("finance".to_string(), vec![0.97, 0.2]),
            ("travel".to_string(), vec![0.0, 1.0]),
        ]));
        let config = ResolverConfig::default();
        let providers = Providers::none(Duration::from_secs(2)).with_embedding(Arc::new(embedder));
        let service = TagService::open(dir.path().join("tags.redb"), providers, config).unwrap();
        let state = AppState {
            service: Arc::new(service),
            backfill_batch: 10,
            start_time: Instant::now(),
        };
        (create_router(state), dir)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn resolve(app: &Router, text: &str) -> Value {
        let (status, body) = call(app, Method::POST, "/tags/resolve", Some(json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"].clone()
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let (app, _dir) = app();
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["healthy"], true);

        resolve(&app, "money").await;
        let (_, body) = call(&app, Method::GET, "/stats", None).await;
        assert_eq!(body["data"]["canonical_count"], 1);
        assert_eq!(body["data"]["alias_count"], 1);
        assert_eq!(body["data"]["indexed_vectors"], 1);
    }

    #[tokio::test]
    async fn test_resolve_layers_over_http() {
        let (app, _dir) = app();

        let first = resolve(&app, "Money").await;
        assert_eq!(first["is_new"], true);
        assert_eq!(first["layer"], "new_canonical");

        let again = resolve(&app, "  MONEY ").await;
        assert_eq!(again["is_new"], false);
        assert_eq!(again["layer"], "exact_alias");
        assert_eq!(again["matched_text"], "money");
        assert_eq!(again["tag"]["id"], first["tag"]["id"]);

        let near = resolve(&app, "finance").await;
        assert_eq!(near["layer"], "semantic_match");
        assert_eq!(near["tag"]["id"], first["tag"]["id"]);

        let far = resolve(&app, "travel").await;
        assert_eq!(far["is_new"], true);
        assert_ne!(far["tag"]["id"], first["tag"]["id"]);
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let (app, _dir) = app();

        let (status, body) = call(&app, Method::POST, "/tags/resolve", Some(json!({ "text": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());

        let missing = format!("/tags/{}", Uuid::now_v7());
        let (status, _) = call(&app, Method::GET, &missing, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let tag = resolve(&app, "money").await["tag"]["id"].clone();
        let (status, _) = call(
            &app,
            Method::POST,
            "/tags/merge",
            Some(json!({ "source_id": tag, "target_id": tag })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tag_moderation_and_search() {
        let (app, _dir) = app();
        let id = resolve(&app, "money").await["tag"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/tags/{}", id),
            Some(json!({ "display_name": "Money & Finance" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["slug"], "money-finance");

        let (_, body) = call(&app, Method::GET, "/tags/search?q=mon&approved_only=true", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/tags/{}/approval", id),
            Some(json!({ "is_approved": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_approved"], true);

        let (_, body) = call(&app, Method::GET, "/tags/search?q=mon&approved_only=true", None).await;
        assert_eq!(body["data"][0]["id"], id.as_str());

        let (_, body) = call(&app, Method::GET, &format!("/tags/{}", id), None).await;
        assert_eq!(body["data"]["aliases"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_over_http() {
        let (app, _dir) = app();
        let source = resolve(&app, "money").await["tag"]["id"].clone();
        let target = resolve(&app, "travel").await["tag"]["id"].clone();

        let (status, body) = call(
            &app,
            Method::POST,
            "/tags/merge",
            Some(json!({ "source_id": source, "target_id": target })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["merged_alias_count"], 1);
        assert_eq!(body["data"]["source_deleted"], true);

        assert_eq!(resolve(&app, "money").await["tag"]["id"], target);
    }

    #[tokio::test]
    async fn test_video_links() {
        let (app, _dir) = app();
        let video = Uuid::now_v7();
        let uri = format!("/videos/{}/tags", video);

        let (status, body) = call(&app, Method::POST, &uri, Some(json!({ "name": "Money" }))).await;
        assert_eq!(status, StatusCode::OK);
        let tag = body["data"]["id"].as_str().unwrap().to_string();

        // Same tag by id is a no-op
        call(&app, Method::POST, &uri, Some(json!({ "tag_id": tag }))).await;
        let (_, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, Method::POST, &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let link = format!("{}/{}", uri, tag);
        let (status, _) = call(&app, Method::DELETE, &link, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::DELETE, &link, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_backfill_endpoint() {
        let (app, _dir) = app();
        // Unknown to the embedder: stored pending backfill
        let created = resolve(&app, "unmapped").await;
        assert_eq!(created["layer"], "no_embedding");

        let (status, body) = call(&app, Method::POST, "/admin/backfill?limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["processed"], 1);
        assert_eq!(body["data"]["failed"], 1);
    }
}
