//! HTTP 서버 - axum 라우터
//!
//! 모든 클라이언트 핸들(SQLite, LanceDB, reqwest)은 `AppState`에서
//! 한 번 만들어 핸들러에 주입합니다.

mod chat;
mod content;
mod error;
mod graph;
mod photos;
mod search;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};

pub use error::{ApiError, ApiResult};

use crate::chat::ChatClient;
use crate::config::Config;
use crate::content::{ContentCatalog, ObjectType};
use crate::db::Database;
use crate::graph::{GraphService, GraphStore};
use crate::knowledge::HybridRetriever;
use crate::photos::{LocalBlobStore, PhotoService, PhotoStore};
use crate::tools::AssistantTools;

/// 요청당 최대 결과 수
pub const MAX_LIMIT: usize = 100;
/// 업로드 본문 상한
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// ============================================================================
// AppState
// ============================================================================

/// 공유 애플리케이션 상태
pub struct AppState {
    pub tools: AssistantTools,
    pub chat: ChatClient,
}

impl AppState {
    pub fn new(tools: AssistantTools, chat: ChatClient) -> Self {
        Self { tools, chat }
    }

    /// 설정으로 전체 구성 (카탈로그 로드, 저장소 열기)
    pub async fn open(config: &Config) -> Result<Self> {
        let catalog = ContentCatalog::load(&config.content_dir)
            .with_context(|| format!("Failed to load content from {:?}", config.content_dir))?;
        tracing::info!(
            "Loaded {} publications, {} projects",
            catalog.publications.len(),
            catalog.projects.len()
        );
        let catalog = Arc::new(catalog);

        let db = Database::open(&config.db_path())?;
        let retriever = HybridRetriever::open(config, db.clone(), catalog.clone()).await?;
        let graph = GraphService::new(GraphStore::new(db.clone())?, catalog);
        let photos = PhotoService::new(
            PhotoStore::new(db)?,
            Arc::new(LocalBlobStore::new(config.blob_dir(), &config.public_url)),
            config.admin_secret_key.clone(),
        );

        let tools = AssistantTools::new(Arc::new(retriever), graph, photos);
        Ok(Self::new(tools, ChatClient::from_config(config)?))
    }
}

// ============================================================================
// Query helpers
// ============================================================================

/// 공백뿐인 값은 없는 것으로
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `type` 파라미터 (`all`이나 빈 값은 필터 없음)
pub(crate) fn parse_object_type(raw: Option<&str>) -> ApiResult<Option<ObjectType>> {
    match non_blank(raw) {
        None | Some("all") => Ok(None),
        Some(t) => t
            .parse()
            .map(Some)
            .map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string())),
    }
}

/// `limit` 파라미터 (1..=MAX_LIMIT)
pub(crate) fn parse_limit(raw: Option<&str>, default: usize) -> ApiResult<usize> {
    let Some(raw) = non_blank(raw) else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(ApiError::bad_request(format!(
            "Invalid limit: {} (expected 1..={})",
            raw, MAX_LIMIT
        ))),
    }
}

// ============================================================================
// Router
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// 라우터 구성
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/search", get(search::search))
        .route("/api/related", get(search::related))
        .route("/api/graph", get(graph::stats))
        .route("/api/graph/{id}", get(graph::node_graph).post(graph::rebuild))
        .route("/api/content/{object_type}/{slug}", get(content::details))
        .route("/api/content/{object_type}/{slug}/summary", get(content::summary))
        .route("/api/chat", post(chat::chat))
        .route("/api/photos", get(photos::gallery))
        .route("/api/photos/auth", post(photos::auth))
        .route(
            "/api/photos/upload",
            post(photos::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/blobs/{*path}", get(photos::blob))
        .with_state(state)
}

/// 서버 실행 (Ctrl+C로 종료)
pub async fn serve(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::open(config).await?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("Listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::tools::tests::indexed_tools;

    const BOUNDARY: &str = "folio-test-boundary";

    async fn app(dir: &TempDir) -> Router {
        let tools = indexed_tools(dir.path()).await;
        let chat = ChatClient::new(None, "gpt-4o-mini").unwrap();
        build_router(Arc::new(AppState::new(tools, chat)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::post("/api/photos/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None, 10).unwrap(), 10);
        assert_eq!(parse_limit(Some(" 5 "), 10).unwrap(), 5);
        assert!(parse_limit(Some("0"), 10).is_err());
        assert!(parse_limit(Some("abc"), 10).is_err());
        assert!(parse_limit(Some("1000"), 10).is_err());
    }

    #[test]
    fn test_parse_object_type() {
        assert_eq!(parse_object_type(None).unwrap(), None);
        assert_eq!(parse_object_type(Some("all")).unwrap(), None);
        assert_eq!(
            parse_object_type(Some("project")).unwrap(),
            Some(ObjectType::Project)
        );
        assert!(parse_object_type(Some("video")).is_err());
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, json) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_search_validation() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, json) = get_json(&app, "/api/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (status, _) = get_json(&app, "/api/search?q=%20%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(&app, "/api/search?q=genomics&method=vector").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(&app, "/api/search?q=genomics&type=video").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(&app, "/api/search?q=genomics&limit=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_results() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, json) = get_json(&app, "/api/search?q=genomics&limit=4").await;
        assert_eq!(status, StatusCode::OK);
        let combined = json["combined"].as_array().unwrap();
        assert!(!combined.is_empty());
        assert!(combined.len() <= 4);
        assert!(combined[0]["source"].is_string());
        assert!(combined[0]["metadata"]["kind"].is_string());

        let (status, json) = get_json(&app, "/api/search?q=Cell%20Atlas&method=fallback").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["combined"][0]["object_id"], "cell-atlas");
        assert_eq!(json["combined"][0]["source"], "fallback");
    }

    #[tokio::test]
    async fn test_graph_endpoints() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        // 존재하지 않는 노드는 빈 그래프
        let (status, json) = get_json(&app, "/api/graph/nonexistent").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["nodes"].as_array().unwrap().len(), 0);
        assert_eq!(json["edges"].as_array().unwrap().len(), 0);

        let (status, json) = get_json(&app, "/api/graph/cell-atlas?depth=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["nodes"][0]["id"], "cell-atlas");
        assert_eq!(json["nodes"][0]["type"], "project");

        let (status, _) = get_json(&app, "/api/graph/cell-atlas?depth=deep").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Request::post("/api/graph/cell-atlas").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["generation"].is_i64());
        assert!(json["message"].is_string());

        let (status, json) = get_json(&app, "/api/graph").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["generation"].is_i64());
        assert!(json["totalNodes"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_related_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, _) = get_json(&app, "/api/related?id=genomics-dl").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = get_json(&app, "/api/related?id=genomics-dl&type=publication").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["related"].is_array());

        let (status, json) = get_json(&app, "/api/related?id=missing&type=project").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["related"].as_array().unwrap().len(), 0);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_content_endpoints() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, json) = get_json(&app, "/api/content/publication/genomics-dl").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["title"], "Genomics and Deep Learning");

        let (status, json) = get_json(&app, "/api/content/project/cell-atlas/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "project");
        assert!(json["keyTakeaway"].is_string());

        let (status, json) = get_json(&app, "/api/content/project/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].is_string());

        let (status, _) = get_json(&app, "/api/content/video/x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_degrades_without_upstream() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let request = Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("publications"));

        let request = Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_photo_upload_flow() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let (status, _) = send(&app, multipart(&[("adminKey", "wrong")], Some(("a.jpg", b"jpeg")))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, multipart(&[], Some(("a.jpg", b"jpeg")))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, multipart(&[("adminKey", "admin-key")], None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            multipart(
                &[
                    ("adminKey", "admin-key"),
                    ("caption", "Harbor at dusk"),
                    ("album", "Trips"),
                    ("tags", "Sea, Dusk"),
                ],
                Some(("harbor.JPG", b"jpeg-bytes")),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["photo"]["tags"], serde_json::json!(["sea", "dusk"]));
        assert!(json["photo"]["exif"].is_null());

        let image_url = json["photo"]["image_url"].as_str().unwrap();
        let blob_uri = image_url.trim_start_matches("http://localhost:3000");
        let (status, bytes) = send(&app, Request::get(blob_uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"jpeg-bytes");

        let (status, json) = get_json(&app, "/api/photos?album=Trips&tags=sea").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["totalCount"], 1);

        // 캡션이 검색 인덱스에 들어감
        let (_, json) = get_json(&app, "/api/search?q=harbor&method=keyword").await;
        assert_eq!(json["combined"][0]["object_type"], "photo");
    }

    #[tokio::test]
    async fn test_photo_auth() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let mut request = multipart(&[("adminKey", "admin-key")], None);
        *request.uri_mut() = "/api/photos/auth".parse().unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);

        let mut request = multipart(&[("adminKey", "nope")], None);
        *request.uri_mut() = "/api/photos/auth".parse().unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
