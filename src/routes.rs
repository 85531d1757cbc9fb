use std::{path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, MatchedPath, Multipart, Query, Request, State,
        multipart::MultipartRejection,
    },
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{MethodRouter, delete, get},
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::error;

use crate::{
    error::{ApiError, GalleryError},
    photo::{BackendKind, DEFAULT_ORIGINAL_NAME, PhotoRecord},
    service::GalleryService,
    storage::DeleteOutcome,
};

const LIST_FAILED: &str = "Failed to fetch photos";
const BLOB_SUFFIX: &str = "-blob";

/// Everything the router needs: the service mounted on the plain endpoints,
/// the blob service mounted on the `-blob` endpoints, and where local media
/// lives when the blob store is on disk.
#[derive(Clone)]
pub struct GalleryRoutes {
    pub primary: Arc<GalleryService>,
    pub blob: Arc<GalleryService>,
    pub max_upload_bytes: usize,
    pub media_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhotoList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub photos: Vec<PhotoRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
struct IndexBody {
    message: &'static str,
    backends: Vec<BackendKind>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(rename = "photoId")]
    pub photo_id: Option<String>,
}

pub fn create_routes(routes: GalleryRoutes) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE]);

    let mut backends = vec![routes.primary.kind()];
    if !Arc::ptr_eq(&routes.primary, &routes.blob) {
        backends.push(routes.blob.kind());
    }

    let mut router = Router::new()
        .route(
            "/",
            get(move || async move {
                Json(IndexBody {
                    message: "Photo gallery API",
                    backends,
                })
            }),
        )
        .merge(backend_routes("", routes.primary.clone(), routes.max_upload_bytes))
        .merge(backend_routes(BLOB_SUFFIX, routes.blob.clone(), routes.max_upload_bytes));
    if let Some(media_dir) = routes.media_dir {
        router = router.nest_service("/media", ServeDir::new(media_dir));
    }

    router
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
}

/// The three endpoints of one backend, each answering OPTIONS with an empty
/// 200 and unknown methods with a JSON 405.
fn backend_routes(suffix: &str, service: Arc<GalleryService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(&format!("/api/photos{suffix}"), endpoint(get(list_photos)))
        .route(
            &format!("/api/upload{suffix}"),
            endpoint(
                get(upload_status)
                    .post(upload_photo)
                    .layer(DefaultBodyLimit::max(max_upload_bytes)),
            ),
        )
        .route(&format!("/api/delete{suffix}"), endpoint(delete(delete_photo)))
        .with_state(service)
}

fn endpoint(
    router: MethodRouter<Arc<GalleryService>>,
) -> MethodRouter<Arc<GalleryService>> {
    router.options(preflight).fallback(method_not_allowed)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found")
}

async fn list_photos(State(service): State<Arc<GalleryService>>) -> Response {
    match service.list(service.list_limit()).await {
        Ok(photos) => (StatusCode::OK, Json(PhotoList { error: None, photos })).into_response(),
        Err(err) => {
            error!(backend = %service.kind(), "failed to fetch photos: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PhotoList {
                    error: Some(LIST_FAILED.to_string()),
                    photos: Vec::new(),
                }),
            )
                .into_response()
        }
    }
}

async fn upload_status(State(service): State<Arc<GalleryService>>) -> Json<MessageBody> {
    Json(MessageBody {
        message: format!("Photo gallery API with {}", service.kind().label()),
    })
}

async fn upload_photo(
    State(service): State<Arc<GalleryService>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PhotoRecord>, ApiError> {
    let mut multipart = multipart
        .map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;

    let mut file = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("file") {
                    let content_type = field.content_type().map(|value| value.to_string());
                    let file_name = field.file_name().unwrap_or(DEFAULT_ORIGINAL_NAME).to_string();
                    let bytes = field.bytes().await.map_err(|err| {
                        ApiError::new(err.status(), format!("Failed to read file: {}", err.body_text()))
                    })?;
                    file = Some((file_name, content_type, bytes));
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                return Err(ApiError::new(
                    err.status(),
                    format!("Failed to parse form: {}", err.body_text()),
                ));
            }
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "No file uploaded"))?;
    service
        .upload(bytes, &file_name, content_type.as_deref())
        .await
        .map(Json)
        .map_err(|err| ApiError::from_gallery(err, "Upload failed"))
}

async fn delete_photo(
    State(service): State<Arc<GalleryService>>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<MessageBody>, ApiError> {
    let photo_id = params.photo_id.unwrap_or_default();
    let outcome = service
        .delete(&photo_id)
        .await
        .map_err(|err| ApiError::from_gallery(err, "Delete failed"))?;
    match outcome {
        DeleteOutcome::Deleted => Ok(Json(MessageBody {
            message: "Photo deleted successfully".to_string(),
        })),
        DeleteOutcome::NotFound => Err(ApiError::from_gallery(
            GalleryError::NotFound("Photo not found or already deleted".to_string()),
            "Delete failed",
        )),
    }
}
