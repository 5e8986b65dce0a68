use std::sync::{Arc, Mutex};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{Duration, Local, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use snaptag_shared::constants::{DEFAULT_SIGNED_URL_TTL_SECS, MAX_SIGNED_URL_TTL_SECS, OWNER_HEADER};
use snaptag_shared::protocol::{
    CreateObject, CreatePicture, PictureQuery, RenameObject, SearchQuery, SignRequest, SignatureParams,
    SignedUrl, SoftDeletePicture, SoftDeleteStats, TodayCount, UpdatePicture, UploadResponse,
};
use snaptag_shared::quota::day_window;
use snaptag_shared::signing::{self, SigningKey};
use snaptag_shared::types::clamp_percent;
use snaptag_shared::OwnerId;
use snaptag_store::{Database, ObjectView, Picture, PictureWithObjects, TaggedObject};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::storage::{content_type_for, extension_for, ImageStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub images: Arc<ImageStore>,
    pub signing_key: SigningKey,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(Any);

    // Multipart framing overhead on top of the image itself.
    let body_limit = state.images.max_size() + 64 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/pictures", get(list_pictures).post(create_picture))
        .route("/pictures/search", get(search_pictures))
        .route("/pictures/today-count", get(today_count))
        .route("/pictures/:id", patch(update_picture))
        .route("/objects", get(list_objects).post(create_object))
        .route("/objects/:id", patch(rename_object))
        .route("/rpc/soft_delete_picture", post(soft_delete_picture))
        .route("/storage/upload", post(upload_image))
        .route("/storage/sign", post(sign_url))
        .route("/storage/object/*path", get(download_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Owner id from the `x-owner-id` header.
fn owner_from(headers: &HeaderMap) -> Result<OwnerId, ServerError> {
    let raw = headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Unauthorized(format!("missing {OWNER_HEADER} header")))?;

    raw.parse()
        .map_err(|_| ServerError::Unauthorized(format!("invalid {OWNER_HEADER} header")))
}

/// Run a closure against the database. The lock is never held across an
/// `.await`.
fn with_db<T>(
    state: &AppState,
    f: impl FnOnce(&mut Database) -> snaptag_store::Result<T>,
) -> Result<T, ServerError> {
    let mut db = state
        .db
        .lock()
        .map_err(|e| ServerError::Internal(format!("Lock poisoned: {e}")))?;
    Ok(f(&mut db)?)
}

// ─── Pictures ───

async fn list_pictures(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<PictureQuery>,
) -> Result<Json<Vec<PictureWithObjects>>, ServerError> {
    let owner = owner_from(&headers)?;

    let pictures = with_db(&state, |db| match query.image_ref.as_deref() {
        Some(image_ref) => match db.find_picture_by_ref(owner, image_ref)? {
            Some(picture) => {
                let objects = db.list_objects_for_picture(picture.id)?;
                Ok(vec![PictureWithObjects { picture, objects }])
            }
            None => Ok(Vec::new()),
        },
        None => db.list_pictures(owner),
    })?;

    debug!(owner = %owner, count = pictures.len(), "Listed pictures");
    Ok(Json(pictures))
}

async fn create_picture(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<CreatePicture>,
) -> Result<(StatusCode, Json<Picture>), ServerError> {
    let owner = owner_from(&headers)?;
    let now = Utc::now();

    let picture = Picture {
        id: Uuid::new_v4(),
        owner_id: owner,
        image_ref: req.image_ref.trim().to_string(),
        display_name: req.display_name,
        description: req.description,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    with_db(&state, |db| db.insert_picture(&picture))?;

    info!(owner = %owner, picture = %picture.id, image = %picture.image_ref, "Picture created");
    Ok((StatusCode::CREATED, Json(picture)))
}

async fn update_picture(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePicture>,
) -> Result<Json<Picture>, ServerError> {
    let owner = owner_from(&headers)?;
    let picture = with_db(&state, |db| db.update_picture(owner, id, &req, Utc::now()))?;

    info!(owner = %owner, picture = %id, "Picture metadata updated");
    Ok(Json(picture))
}

async fn search_pictures(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PictureWithObjects>>, ServerError> {
    let owner = owner_from(&headers)?;
    let pictures = with_db(&state, |db| db.search_pictures(owner, &query.q))?;
    Ok(Json(pictures))
}

/// Pictures created today by the caller, on the server's local calendar.
async fn today_count(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<TodayCount>, ServerError> {
    let owner = owner_from(&headers)?;
    let (window_start, window_end) = day_window(&Local::now());

    let count = with_db(&state, |db| {
        db.count_pictures_created_between(owner, window_start, window_end)
    })?;

    Ok(Json(TodayCount {
        count,
        window_start,
        window_end,
    }))
}

// ─── Objects ───

async fn list_objects(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<ObjectView>>, ServerError> {
    let owner = owner_from(&headers)?;
    let objects = with_db(&state, |db| db.list_object_views(owner))?;
    Ok(Json(objects))
}

async fn create_object(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<CreateObject>,
) -> Result<(StatusCode, Json<TaggedObject>), ServerError> {
    let owner = owner_from(&headers)?;
    let now = Utc::now();

    let x = req.x.and_then(clamp_percent);
    let y = req.y.and_then(clamp_percent);
    let object = TaggedObject {
        id: req.id,
        picture_id: req.picture_id,
        name: req.name.trim().to_string(),
        x,
        y,
        has_ai_coordinates: req.has_ai_coordinates && x.is_some() && y.is_some(),
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    with_db(&state, |db| db.insert_object(owner, &object))?;

    info!(owner = %owner, object = %object.id, picture = %object.picture_id, name = %object.name, "Object created");
    Ok((StatusCode::CREATED, Json(object)))
}

async fn rename_object(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameObject>,
) -> Result<Json<TaggedObject>, ServerError> {
    let owner = owner_from(&headers)?;
    let object = with_db(&state, |db| db.rename_object(owner, id, &req.name, Utc::now()))?;

    info!(owner = %owner, object = %id, name = %object.name, "Object renamed");
    Ok(Json(object))
}

// ─── Remote procedures ───

async fn soft_delete_picture(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<SoftDeletePicture>,
) -> Result<Json<SoftDeleteStats>, ServerError> {
    let owner = owner_from(&headers)?;
    let stats = with_db(&state, |db| db.soft_delete_picture(owner, req.picture_id, Utc::now()))?;
    Ok(Json(stats))
}

// ─── Storage ───

async fn upload_image(
    headers: HeaderMap,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let owner = owner_from(&headers)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let extension = field
            .content_type()
            .and_then(extension_for)
            .or_else(|| field.file_name().map(content_type_for).and_then(extension_for))
            .ok_or_else(|| ServerError::BadRequest("Unsupported image type".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;

        let path = state.images.store_image(owner, &data, extension).await?;

        info!(owner = %owner, path = %path, size = data.len(), "Image uploaded");
        return Ok(Json(UploadResponse {
            path,
            size: data.len(),
        }));
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

async fn sign_url(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<SignRequest>,
) -> Result<Json<SignedUrl>, ServerError> {
    let owner = owner_from(&headers)?;
    signing::validate_storage_path(&req.path)?;

    if !req.path.starts_with(&format!("{owner}/")) {
        return Err(ServerError::Forbidden("path belongs to another owner".into()));
    }

    let ttl = req
        .expires_in
        .unwrap_or(DEFAULT_SIGNED_URL_TTL_SECS)
        .clamp(1, MAX_SIGNED_URL_TTL_SECS);
    let expires_at = Utc::now() + Duration::seconds(ttl);
    let sig = signing::sign_path(&state.signing_key, &req.path, expires_at);

    let signed_url = format!(
        "{}/storage/object/{}?expires={}&sig={}",
        state.config.public_base_url,
        req.path,
        expires_at.timestamp(),
        sig
    );

    debug!(owner = %owner, path = %req.path, ttl, "Signed storage URL");
    Ok(Json(SignedUrl {
        signed_url,
        expires_at,
    }))
}

async fn download_image(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<SignatureParams>,
) -> Result<([(header::HeaderName, &'static str); 1], Vec<u8>), ServerError> {
    signing::verify_path(&state.signing_key, &path, params.expires, &params.sig, Utc::now())?;

    let data = state.images.read_image(&path).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], data))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
