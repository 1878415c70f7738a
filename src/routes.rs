use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    handler::HandlerWithoutStateExt,
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    config::Config,
    cors,
    error::AppError,
    fanout::edit_all_presets,
    models::{CustomEditResponse, EditResult, PresetEditResponse, StylePreset, UploadResult, UploadedImage},
    openai::OpenAiClient,
    prompts::{custom_prompt, parse_allow_modify},
    storage::{public_link, upload_key, BlobMeta, BlobStore, FsBlobStore, MemoryBlobStore, StorageError, DEFAULT_CONTENT_TYPE},
};

const NO_IMAGE: &str = "No image uploaded";
const NO_FILE: &str = "No file uploaded";
const MISSING_PROMPT: &str = "Missing prompt";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub openai: Arc<OpenAiClient>,
    pub presets: Arc<Vec<StylePreset>>,
    /// Set only when uploads are enabled.
    pub blobs: Option<Arc<dyn BlobStore>>,
}

impl AppState {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let openai = OpenAiClient::from_config(&config)?;
        let blobs = config.upload.as_ref().map(|upload| {
            let store: Arc<dyn BlobStore> = match &upload.blob_dir {
                Some(dir) => {
                    tracing::info!("📦 Uploads stored under {}", dir.display());
                    Arc::new(FsBlobStore::new(dir))
                }
                None => {
                    tracing::warn!("📦 BLOB_DIR not set, uploads are kept in memory only");
                    Arc::new(MemoryBlobStore::default())
                }
            };
            store
        });
        Ok(Self {
            presets: Arc::new(config.profile.presets()),
            openai: Arc::new(openai),
            blobs,
            config: Arc::new(config),
        })
    }

    pub fn with_blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(store);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/edit", post(edit_presets).fallback(not_found))
        .route("/edit-custom", post(edit_custom).fallback(not_found));

    if state.blobs.is_some() && state.config.upload.is_some() {
        router = router
            .route("/upload", post(upload).fallback(not_found))
            .route("/uploads/*key", get(fetch_upload).fallback(not_found));
    }

    router = match &state.config.static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(not_found.into_service()),
        ),
        None => router.fallback(not_found),
    };

    let trusted_suffix: Arc<str> = Arc::from(state.config.trusted_origin_suffix.as_str());
    router
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(trusted_suffix, cors::cors))
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

#[derive(Debug, Default)]
struct EditForm {
    image: Option<UploadedImage>,
    prompt: Option<String>,
    allow_modify: Option<String>,
    styles: Option<String>,
}

async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> Result<EditForm, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::info!("⚠️ Not a multipart form: {}", rejection.body_text());
        AppError::bad_request(NO_IMAGE)
    })?;

    let mut form = EditForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                // a plain text value named `image` is not a file
                let Some(filename) = field.file_name().map(str::to_string) else { continue };
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    continue;
                }
                form.image = Some(UploadedImage {
                    bytes,
                    filename: Some(filename).filter(|n| !n.is_empty()),
                    content_type,
                });
            }
            "prompt" => form.prompt = Some(field.text().await?),
            "allowModify" => form.allow_modify = Some(field.text().await?),
            "styles" => form.styles = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

/// Per-request preset override: a JSON array of `{slug, prompt}`.
fn parse_styles(raw: &str) -> Result<Vec<StylePreset>, AppError> {
    let styles: Vec<StylePreset> = serde_json::from_str(raw)
        .map_err(|e| AppError::bad_request(format!("Invalid styles: {e}")))?;
    if styles.is_empty() {
        return Err(AppError::bad_request("Invalid styles: at least one style is required"));
    }
    Ok(styles)
}

pub async fn edit_presets(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PresetEditResponse>, AppError> {
    let form = read_form(multipart).await?;
    let image = form.image.ok_or_else(|| AppError::bad_request(NO_IMAGE))?;
    let user_prompt = form.prompt.unwrap_or_default();

    let requested = match form.styles.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_styles(raw)?),
        _ => None,
    };
    let presets = requested.as_deref().unwrap_or(state.presets.as_slice());

    tracing::info!("🎨 Preset edit: {} styles, {} image bytes", presets.len(), image.bytes.len());

    let openai = &state.openai;
    let image = &image;
    let results = edit_all_presets(presets, &user_prompt, |prompt| async move {
        openai.edit_image(image, &prompt).await
    })
    .await?;

    Ok(Json(PresetEditResponse { results }))
}

pub async fn edit_custom(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CustomEditResponse>, AppError> {
    let form = read_form(multipart).await?;
    let image = form.image.ok_or_else(|| AppError::bad_request(NO_IMAGE))?;
    let user_prompt = form.prompt.as_deref().map(str::trim).unwrap_or_default();
    if user_prompt.is_empty() {
        return Err(AppError::bad_request(MISSING_PROMPT));
    }

    let allow_modify = parse_allow_modify(form.allow_modify.as_deref());
    let prompt = custom_prompt(user_prompt, allow_modify, state.config.profile.guardrail());
    tracing::info!("🎯 Custom edit (allow_modify={}): {} chars", allow_modify, prompt.len());

    let b64 = state.openai.edit_image(&image, &prompt).await?;
    Ok(Json(CustomEditResponse { result: EditResult::from_b64(None, &b64) }))
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResult>, AppError> {
    let (Some(blobs), Some(upload_config)) = (&state.blobs, &state.config.upload) else {
        return Err(AppError::NotFound);
    };

    let form = read_form(multipart).await?;
    let image = form.image.ok_or_else(|| AppError::bad_request(NO_FILE))?;

    let key = upload_key(Utc::now(), image.filename.as_deref());
    let content_type = image
        .content_type
        .clone()
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    blobs.put(&key, image.bytes, BlobMeta { content_type }).await?;

    let link = public_link(&upload_config.public_base_url, &key);
    tracing::info!("✅ Uploaded {}", link);
    Ok(Json(UploadResult { success: true, key, link }))
}

/// Serves a stored upload with the content type it was stored under.
pub async fn fetch_upload(State(state): State<AppState>, Path(rest): Path<String>) -> Result<Response, AppError> {
    let Some(blobs) = &state.blobs else {
        return Err(AppError::NotFound);
    };

    let key = format!("uploads/{rest}");
    let stored = match blobs.get(&key).await {
        Ok(stored) => stored,
        Err(StorageError::InvalidKey(_)) => None,
        Err(e) => return Err(e.into()),
    };
    let (bytes, meta) = stored.ok_or(AppError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, meta.content_type)], bytes).into_response())
}
