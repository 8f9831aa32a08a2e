use crate::config::Config;
use crate::engine::{EngineRequest, OcrEngine};
use crate::engines;
use crate::error::OcrError;
use crate::layout::{self, LayoutOptions, Page};
use crate::options::{Endpoint, RequestOptions, TEXT_ONLY_OPTIONS};
use crate::preprocessing::intermediate::safe_stem;
use crate::preprocessing::{Binarizer, Intermediates, Pipeline};
use crate::scratch::Scratch;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn OcrEngine>,
    pub config: Arc<Config>,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(engine: Arc<dyn OcrEngine>, config: Config) -> Self {
        let pipeline = Pipeline::new(Binarizer::new(config.variants), config.patch_size);
        Self {
            engine,
            config: Arc::new(config),
            pipeline,
        }
    }
}

/// Text OCR response for a single file
#[derive(Serialize)]
pub struct OcrOutput {
    #[serde(rename = "_usages")]
    pub usages: Vec<serde_json::Value>,
    pub outcome: Option<Page>,
}

/// Text OCR response, one page per uploaded file
#[derive(Serialize)]
pub struct OcrBatchOutput {
    #[serde(rename = "_usages")]
    pub usages: Vec<serde_json::Value>,
    pub outcome: Vec<Page>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: String,
    pub tesseract_version: Option<String>,
    pub languages: Vec<String>,
    pub default_language: String,
    pub max_file_size_bytes: usize,
}

#[derive(Serialize)]
pub struct RouteInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub summary: &'static str,
}

const ROUTES: [RouteInfo; 6] = [
    RouteInfo {
        method: "GET",
        path: "/",
        summary: "List endpoints",
    },
    RouteInfo {
        method: "GET",
        path: "/health",
        summary: "Health check",
    },
    RouteInfo {
        method: "GET",
        path: "/info",
        summary: "Get OCR-Engine Info",
    },
    RouteInfo {
        method: "POST",
        path: "/ocr",
        summary: "Run OCR on a single file",
    },
    RouteInfo {
        method: "POST",
        path: "/ocr-batch",
        summary: "Run OCR on multiple files",
    },
    RouteInfo {
        method: "POST",
        path: "/ocr-to-pdf",
        summary: "Generate PDF from single file",
    },
];

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let engine = engines::create(&config);
    let addr = format!("{}:{}", config.host, config.port);

    let app = router(AppState::new(engine, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/ocr", post(handle_ocr))
        .route("/ocr-batch", post(handle_ocr_batch))
        .route("/ocr-to-pdf", post(handle_ocr_to_pdf))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_file_size)),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}

/// An uploaded file
#[derive(Clone)]
struct Upload {
    file_name: String,
    data: Bytes,
}

/// Parsed multipart form
#[derive(Default)]
struct OcrForm {
    /// `(field name, file)` in form order
    files: Vec<(String, Upload)>,
    options: Option<String>,
    /// Names of other plain text fields
    fields: Vec<String>,
}

impl OcrForm {
    async fn read(mut multipart: Multipart, max_file_size: usize) -> Result<Self, OcrError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| OcrError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(|s| s.to_string());

            if file_name.is_some() || name == "file" {
                let data = field.bytes().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?;
                if data.len() > max_file_size {
                    return Err(OcrError::ImageTooLarge {
                        size: data.len(),
                        max: max_file_size,
                    });
                }
                if data.is_empty() {
                    continue;
                }
                let file_name = file_name.unwrap_or_else(|| name.clone());
                form.files.push((name, Upload { file_name, data }));
            } else if name == "options" {
                form.options = Some(field.text().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Invalid options: {}", e))
                })?);
            } else {
                form.fields.push(name);
            }
        }

        Ok(form)
    }

    fn take_file(&mut self, field: &str) -> Result<Upload, OcrError> {
        let index = self
            .files
            .iter()
            .position(|(name, _)| name == field)
            .ok_or(OcrError::MissingFile)?;
        Ok(self.files.remove(index).1)
    }
}

/// Run a blocking closure on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, OcrError>
where
    F: FnOnce() -> Result<T, OcrError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OcrError::Internal(format!("Worker task failed: {}", e)))?
}

/// Preprocess every upload in parallel and write the results into the
/// request's scratch directory, keeping upload order.
async fn prepare_uploads(
    state: &AppState,
    scratch: &Arc<Scratch>,
    uploads: &[Upload],
    options: &RequestOptions,
) -> Result<Vec<PathBuf>, OcrError> {
    let tasks = uploads.iter().enumerate().map(|(index, upload)| {
        let pipeline = state.pipeline;
        let scratch = Arc::clone(scratch);
        let upload = upload.clone();
        let optimize = options.optimize_images;
        let intermediates = options.save_intermediate.then(|| {
            Intermediates::new(
                &state.config.intermediate_dir,
                scratch.id(),
                index,
                &upload.file_name,
            )
        });

        blocking(move || {
            let result = pipeline.process(&upload.data, optimize, intermediates.as_ref())?;
            tracing::debug!(
                file = %upload.file_name,
                branch = ?result.branch,
                inverted = result.inverted,
                "Preprocessed image in {}ms",
                result.total_time_ms
            );
            scratch.write_image(index, &upload.file_name, &result.image)
        })
    });

    futures::future::try_join_all(tasks).await
}

/// Run the pipelines and the engine, then group the TSV into pages. Temp
/// files are gone once this returns, on success and on error alike.
async fn recognize(
    state: &AppState,
    uploads: Vec<Upload>,
    options: &RequestOptions,
) -> Result<Vec<Page>, OcrError> {
    let scratch = Arc::new(Scratch::new()?);

    let image_paths = prepare_uploads(state, &scratch, &uploads, options).await?;
    let input = scratch.engine_input(&image_paths)?;

    let engine = Arc::clone(&state.engine);
    let request = EngineRequest::from(options);
    let tsv = blocking(move || engine.image_to_data(&input, &request)).await?;

    let file_names: Vec<String> = uploads.into_iter().map(|u| u.file_name).collect();
    layout::build_pages(
        &file_names,
        &tsv,
        LayoutOptions {
            intra_block_breaks: options.intra_block_breaks,
            keep_details: options.keep_details,
        },
    )
}

/// Handle single-file OCR requests
async fn handle_ocr(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OcrOutput>, OcrError> {
    let start = Instant::now();

    let mut form = OcrForm::read(multipart, state.config.max_file_size).await?;
    let upload = form.take_file("file")?;
    let options = RequestOptions::parse(
        Endpoint::Ocr,
        &state.config.default_language,
        form.options.as_deref(),
    )?;

    let pages = recognize(&state, vec![upload], &options).await?;

    tracing::info!(
        "OCR completed in {}ms, pages: {}",
        start.elapsed().as_millis(),
        pages.len()
    );

    Ok(Json(OcrOutput {
        usages: Vec::new(),
        outcome: pages.into_iter().next(),
    }))
}

/// Handle multi-file OCR requests
async fn handle_ocr_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OcrBatchOutput>, OcrError> {
    let start = Instant::now();

    let form = OcrForm::read(multipart, state.config.max_file_size).await?;
    if form.files.is_empty() {
        return Err(OcrError::MissingFile);
    }
    let options = RequestOptions::parse(
        Endpoint::OcrBatch,
        &state.config.default_language,
        form.options.as_deref(),
    )?;
    let uploads: Vec<Upload> = form.files.into_iter().map(|(_, upload)| upload).collect();
    let file_count = uploads.len();

    let pages = recognize(&state, uploads, &options).await?;

    tracing::info!(
        "Batch OCR of {} files completed in {}ms, pages: {}",
        file_count,
        start.elapsed().as_millis(),
        pages.len()
    );

    Ok(Json(OcrBatchOutput {
        usages: Vec::new(),
        outcome: pages,
    }))
}

/// Handle searchable-PDF requests
async fn handle_ocr_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, OcrError> {
    let start = Instant::now();

    let mut form = OcrForm::read(multipart, state.config.max_file_size).await?;
    let upload = form.take_file("file")?;
    if let Some(option) = TEXT_ONLY_OPTIONS
        .iter()
        .find(|option| form.fields.iter().any(|f| f == *option))
    {
        return Err(OcrError::UnsupportedOption(option.to_string()));
    }
    let options = RequestOptions::parse(
        Endpoint::OcrToPdf,
        &state.config.default_language,
        form.options.as_deref(),
    )?;

    let scratch = Arc::new(Scratch::new()?);
    let mut image_paths =
        prepare_uploads(&state, &scratch, std::slice::from_ref(&upload), &options).await?;
    let input = image_paths.pop().ok_or(OcrError::MissingFile)?;

    let engine = Arc::clone(&state.engine);
    let request = EngineRequest::from(&options);
    let pdf = blocking(move || engine.image_to_pdf(&input, &request)).await?;
    drop(scratch);

    tracing::info!(
        "PDF generated in {}ms, size: {} bytes",
        start.elapsed().as_millis(),
        pdf.len()
    );

    let disposition = format!("inline; filename=\"{}.pdf\"", safe_stem(&upload.file_name));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

/// List the available endpoints
async fn handle_index() -> impl IntoResponse {
    Json(ROUTES)
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let engine = Arc::clone(&state.engine);
    let details = blocking(move || Ok((engine.version(), engine.languages()))).await;

    let (tesseract_version, languages) = match details {
        Ok((version, languages)) => {
            let version = version
                .map_err(|e| tracing::warn!("Engine version unavailable: {}", e))
                .ok();
            let languages = languages
                .map_err(|e| tracing::warn!("Engine languages unavailable: {}", e))
                .unwrap_or_default();
            (version, languages)
        }
        Err(e) => {
            tracing::warn!("Engine query failed: {}", e);
            (None, Vec::new())
        }
    };

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.engine.name().to_string(),
        tesseract_version,
        languages,
        default_language: state.config.default_language.clone(),
        max_file_size_bytes: state.config.max_file_size,
    })
}
