use std::fmt;

use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};

use crate::config::{Config, StatusPolicy};
use crate::converter::DocumentConverter;
use crate::multipart::UploadForm;
use crate::storage::{JobFiles, Storage};
use crate::types::*;

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub storage: Storage,
    pub converter: DocumentConverter,
    pub status_policy: StatusPolicy,
    pub max_upload_bytes: usize,
    pub retain_files: bool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            storage: Storage::new(&config.upload_dir, &config.output_dir),
            converter: DocumentConverter::new(ImageSettings {
                quality: config.jpeg_quality,
            }),
            status_policy: config.status_codes,
            max_upload_bytes: config.max_upload_bytes,
            retain_files: config.retain_files,
        }
    }

    fn reject(&self, error: ConversionError) -> ApiError {
        ApiError {
            error,
            policy: self.status_policy,
        }
    }
}

/// A failed request, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    error: ConversionError,
    policy: StatusPolicy,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.policy {
            StatusPolicy::Legacy => StatusCode::INTERNAL_SERVER_ERROR,
            StatusPolicy::Distinct => match self.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Library => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.error.to_string(),
        })
    }
}

/// Route table for the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(home))
        .route("/pdf-to-word", web::post().to(pdf_to_word))
        .route("/word-to-pdf", web::post().to(word_to_pdf))
        .route("/merge-pdf", web::post().to(merge_pdf))
        .route("/compress-pdf", web::post().to(compress_pdf))
        .route("/compress-image", web::post().to(compress_image))
        .route("/resize-image", web::post().to(resize_image))
        .route("/image-to-pdf", web::post().to(image_to_pdf))
        .route("/convert-image", web::post().to(convert_image));
}

async fn home() -> HttpResponse {
    HttpResponse::Ok().json(StatusMessage::default())
}

// ========== PDF TOOLS ==========

async fn pdf_to_word(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    process(state, "pdf-to-word", payload, |converter, form| {
        converter.pdf_to_word(form.file("file")?)
    })
    .await
}

async fn word_to_pdf(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    process(state, "word-to-pdf", payload, |converter, form| {
        converter.word_to_pdf(form.file("file")?)
    })
    .await
}

async fn merge_pdf(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    process(state, "merge-pdf", payload, |converter, form| {
        converter.merge_pdfs(&form.files("files")?)
    })
    .await
}

async fn compress_pdf(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    process(state, "compress-pdf", payload, |converter, form| {
        converter.compress_pdf(form.file("file")?)
    })
    .await
}

// ========== IMAGE TOOLS ==========

async fn compress_image(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    process(state, "compress-image", payload, |converter, form| {
        converter.compress_image(form.file("file")?)
    })
    .await
}

async fn resize_image(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    process(state, "resize-image", payload, |converter, form| {
        let width = form.dimension("width")?;
        let height = form.dimension("height")?;
        converter.resize_image(form.file("file")?, width, height)
    })
    .await
}

async fn image_to_pdf(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    process(state, "image-to-pdf", payload, |converter, form| {
        converter.image_to_pdf(form.file("file")?)
    })
    .await
}

async fn convert_image(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    process(state, "convert-image", payload, |converter, form| {
        converter.convert_image(form.file("file")?, form.text("format")?)
    })
    .await
}

/// Shared request pipeline: read the form, persist the uploads, run the
/// conversion on the blocking pool, persist the output and send it back.
async fn process<F>(
    state: web::Data<AppState>,
    route: &'static str,
    payload: Multipart,
    operation: F,
) -> Result<HttpResponse, ApiError>
where
    F: FnOnce(&DocumentConverter, &UploadForm) -> Result<ConvertedFile, ConversionError> + Send + 'static,
{
    log::info!("{} request received", route);

    match run(state.clone(), payload, operation).await {
        Ok(converted) => {
            log::info!(
                "{} succeeded: {} ({} bytes, {})",
                route,
                converted.name,
                converted.content.len(),
                converted.mime_type
            );
            Ok(attachment(converted))
        }
        Err(e) => {
            log::error!("{} failed: {}", route, e);
            Err(state.reject(e))
        }
    }
}

async fn run<F>(
    state: web::Data<AppState>,
    payload: Multipart,
    operation: F,
) -> Result<ConvertedFile, ConversionError>
where
    F: FnOnce(&DocumentConverter, &UploadForm) -> Result<ConvertedFile, ConversionError> + Send + 'static,
{
    let form = UploadForm::read(payload, state.max_upload_bytes).await?;
    let job = state.storage.job();

    let outcome = convert(&state, &job, form, operation).await;

    if !state.retain_files {
        job.cleanup().await;
    }
    outcome
}

async fn convert<F>(
    state: &web::Data<AppState>,
    job: &JobFiles,
    form: UploadForm,
    operation: F,
) -> Result<ConvertedFile, ConversionError>
where
    F: FnOnce(&DocumentConverter, &UploadForm) -> Result<ConvertedFile, ConversionError> + Send + 'static,
{
    for (index, file) in form.all_files().iter().enumerate() {
        job.save_upload(index, file).await?;
    }

    let worker = state.clone();
    let converted = web::block(move || operation(&worker.converter, &form))
        .await
        .map_err(|_| ConversionError::WorkerUnavailable)??;

    job.save_output(&converted).await?;
    Ok(converted)
}

fn attachment(converted: ConvertedFile) -> HttpResponse {
    let disposition = ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(converted.name)],
    };

    HttpResponse::Ok()
        .content_type(converted.mime_type)
        .insert_header(disposition)
        .body(converted.content)
}
