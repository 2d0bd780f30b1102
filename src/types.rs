use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned by `GET /`.
pub const STATUS_MESSAGE: &str = "DiviPDF Multi-Tool API is running successfully!";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl Default for StatusMessage {
    fn default() -> Self {
        Self {
            message: STATUS_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// One file field of a multipart upload. The filename is already sanitized.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub content: Bytes,
}

/// Result of a conversion, sent back as an attachment.
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl ConvertedFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Self {
            name,
            mime_type,
            content,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("missing form field '{field}'")]
    MissingField { field: String },

    #[error("invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("upload exceeds the {limit} byte limit")]
    UploadTooLarge { limit: usize },

    #[error("malformed multipart request: {0}")]
    Multipart(String),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF processing error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("DOCX container error: {0}")]
    Docx(#[from] zip::result::ZipError),

    #[error("Invalid file content: {message}")]
    InvalidContent { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("conversion worker pool is unavailable")]
    WorkerUnavailable,
}

/// Closed classification of every failure a handler can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Library,
    Io,
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. }
            | Self::InvalidField { .. }
            | Self::UnsupportedFormat { .. }
            | Self::UploadTooLarge { .. }
            | Self::Multipart(_) => ErrorKind::InvalidInput,
            Self::Image(_) | Self::Pdf(_) | Self::Docx(_) | Self::InvalidContent { .. } => {
                ErrorKind::Library
            }
            Self::Io(_) | Self::WorkerUnavailable => ErrorKind::Io,
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Encoder settings shared by the image operations.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub quality: u8, // 1-100, JPEG quality used by compress-image
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self { quality: 60 }
    }
}
