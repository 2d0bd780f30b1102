//! DiviPDF conversion service
//!
//! A small HTTP API that turns uploaded PDFs, Word documents and images into
//! other formats: PDF to Word, Word to PDF, PDF merge and compression, image
//! compression, resizing, format conversion and image to PDF.

pub mod config;
pub mod converter;
pub mod docx;
pub mod handlers;
pub mod image_processor;
pub mod multipart;
pub mod pdf_processor;
pub mod storage;
pub mod types;

pub use config::{Config, StatusPolicy};
pub use converter::DocumentConverter;
pub use handlers::{configure, AppState};
pub use types::*;
