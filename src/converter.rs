use crate::docx;
use crate::image_processor::{self, ImageProcessor};
use crate::pdf_processor::PdfProcessor;
use crate::types::*;
use std::path::Path;

/// One operation per route: upload bytes in, attachment out.
pub struct DocumentConverter {
    image_processor: ImageProcessor,
    pdf_processor: PdfProcessor,
}

impl DocumentConverter {
    pub fn new(settings: ImageSettings) -> Self {
        Self {
            image_processor: ImageProcessor::with_settings(settings),
            pdf_processor: PdfProcessor::new(),
        }
    }

    // === PDF TOOLS ===

    pub fn pdf_to_word(&self, file: &UploadedFile) -> Result<ConvertedFile, ConversionError> {
        log::info!("Converting PDF to DOCX: {}", file.filename);
        let pages = self.pdf_processor.extract_page_text(&file.content)?;
        let docx = docx::write_document(&pages)?;
        Ok(ConvertedFile::new(with_extension(&file.filename, "docx"), docx))
    }

    pub fn word_to_pdf(&self, file: &UploadedFile) -> Result<ConvertedFile, ConversionError> {
        log::info!("Converting DOCX to PDF: {}", file.filename);
        let paragraphs = docx::read_paragraphs(&file.content)?;
        let pdf = self.pdf_processor.create_text_pdf(&paragraphs)?;
        Ok(ConvertedFile::new(with_extension(&file.filename, "pdf"), pdf))
    }

    pub fn merge_pdfs(&self, files: &[&UploadedFile]) -> Result<ConvertedFile, ConversionError> {
        log::info!("Merging {} PDFs", files.len());
        let inputs: Vec<&[u8]> = files.iter().map(|f| &f.content[..]).collect();
        let merged = self.pdf_processor.merge_pdfs(&inputs)?;
        Ok(ConvertedFile::new("merged.pdf", merged))
    }

    pub fn compress_pdf(&self, file: &UploadedFile) -> Result<ConvertedFile, ConversionError> {
        log::info!("Compressing PDF: {}", file.filename);
        let compressed = self.pdf_processor.optimize_pdf(&file.content)?;
        Ok(ConvertedFile::new("compressed.pdf", compressed))
    }

    // === IMAGE TOOLS ===

    /// Re-encode in the upload's own format, keeping its filename.
    pub fn compress_image(&self, file: &UploadedFile) -> Result<ConvertedFile, ConversionError> {
        log::info!("Compressing image: {}", file.filename);
        let format = image_processor::detect_format(&file.filename, &file.content)?;
        let compressed = self.image_processor.compress(&file.content, format)?;
        Ok(ConvertedFile::new(file.filename.clone(), compressed))
    }

    pub fn resize_image(
        &self,
        file: &UploadedFile,
        width: u32,
        height: u32,
    ) -> Result<ConvertedFile, ConversionError> {
        log::info!("Resizing image {} to {}x{}", file.filename, width, height);
        let format = image_processor::detect_format(&file.filename, &file.content)?;
        let resized = self.image_processor.resize(&file.content, width, height, format)?;
        Ok(ConvertedFile::new(format!("resized_{}", file.filename), resized))
    }

    pub fn image_to_pdf(&self, file: &UploadedFile) -> Result<ConvertedFile, ConversionError> {
        log::info!("Converting image to PDF: {}", file.filename);
        let pdf = self.pdf_processor.create_pdf_from_image(&file.content)?;
        Ok(ConvertedFile::new(with_extension(&file.filename, "pdf"), pdf))
    }

    /// `target` is the user-supplied format name; its lowercase form becomes
    /// the output extension.
    pub fn convert_image(&self, file: &UploadedFile, target: &str) -> Result<ConvertedFile, ConversionError> {
        log::info!("Converting image {} to {}", file.filename, target);
        let format = image_processor::parse_target_format(target)?;
        let converted = self.image_processor.convert(&file.content, format)?;
        let extension = target.trim().to_lowercase();
        Ok(ConvertedFile::new(with_extension(&file.filename, &extension), converted))
    }
}

impl Default for DocumentConverter {
    fn default() -> Self {
        Self::new(ImageSettings::default())
    }
}

fn with_extension(filename: &str, extension: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    format!("{stem}.{extension}")
}
