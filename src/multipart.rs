use std::collections::HashMap;

use actix_multipart::Multipart;
use bytes::BytesMut;
use futures_util::TryStreamExt;

use crate::storage::sanitize_filename;
use crate::types::{ConversionError, UploadedFile};

/// All fields of one multipart request.
#[derive(Debug, Default)]
pub struct UploadForm {
    files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Drains the multipart stream. Fields carrying a filename are files,
    /// everything else is read as UTF-8 text. `limit` caps the total body.
    pub async fn read(mut payload: Multipart, limit: usize) -> Result<Self, ConversionError> {
        let mut form = Self::default();
        let mut total = 0usize;

        while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
            let disposition = field.content_disposition();
            let name = disposition.get_name().unwrap_or_default().to_string();
            let filename = disposition.get_filename().map(str::to_string);

            let mut buffer = BytesMut::new();
            while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
                total += chunk.len();
                if total > limit {
                    return Err(ConversionError::UploadTooLarge { limit });
                }
                buffer.extend_from_slice(&chunk);
            }

            match filename {
                Some(filename) => form.files.push(UploadedFile {
                    field: name,
                    filename: sanitize_filename(&filename),
                    content: buffer.freeze(),
                }),
                None => {
                    let value = String::from_utf8(buffer.to_vec())
                        .map_err(|_| ConversionError::invalid(&name, "not valid UTF-8"))?;
                    form.fields.insert(name, value);
                }
            }
        }

        log::debug!(
            "read multipart form: {} file(s), {} field(s), {} bytes",
            form.files.len(),
            form.fields.len(),
            total
        );
        Ok(form)
    }

    /// First file uploaded under `field`.
    pub fn file(&self, field: &str) -> Result<&UploadedFile, ConversionError> {
        self.files
            .iter()
            .find(|f| f.field == field)
            .ok_or_else(|| ConversionError::missing(field))
    }

    /// Every file uploaded under `field`, in arrival order. At least one is required.
    pub fn files(&self, field: &str) -> Result<Vec<&UploadedFile>, ConversionError> {
        let files: Vec<_> = self.files.iter().filter(|f| f.field == field).collect();
        if files.is_empty() {
            return Err(ConversionError::missing(field));
        }
        Ok(files)
    }

    pub fn all_files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn text(&self, field: &str) -> Result<&str, ConversionError> {
        self.fields
            .get(field)
            .map(|v| v.trim())
            .ok_or_else(|| ConversionError::missing(field))
    }

    /// Parses a positive pixel dimension.
    pub fn dimension(&self, field: &str) -> Result<u32, ConversionError> {
        let raw = self.text(field)?;
        match raw.parse::<u32>() {
            Ok(0) => Err(ConversionError::invalid(field, "must be greater than zero")),
            Ok(value) => Ok(value),
            Err(e) => Err(ConversionError::invalid(field, format!("'{raw}' is not an integer: {e}"))),
        }
    }
}

fn multipart_error(e: actix_multipart::MultipartError) -> ConversionError {
    ConversionError::Multipart(e.to_string())
}

#[cfg(test)]
impl UploadForm {
    pub(crate) fn from_parts(files: Vec<UploadedFile>, fields: &[(&str, &str)]) -> Self {
        Self {
            files,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}
