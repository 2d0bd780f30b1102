use std::path::PathBuf;

use clap::{builder::BoolishValueParser, Parser, ValueEnum};

/// How failures are mapped to HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StatusPolicy {
    /// Every failure is reported as 500.
    #[default]
    Legacy,
    /// 400 for invalid input, 422 for library failures, 500 for I/O failures.
    Distinct,
}

/// Runtime configuration for the conversion service.
#[derive(Debug, Clone, Parser)]
#[command(name = "divipdf-api", version, about = "PDF and image conversion HTTP API")]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "DIVIPDF_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "DIVIPDF_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Scratch directory for incoming uploads.
    #[arg(long, env = "DIVIPDF_UPLOAD_DIR", default_value = "uploads", value_name = "PATH")]
    pub upload_dir: PathBuf,

    /// Scratch directory for conversion results.
    #[arg(long, env = "DIVIPDF_OUTPUT_DIR", default_value = "output", value_name = "PATH")]
    pub output_dir: PathBuf,

    /// Maximum total size of the files in one request.
    #[arg(long, env = "DIVIPDF_MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// JPEG quality used by compress-image.
    #[arg(
        long,
        env = "DIVIPDF_JPEG_QUALITY",
        default_value_t = 60,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub jpeg_quality: u8,

    /// Status code mapping for failures.
    #[arg(long, env = "DIVIPDF_STATUS_CODES", value_enum, default_value_t = StatusPolicy::Legacy)]
    pub status_codes: StatusPolicy,

    /// Keep per-request upload and output files instead of removing them.
    #[arg(
        long,
        env = "DIVIPDF_RETAIN_FILES",
        action = clap::ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub retain_files: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
            max_upload_bytes: 50 * 1024 * 1024,
            jpeg_quality: 60,
            status_codes: StatusPolicy::Legacy,
            retain_files: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_from_arguments() {
        let config = Config::try_parse_from([
            "divipdf-api",
            "--port",
            "8080",
            "--upload-dir",
            "/tmp/in",
            "--status-codes",
            "distinct",
            "--retain-files",
        ])
        .expect("arguments parse");

        assert_eq!(config.port, 8080);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/in"));
        assert_eq!(config.status_codes, StatusPolicy::Distinct);
        assert!(config.retain_files);
    }

    #[test]
    fn rejects_out_of_range_quality() {
        assert!(Config::try_parse_from(["divipdf-api", "--jpeg-quality", "0"]).is_err());
        assert!(Config::try_parse_from(["divipdf-api", "--jpeg-quality", "101"]).is_err());
    }
}
