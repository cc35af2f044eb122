use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the separation front end.
///
/// Built once at start-up and handed to every component; nothing reads the
/// environment after that.
#[derive(Debug, Clone)]
pub struct SeparatorConfig {
    /// Directory receiving uploaded audio (default: "uploads")
    pub upload_dir: PathBuf,

    /// Root directory passed to the separation tool with `-o` (default: "separated")
    pub output_root: PathBuf,

    /// Separation model selector passed with `-n` (default: "htdemucs")
    pub model_name: String,

    /// Interpreter used to launch the tool (default: "python3")
    pub python_bin: String,

    /// Module run through `-m`; empty runs `python_bin` as the tool itself (default: "demucs")
    pub tool_module: String,

    /// Stem requested with `--two-stems` (default: "vocals")
    pub two_stems: String,

    /// Accepted upload extensions, lowercase with leading dot
    pub allowed_extensions: Vec<String>,

    /// Wall-clock ceiling for one separation run (default: 20 minutes)
    pub timeout: Duration,

    /// Maximum request body size in bytes (default: 100 MB)
    pub max_file_size: usize,

    /// Bind host (default: "0.0.0.0")
    pub host: String,

    /// Bind port (default: 5000)
    pub port: u16,
}

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".flac", ".ogg", ".m4a"];

impl Default for SeparatorConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_root: PathBuf::from("separated"),
            model_name: "htdemucs".to_string(),
            python_bin: "python3".to_string(),
            tool_module: "demucs".to_string(),
            two_stems: "vocals".to_string(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            timeout: Duration::from_secs(20 * 60),
            max_file_size: 100 * 1024 * 1024, // 100 MB
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl SeparatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            output_root: env::var("SEPARATED_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.output_root),

            model_name: env::var("DEMUCS_MODEL").unwrap_or(default.model_name),

            python_bin: env::var("PYTHON_BIN").unwrap_or(default.python_bin),

            tool_module: env::var("DEMUCS_MODULE").unwrap_or(default.tool_module),

            two_stems: env::var("DEMUCS_TWO_STEMS").unwrap_or(default.two_stems),

            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .ok()
                .map(|v| parse_extensions(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or(default.allowed_extensions),

            timeout: env::var("SEPARATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.timeout),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            host: env::var("HOST").unwrap_or(default.host),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        }
    }

    /// Local development: short timeout, loopback only
    pub fn development() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            host: "127.0.0.1".to_string(),
            ..Self::default()
        }
    }

    /// Stem files the tool writes in two-stem mode, in the order they are probed.
    pub fn stem_filenames(&self) -> Vec<String> {
        vec![
            format!("{}.wav", self.two_stems),
            format!("no_{}.wav", self.two_stems),
        ]
    }

    /// Directory the tool creates per model below the output root.
    pub fn model_output_dir(&self) -> PathBuf {
        self.output_root.join(&self.model_name)
    }
}

/// Normalizes a comma separated list like "mp3, .WAV" into [".mp3", ".wav"].
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e))
        .collect()
}
