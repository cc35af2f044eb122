use crate::config::SeparatorConfig;
use crate::models::{SeparationResult, TrackId, UploadRecord};
use crate::services::separator::{SeparationError, SeparationTool};
use crate::services::track_store::TrackStore;
use crate::utils::validation::is_known_stem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs the separation tool for a saved upload and maps its filesystem output
/// back to downloadable stems.
pub struct SeparationService {
    tool: Arc<dyn SeparationTool>,
    tracks: Arc<dyn TrackStore>,
    stems: Vec<String>,
    model_name: String,
    model_dir: PathBuf,
}

impl SeparationService {
    pub fn new(
        config: &SeparatorConfig,
        tool: Arc<dyn SeparationTool>,
        tracks: Arc<dyn TrackStore>,
    ) -> Self {
        Self {
            tool,
            tracks,
            stems: config.stem_filenames(),
            model_name: config.model_name.clone(),
            model_dir: config.model_output_dir(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Separates `upload`. Every failure removes the uploaded input; on success it is kept.
    pub async fn separate(&self, upload: &UploadRecord) -> Result<SeparationResult, SeparationError> {
        match self.run(upload).await {
            Ok(result) => Ok(result),
            Err(e) => {
                remove_upload(&upload.stored_path).await;
                Err(e)
            }
        }
    }

    async fn run(&self, upload: &UploadRecord) -> Result<SeparationResult, SeparationError> {
        let output = self
            .tool
            .separate(&upload.stored_path)
            .await
            .inspect_err(log_tool_failure)?;

        tracing::info!("Separation stdout: {}", output.stdout);
        if !output.stderr.is_empty() {
            // Demucs reports progress on stderr
            tracing::info!("Separation stderr (info/warnings): {}", output.stderr);
        }

        let track_dir = self.tracks.resolve_output_path(&upload.track_id);
        tracing::info!("Expecting separation output in: {}", track_dir.display());

        if !is_dir(&track_dir).await {
            tracing::error!("Separation output folder NOT FOUND: {}", track_dir.display());
            if is_dir(&self.model_dir).await {
                tracing::info!(
                    "Contents of {}: {:?}",
                    self.model_dir.display(),
                    list_dir(&self.model_dir).await
                );
            }
            return Err(SeparationError::OutputMissing(track_dir));
        }

        let stems = probe_stems(&track_dir, &self.stems).await;
        if stems.is_empty() {
            tracing::error!(
                "Output folder {} exists, but no valid stem files ({}) found",
                track_dir.display(),
                self.stems.join(", ")
            );
            tracing::info!(
                "Actual contents of {}: {:?}",
                track_dir.display(),
                list_dir(&track_dir).await
            );
            return Err(SeparationError::NoUsableStems(track_dir));
        }

        Ok(SeparationResult {
            track_id: upload.track_id.clone(),
            stems,
            original_display_name: upload.display_name.clone(),
            model_name: self.model_name.clone(),
        })
    }

    /// Resolves a download request. Both segments are untrusted: the track id must
    /// have the generated shape and the stem must be one the tool writes.
    pub async fn locate_stem(&self, track_id: &str, stem_filename: &str) -> Option<PathBuf> {
        let Some(track_id) = TrackId::parse(track_id) else {
            tracing::warn!("Rejected download for malformed track id {:?}", track_id);
            return None;
        };
        if !is_known_stem(stem_filename, &self.stems) {
            tracing::warn!("Rejected download for unknown stem {:?}", stem_filename);
            return None;
        }

        let path = self.tracks.resolve_output_path(&track_id).join(stem_filename);
        tracing::info!("Full path: '{}'", path.display());

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

/// Stems from `expected` that exist with a non-zero size, in `expected` order.
pub async fn probe_stems(track_dir: &Path, expected: &[String]) -> Vec<String> {
    let mut found = Vec::with_capacity(expected.len());
    for stem in expected {
        let path = track_dir.join(stem);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => found.push(stem.clone()),
            _ => tracing::warn!(
                "Expected stem file NOT found or is empty: {}",
                path.display()
            ),
        }
    }
    found
}

fn log_tool_failure(e: &SeparationError) {
    match e {
        SeparationError::ToolFailed {
            code,
            stdout,
            stderr,
        } => {
            tracing::error!("Separation tool failed with exit code {:?}", code);
            tracing::error!("Separation stdout: {}", stdout);
            tracing::error!("Separation stderr: {}", stderr);
        }
        SeparationError::TimedOut(limit) => {
            tracing::error!("Separation process timed out after {:?}", limit);
        }
        other => {
            tracing::error!("Unexpected error during separation: {}", other);
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn list_dir(path: &Path) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(path).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    names
}

async fn remove_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::info!("Removed uploaded file: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!("Error cleaning up uploaded file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn expected() -> Vec<String> {
        vec!["vocals.wav".to_string(), "no_vocals.wav".to_string()]
    }

    #[tokio::test]
    async fn test_probe_skips_empty_and_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("vocals.wav"), vec![1u8; 1024]).unwrap();
        std::fs::write(dir.path().join("no_vocals.wav"), b"").unwrap();

        assert_eq!(probe_stems(dir.path(), &expected()).await, vec!["vocals.wav"]);
    }

    #[tokio::test]
    async fn test_probe_keeps_fixed_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("no_vocals.wav"), b"b").unwrap();
        std::fs::write(dir.path().join("vocals.wav"), b"a").unwrap();

        assert_eq!(
            probe_stems(dir.path(), &expected()).await,
            vec!["vocals.wav", "no_vocals.wav"]
        );
    }

    #[tokio::test]
    async fn test_probe_ignores_directories_with_stem_names() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("vocals.wav")).unwrap();

        assert!(probe_stems(dir.path(), &expected()).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_dir_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b"), b"").unwrap();
        std::fs::write(dir.path().join("a"), b"").unwrap();
        assert_eq!(list_dir(dir.path()).await, vec!["a", "b"]);
        assert!(list_dir(&dir.path().join("missing")).await.is_empty());
    }
}
