use crate::config::SeparatorConfig;
use tracing::info;

/// Creates the upload directory and the separation output root if missing.
/// The tool creates the per-model folder itself.
pub async fn setup_directories(config: &SeparatorConfig) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tokio::fs::create_dir_all(&config.output_root).await?;

    info!(
        "📁 Storage: uploads={} separated={}",
        config.upload_dir.display(),
        config.output_root.display()
    );
    Ok(())
}
