use crate::config::SeparatorConfig;
use crate::services::separator::{DemucsCli, SeparationTool};
use std::sync::Arc;
use tracing::info;

pub async fn setup_separator(config: &SeparatorConfig) -> Arc<dyn SeparationTool> {
    let tool = DemucsCli::new(config);

    // Probe only; a missing tool shows up again as an invocation error per request.
    if tool.health_check().await {
        info!(
            "🎛️  Separation tool available ({} -m {}, model {})",
            config.python_bin, config.tool_module, config.model_name
        );
    } else {
        tracing::warn!(
            "⚠️  Separation tool could not be launched with '{}'. Uploads will fail until it is installed.",
            config.python_bin
        );
    }

    Arc::new(tool)
}
