use crate::config::SeparatorConfig;
use crate::models::TrackId;
use std::path::PathBuf;

/// Maps a track to the directory holding its stems.
///
/// Identity lives purely in the path layout today; callers go through this trait so
/// a metadata store can replace it without touching them.
pub trait TrackStore: Send + Sync {
    fn resolve_output_path(&self, track_id: &TrackId) -> PathBuf;
}

/// `{output_root}/{model}/{track_id}`, exactly where the separation tool writes.
pub struct FsTrackStore {
    model_dir: PathBuf,
}

impl FsTrackStore {
    pub fn new(config: &SeparatorConfig) -> Self {
        Self {
            model_dir: config.model_output_dir(),
        }
    }
}

impl TrackStore for FsTrackStore {
    fn resolve_output_path(&self, track_id: &TrackId) -> PathBuf {
        self.model_dir.join(track_id.as_str())
    }
}
