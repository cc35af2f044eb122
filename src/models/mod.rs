use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use utoipa::ToSchema;

/// Length of the hex token prefixed to every stored upload.
pub const TOKEN_LEN: usize = 32;

const MAX_TRACK_ID_LEN: usize = 255;

/// Key correlating an upload with its separation output directory.
///
/// Always `{token}_{sanitized-base}`: a 32 character lowercase hex token, an
/// underscore, then a non-empty run of `[A-Za-z0-9._-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub struct TrackId(String);

impl TrackId {
    pub fn from_parts(token: &str, base: &str) -> Option<Self> {
        Self::parse(&format!("{}_{}", token, base))
    }

    /// Accepts only identifiers this service could have generated.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() > MAX_TRACK_ID_LEN {
            return None;
        }
        let (token, base) = raw.split_at_checked(TOKEN_LEN)?;
        let base = base.strip_prefix('_')?;

        let token_ok = token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        let base_ok = !base.is_empty()
            && base
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));

        (token_ok && base_ok).then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An accepted upload, living only on the filesystem.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    /// Sanitized client filename, shown back to the user
    pub display_name: String,
    pub stored_path: PathBuf,
    pub track_id: TrackId,
}

/// Outcome of a completed separation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SeparationResult {
    pub track_id: TrackId,
    /// Non-empty stem files, in probe order
    pub stems: Vec<String>,
    pub original_display_name: String,
    pub model_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_parse_accepts_generated_shape() {
        let id = TrackId::parse(&format!("{}_my.song-01", TOKEN)).unwrap();
        assert_eq!(id.as_str(), format!("{}_my.song-01", TOKEN));
        assert_eq!(TrackId::from_parts(TOKEN, "song"), TrackId::parse(&format!("{}_song", TOKEN)));
    }

    #[test]
    fn test_parse_rejects_traversal_and_foreign_shapes() {
        assert!(TrackId::parse("..").is_none());
        assert!(TrackId::parse("../../etc").is_none());
        assert!(TrackId::parse(&format!("{}_a/b", TOKEN)).is_none());
        assert!(TrackId::parse(&format!("{}_a\\b", TOKEN)).is_none());
        assert!(TrackId::parse(&format!("{}_", TOKEN)).is_none());
        assert!(TrackId::parse(&format!("{}-song", TOKEN)).is_none());
        assert!(TrackId::parse("0123456789ABCDEF0123456789ABCDEF_song").is_none());
        assert!(TrackId::parse("abc123_song").is_none());
        assert!(TrackId::parse(&format!("{}_{}", TOKEN, "x".repeat(300))).is_none());
    }

    #[test]
    fn test_parse_handles_multibyte_input() {
        assert!(TrackId::parse("ééééééééééééééééé_song").is_none());
    }
}
