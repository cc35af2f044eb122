#![cfg(unix)]

//! Drives `DemucsCli` against small shell scripts standing in for the real tool.

use stem_splitter_web::config::SeparatorConfig;
use stem_splitter_web::models::UploadRecord;
use stem_splitter_web::services::separation::SeparationService;
use stem_splitter_web::services::separator::{DemucsCli, SeparationError, SeparationTool};
use stem_splitter_web::services::track_store::FsTrackStore;
use stem_splitter_web::services::upload::UploadService;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Without a module the script receives:
/// `-n <model> -o <root> --two-stems <stem> <input>`
const WRITES_STEMS: &str = r#"#!/bin/sh
name=$(basename "$7")
dir="$4/$2/${name%.*}"
mkdir -p "$dir"
printf 'vocal-bytes' > "$dir/$6.wav"
: > "$dir/no_$6.wav"
echo "separated $name"
echo "progress 100%" >&2
"#;

const FAILS: &str = r#"#!/bin/sh
echo "partial output"
echo "RuntimeError: could not load model" >&2
exit 3
"#;

const HANGS: &str = r#"#!/bin/sh
exec sleep 30
"#;

struct Fixture {
    _dir: TempDir,
    config: SeparatorConfig,
}

fn fixture(script: &str, timeout: Duration) -> Fixture {
    let dir = TempDir::new().unwrap();
    let script_path = dir.path().join("fake-demucs.sh");
    std::fs::write(&script_path, script).unwrap();
    std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = SeparatorConfig {
        upload_dir: dir.path().join("uploads"),
        output_root: dir.path().join("separated"),
        python_bin: script_path.to_string_lossy().into_owned(),
        tool_module: String::new(),
        timeout,
        ..SeparatorConfig::default()
    };
    std::fs::create_dir_all(&config.upload_dir).unwrap();
    std::fs::create_dir_all(&config.output_root).unwrap();

    Fixture { _dir: dir, config }
}

async fn saved_upload(config: &SeparatorConfig, name: &str) -> UploadRecord {
    let uploads = UploadService::new(config);
    let pending = uploads.prepare(name).unwrap();
    uploads.save(pending, &b"audio"[..]).await.unwrap()
}

fn service(config: &SeparatorConfig) -> SeparationService {
    SeparationService::new(
        config,
        Arc::new(DemucsCli::new(config)),
        Arc::new(FsTrackStore::new(config)),
    )
}

#[tokio::test]
async fn test_cli_success_keeps_upload_and_reports_present_stems() {
    let f = fixture(WRITES_STEMS, Duration::from_secs(30));
    let upload = saved_upload(&f.config, "song.mp3").await;

    let result = service(&f.config).separate(&upload).await.unwrap();

    assert_eq!(result.stems, vec!["vocals.wav"]);
    assert_eq!(result.track_id, upload.track_id);
    assert_eq!(result.original_display_name, "song.mp3");
    assert_eq!(result.model_name, "htdemucs");
    assert!(upload.stored_path.exists());

    let vocals = f
        .config
        .model_output_dir()
        .join(upload.track_id.as_str())
        .join("vocals.wav");
    assert_eq!(std::fs::read(vocals).unwrap(), b"vocal-bytes");
}

#[tokio::test]
async fn test_cli_captures_streams() {
    let f = fixture(WRITES_STEMS, Duration::from_secs(30));
    let upload = saved_upload(&f.config, "track.wav").await;

    let output = DemucsCli::new(&f.config)
        .separate(&upload.stored_path)
        .await
        .unwrap();
    assert!(output.stdout.contains("separated"));
    assert!(output.stderr.contains("progress 100%"));
}

#[tokio::test]
async fn test_cli_non_zero_exit() {
    let f = fixture(FAILS, Duration::from_secs(30));
    let upload = saved_upload(&f.config, "song.flac").await;

    let err = service(&f.config).separate(&upload).await.unwrap_err();
    match &err {
        SeparationError::ToolFailed {
            code,
            stdout,
            stderr,
        } => {
            assert_eq!(*code, Some(3));
            assert!(stdout.contains("partial output"));
            assert!(stderr.contains("could not load model"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.user_message().contains("could not load model"));
    assert!(!upload.stored_path.exists());
}

#[tokio::test]
async fn test_cli_timeout_is_bounded_and_cleans_up() {
    let f = fixture(HANGS, Duration::from_millis(300));
    let upload = saved_upload(&f.config, "endless.ogg").await;

    let started = Instant::now();
    let err = service(&f.config).separate(&upload).await.unwrap_err();

    assert!(matches!(err, SeparationError::TimedOut(_)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(err.user_message().contains("too long"));
    assert!(!upload.stored_path.exists());
}

#[tokio::test]
async fn test_cli_success_without_output_dir() {
    let f = fixture("#!/bin/sh\nexit 0\n", Duration::from_secs(30));
    let upload = saved_upload(&f.config, "quiet.m4a").await;

    let err = service(&f.config).separate(&upload).await.unwrap_err();
    match err {
        SeparationError::OutputMissing(path) => {
            assert_eq!(
                path,
                f.config.model_output_dir().join(upload.track_id.as_str())
            );
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!upload.stored_path.exists());
}

#[tokio::test]
async fn test_health_check_runs_the_tool() {
    let f = fixture("#!/bin/sh\nexit 0\n", Duration::from_secs(30));
    assert!(DemucsCli::new(&f.config).health_check().await);

    let f = fixture(FAILS, Duration::from_secs(30));
    assert!(!DemucsCli::new(&f.config).health_check().await);
}

#[tokio::test]
async fn test_locate_stem_requires_existing_known_file() {
    let f = fixture(WRITES_STEMS, Duration::from_secs(30));
    let upload = saved_upload(&f.config, "song.mp3").await;
    let svc = service(&f.config);
    svc.separate(&upload).await.unwrap();

    let id = upload.track_id.as_str();
    assert!(svc.locate_stem(id, "vocals.wav").await.is_some());
    assert!(svc.locate_stem(id, "no_vocals.wav").await.is_some());
    assert!(svc.locate_stem(id, "other.wav").await.is_none());
    assert!(svc.locate_stem("../separated", "vocals.wav").await.is_none());
    assert!(
        svc.locate_stem(&format!("{}/..", id), "vocals.wav")
            .await
            .is_none()
    );
    assert!(Path::new(&f.config.output_root).is_dir());
}
