use crate::config::SeparatorConfig;
use std::borrow::Cow;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// Characters of tool stderr shown to the user
const USER_DETAIL_CHARS: usize = 250;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SeparationError {
    #[error("separation tool exited with code {code:?}")]
    ToolFailed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("separation tool timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to invoke separation tool: {0}")]
    Invocation(#[source] std::io::Error),

    #[error("output directory missing despite successful exit: {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("no usable stems in {}", .0.display())]
    NoUsableStems(PathBuf),
}

impl SeparationError {
    pub fn user_message(&self) -> String {
        match self {
            SeparationError::ToolFailed { stderr, .. } => format!(
                "Separation failed. Uh oh! 😥 Check server logs. Error: {}...",
                truncate_chars(stderr, USER_DETAIL_CHARS)
            ),
            SeparationError::TimedOut(_) => {
                "Separation took too long and was stopped. Maybe try a shorter song? 🐢"
                    .to_string()
            }
            SeparationError::Invocation(_) => {
                "An unexpected error occurred. Please check the server logs. 💥".to_string()
            }
            SeparationError::OutputMissing(_) => {
                "Separation seemed to finish, but the output folder is missing. Check logs. 👻"
                    .to_string()
            }
            SeparationError::NoUsableStems(_) => {
                "Output folder created, but no usable stem files were found. Something went wrong during separation. 😕"
                    .to_string()
            }
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Captured streams of a successful run
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// External source separation tool.
///
/// Implementations write `<output_root>/<model>/<input stem>/` as a side effect;
/// the caller inspects the filesystem afterwards.
#[async_trait::async_trait]
pub trait SeparationTool: Send + Sync {
    /// Run the tool to completion against `input`.
    async fn separate(&self, input: &Path) -> Result<ToolOutput, SeparationError>;

    /// Check whether the tool can be launched at all.
    async fn health_check(&self) -> bool;
}

/// Demucs launched as `python -m demucs` in a child process.
pub struct DemucsCli {
    python_bin: String,
    module: String,
    model_name: String,
    two_stems: String,
    output_root: PathBuf,
    timeout: Duration,
}

impl DemucsCli {
    pub fn new(config: &SeparatorConfig) -> Self {
        Self {
            python_bin: config.python_bin.clone(),
            module: config.tool_module.clone(),
            model_name: config.model_name.clone(),
            two_stems: config.two_stems.clone(),
            output_root: config.output_root.clone(),
            timeout: config.timeout,
        }
    }

    fn module_args(&self) -> Vec<OsString> {
        if self.module.is_empty() {
            Vec::new()
        } else {
            vec!["-m".into(), self.module.clone().into()]
        }
    }

    /// Arguments following the interpreter, e.g.
    /// `-m demucs -n htdemucs -o separated --two-stems vocals uploads/x.mp3`
    pub fn command_args(&self, input: &Path) -> Vec<OsString> {
        let mut args = self.module_args();
        args.extend([
            "-n".into(),
            self.model_name.clone().into(),
            "-o".into(),
            self.output_root.clone().into_os_string(),
            "--two-stems".into(),
            self.two_stems.clone().into(),
            input.as_os_str().to_os_string(),
        ]);
        args
    }

    fn display_command(&self, args: &[OsString]) -> String {
        std::iter::once(Cow::Borrowed(self.python_bin.as_str()))
            .chain(args.iter().map(|a| a.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait::async_trait]
impl SeparationTool for DemucsCli {
    async fn separate(&self, input: &Path) -> Result<ToolOutput, SeparationError> {
        let args = self.command_args(input);
        tracing::info!("Running separation command: {}", self.display_command(&args));

        let mut command = Command::new(&self.python_bin);
        command.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        // Dropping the output future on timeout kills the child.
        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| SeparationError::TimedOut(self.timeout))?
            .map_err(SeparationError::Invocation)?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(SeparationError::ToolFailed {
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }

    async fn health_check(&self) -> bool {
        let mut command = Command::new(&self.python_bin);
        command
            .args(self.module_args())
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        matches!(
            timeout(HEALTH_CHECK_TIMEOUT, command.status()).await,
            Ok(Ok(status)) if status.success()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> DemucsCli {
        DemucsCli::new(&SeparatorConfig::default())
    }

    #[test]
    fn test_command_args() {
        let args = cli().command_args(Path::new("uploads/abc123_song.mp3"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-m",
                "demucs",
                "-n",
                "htdemucs",
                "-o",
                "separated",
                "--two-stems",
                "vocals",
                "uploads/abc123_song.mp3"
            ]
        );
    }

    #[test]
    fn test_command_args_without_module() {
        let config = SeparatorConfig {
            python_bin: "demucs".to_string(),
            tool_module: String::new(),
            ..SeparatorConfig::default()
        };
        let cli = DemucsCli::new(&config);
        let args = cli.command_args(Path::new("in.wav"));
        assert_eq!(args.first().map(|a| a.to_string_lossy().into_owned()).as_deref(), Some("-n"));
        assert_eq!(args.len(), 7);
        assert_eq!(
            cli.display_command(&args),
            "demucs -n htdemucs -o separated --two-stems vocals in.wav"
        );
    }

    #[test]
    fn test_user_message_truncates_stderr() {
        let err = SeparationError::ToolFailed {
            code: Some(1),
            stdout: String::new(),
            stderr: "é".repeat(400),
        };
        let msg = err.user_message();
        assert!(msg.contains(&"é".repeat(250)));
        assert!(!msg.contains(&"é".repeat(251)));
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_truncate_chars_short_input() {
        assert_eq!(truncate_chars("short", 250), "short");
        assert_eq!(truncate_chars("", 250), "");
    }

    #[tokio::test]
    async fn test_missing_binary_is_invocation_error() {
        let config = SeparatorConfig {
            python_bin: "definitely-not-a-real-binary-7f3a".to_string(),
            ..SeparatorConfig::default()
        };
        let cli = DemucsCli::new(&config);
        let err = cli.separate(Path::new("x.wav")).await.unwrap_err();
        assert!(matches!(err, SeparationError::Invocation(_)));
        assert!(!cli.health_check().await);
    }
}
