//! The external capture executable.
use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Install locations checked after `PATH` (Wireshark on Windows).
const TSHARK_PATHS: &[&str] = &[
    r"C:\Program Files\Wireshark\tshark.exe",
    r"C:\Program Files (x86)\Wireshark\tshark.exe",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub duration: Duration,
    pub interface: String,
    pub output: PathBuf,
}

/// Something that records traffic for a while and writes a capture file.
///
/// Implementations report a missing executable as [`Error::ToolUnavailable`]
/// and any other failure as [`Error::CaptureFailed`]. Timeouts are enforced by
/// the caller, which drops the returned future.
pub trait CaptureTool: Send + Sync {
    fn capture<'a>(&'a self, request: &'a CaptureRequest) -> BoxFuture<'a, Result<()>>;
}

/// Runs `tshark` as a child process.
#[derive(Debug, Clone, Default)]
pub struct TsharkCapture {
    executable: Option<PathBuf>,
}

impl TsharkCapture {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            executable: config.tshark_path.clone(),
        }
    }

    pub fn with_executable(path: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(path.into()),
        }
    }

    /// Configured path first, then `PATH`, then the usual install locations.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.executable {
            return path.is_file().then(|| path.clone());
        }
        which::which("tshark").ok().or_else(|| {
            TSHARK_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.is_file())
        })
    }

    fn command(tshark: &Path, request: &CaptureRequest) -> Command {
        let mut cmd = Command::new(tshark);
        cmd.arg("-q")
            .arg("-w")
            .arg(&request.output)
            .arg("-a")
            .arg(format!("duration:{}", request.duration.as_secs().max(1)))
            .arg("-i")
            .arg(&request.interface)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl CaptureTool for TsharkCapture {
    fn capture<'a>(&'a self, request: &'a CaptureRequest) -> BoxFuture<'a, Result<()>> {
        async move {
            let tshark = self.locate().ok_or_else(|| {
                Error::ToolUnavailable(
                    "tshark not found. Install Wireshark (includes Npcap and tshark).".into(),
                )
            })?;
            debug!(
                "Running {} on interface {} for {:?}",
                tshark.display(),
                request.interface,
                request.duration
            );

            let output = Self::command(&tshark, request)
                .output()
                .await
                .map_err(|e| match e.kind() {
                    ErrorKind::NotFound => {
                        Error::ToolUnavailable(format!("{}: {e}", tshark.display()))
                    }
                    _ => Error::CaptureFailed(format!("failed to run {}: {e}", tshark.display())),
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let reason = stderr
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("no diagnostics");
                return Err(Error::CaptureFailed(format!(
                    "tshark exited with {}: {}",
                    output.status,
                    reason.trim()
                )));
            }
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CaptureRequest {
        CaptureRequest {
            duration: Duration::from_secs(5),
            interface: "eth0".into(),
            output: PathBuf::from("/tmp/out.pcapng"),
        }
    }

    #[test]
    fn builds_tshark_arguments() {
        let cmd = TsharkCapture::command(Path::new("tshark"), &request());
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["-q", "-w", "/tmp/out.pcapng", "-a", "duration:5", "-i", "eth0"]
        );
    }

    #[test]
    fn missing_configured_executable_is_not_located() {
        let tool = TsharkCapture::with_executable("/nonexistent/bin/tshark");
        assert_eq!(tool.locate(), None);
    }

    #[tokio::test]
    async fn missing_executable_is_tool_unavailable() {
        let tool = TsharkCapture::with_executable("/nonexistent/bin/tshark");
        let err = tool.capture(&request()).await.unwrap_err();
        assert!(matches!(err, Error::ToolUnavailable(_)));
    }
}
