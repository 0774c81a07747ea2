//! External copy tool implementation of MirrorSystem
//!
//! Registry transport is not reimplemented here: every copy runs
//! `skopeo copy` and reports its exit status. The child process is killed
//! when the copy is cancelled.

use ferry_core_interface::{CopyOptions, MirrorSystem, MirrorSystemError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Copies images by running `skopeo copy`
///
/// # Example
///
/// ```rust,no_run
/// use ferry::system::SkopeoSystem;
/// use ferry_core_interface::{CopyOptions, MirrorSystem};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let system = SkopeoSystem::new("skopeo");
///     system
///         .copy(
///             &CancellationToken::new(),
///             "docker://quay.io/ns/repo:v1",
///             "docker://registry.local:5000/ns/repo:v1",
///             &CopyOptions::default(),
///         )
///         .await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SkopeoSystem {
    binary: PathBuf,
}

impl SkopeoSystem {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments of one `skopeo copy` invocation
    pub fn copy_args(source: &str, destination: &str, options: &CopyOptions) -> Vec<String> {
        let mut args = vec!["copy".to_string()];
        if options.all_architectures {
            args.push("--all".to_string());
        }
        if options.preserve_digests {
            args.push("--preserve-digests".to_string());
        }
        if options.remove_signatures {
            args.push("--remove-signatures".to_string());
        }
        args.push(format!("--src-tls-verify={}", options.src_tls_verify));
        args.push(format!("--dest-tls-verify={}", options.dest_tls_verify));
        args.push(source.to_string());
        args.push(destination.to_string());
        args
    }
}

impl Default for SkopeoSystem {
    fn default() -> Self {
        Self::new("skopeo")
    }
}

#[async_trait::async_trait]
impl MirrorSystem for SkopeoSystem {
    async fn copy(
        &self,
        cancel: &CancellationToken,
        source: &str,
        destination: &str,
        options: &CopyOptions,
    ) -> Result<()> {
        let args = Self::copy_args(source, destination, options);
        trace!("{} {}", self.binary.display(), args.join(" "));

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MirrorSystemError::Cancelled {
                source_ref: source.to_string(),
                destination: destination.to_string(),
            }),
            output = child.wait_with_output() => {
                let output = output?;
                if output.status.success() {
                    Ok(())
                } else {
                    Err(MirrorSystemError::CopyFailed {
                        source_ref: source.to_string(),
                        destination: destination.to_string(),
                        reason: format!(
                            "{}: {}",
                            output.status,
                            String::from_utf8_lossy(&output.stderr).trim()
                        ),
                    })
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "skopeo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_args_default_options() {
        let args = SkopeoSystem::copy_args(
            "docker://quay.io/ns/repo:v1",
            "docker://mirror.local/ns/repo:v1",
            &CopyOptions::default(),
        );
        assert_eq!(
            args,
            vec![
                "copy",
                "--all",
                "--preserve-digests",
                "--remove-signatures",
                "--src-tls-verify=true",
                "--dest-tls-verify=true",
                "docker://quay.io/ns/repo:v1",
                "docker://mirror.local/ns/repo:v1",
            ]
        );
    }

    #[test]
    fn test_copy_args_insecure_destination() {
        let options = CopyOptions {
            dest_tls_verify: false,
            all_architectures: false,
            ..CopyOptions::default()
        };
        let args = SkopeoSystem::copy_args("a", "b", &options);
        assert!(args.contains(&"--dest-tls-verify=false".to_string()));
        assert!(!args.contains(&"--all".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let system = SkopeoSystem::new("/nonexistent/skopeo-binary");
        let result = system
            .copy(
                &CancellationToken::new(),
                "docker://a/b:1",
                "docker://c/b:1",
                &CopyOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(MirrorSystemError::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_maps_to_result() {
        let token = CancellationToken::new();
        let options = CopyOptions::default();

        let ok = SkopeoSystem::new("true");
        assert!(ok.copy(&token, "a", "b", &options).await.is_ok());

        let failing = SkopeoSystem::new("false");
        assert!(matches!(
            failing.copy(&token, "a", "b", &options).await,
            Err(MirrorSystemError::CopyFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_before_completion() {
        let token = CancellationToken::new();
        token.cancel();
        let system = SkopeoSystem::new("true");
        let result = system
            .copy(&token, "a", "b", &CopyOptions::default())
            .await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
