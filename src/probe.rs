//! NVENC codec detection via the external `nvenc_codecs` helper.
//!
//! The helper is a prebuilt native binary that opens an encode session and
//! prints the codec names the local NVENC device exposes, one per line. This
//! module runs it and matches codec names against its output; the actual
//! device interrogation lives entirely in the helper.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{debug, error};

use crate::config::Config;

/// Diagnostic printed by the helper when the installed driver is older than
/// the NVENC API it was built against. The misspelling ("reqired") matches
/// the helper's known output and must not be corrected here.
///
/// Helper builds that print the correctly spelled "required" also exit
/// non-zero, so against those this phrase never matches and the too-old case
/// surfaces as [`ProbeError::ExitFailure`] rather than
/// [`CodecSupport::DriverTooOld`].
pub const DRIVER_TOO_OLD_PHRASE: &str = "Driver does not support the reqired nvenc API version";

/// Location of the helper binary relative to the install directory
#[cfg(windows)]
pub const PROBE_RELATIVE_PATH: &str = r"build\Release\nvenc_codecs.exe";
#[cfg(not(windows))]
pub const PROBE_RELATIVE_PATH: &str = "build/Release/nvenc_codecs";

/// Env var overriding the helper path (takes precedence over config)
pub const EXECUTABLE_ENV_VAR: &str = "NVPROBE_EXECUTABLE";

/// Outcome of a successful probe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecSupport {
    /// The helper's output lists the requested codec
    Supported,
    /// The helper ran but its output does not mention the codec
    Unsupported,
    /// The installed driver is too old for the helper's NVENC API version.
    /// Carries the raw output so callers can surface the driver diagnostic.
    DriverTooOld { output: String },
}

impl CodecSupport {
    /// Plain yes/no view, treating a too-old driver as "not supported"
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported)
    }
}

/// Probe failure - the helper never produced usable output
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to run probe executable '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Probe executable '{path}' exited with {status}: {stderr}")]
    ExitFailure {
        path: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Handle on the helper binary. Construction picks the path; each call to
/// [`supports`](NvencProbe::supports) or
/// [`probe_output`](NvencProbe::probe_output) spawns one fresh process and
/// blocks until it exits - no output is cached between calls.
#[derive(Debug, Clone)]
pub struct NvencProbe {
    executable: PathBuf,
}

impl NvencProbe {
    /// Probe using the default executable path (env var, then config file,
    /// then the install-relative platform default)
    pub fn new() -> Self {
        Self {
            executable: default_executable().clone(),
        }
    }

    /// Probe using an explicit executable path (used by tests to substitute
    /// a stub, and by the CLI `--executable` flag)
    pub fn with_executable(path: impl Into<PathBuf>) -> Self {
        Self {
            executable: path.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Check whether the local NVENC device exposes `codec`.
    ///
    /// The codec name is opaque here: it is matched by plain substring
    /// containment against the helper's stdout, exactly as printed (the
    /// helper emits upper-case names like `H264`, `HEVC`, `AV1`).
    pub fn supports(&self, codec: &str) -> Result<CodecSupport, ProbeError> {
        let output = self.probe_output()?;
        Ok(classify_output(&output, codec))
    }

    /// Run the helper and return its raw stdout.
    ///
    /// A non-zero exit is an error unless stdout carries the driver-too-old
    /// diagnostic: the helper exits non-zero in that case too, but the output
    /// is still the answer the caller asked for.
    pub fn probe_output(&self) -> Result<String, ProbeError> {
        let mut cmd = Command::new(&self.executable);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            // CREATE_NO_WINDOW: no console flash when invoked from a GUI host
            cmd.creation_flags(0x0800_0000);
        }

        let output = cmd.output().map_err(|e| {
            error!(
                executable = %self.executable.display(),
                error = %e,
                "failed to spawn probe executable"
            );
            ProbeError::Spawn {
                path: self.executable.clone(),
                source: e,
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() && !stdout.contains(DRIVER_TOO_OLD_PHRASE) {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(
                executable = %self.executable.display(),
                status = %output.status,
                stderr = %stderr,
                "probe executable failed"
            );
            return Err(ProbeError::ExitFailure {
                path: self.executable.clone(),
                status: output.status,
                stderr,
            });
        }

        debug!(bytes = stdout.len(), "captured probe output");
        Ok(stdout)
    }
}

impl Default for NvencProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Check a codec against the default probe executable.
///
/// Convenience wrapper over [`NvencProbe::new`] for callers that don't need
/// to control the executable path.
pub fn supports(codec: &str) -> Result<CodecSupport, ProbeError> {
    NvencProbe::new().supports(codec)
}

/// Classify captured helper output for a codec name.
///
/// The driver diagnostic wins over codec matching: output carrying the
/// too-old phrase is never reported as plain `Unsupported`.
pub fn classify_output(output: &str, codec: &str) -> CodecSupport {
    if output.contains(DRIVER_TOO_OLD_PHRASE) {
        return CodecSupport::DriverTooOld {
            output: output.to_string(),
        };
    }

    if output.contains(codec) {
        CodecSupport::Supported
    } else {
        CodecSupport::Unsupported
    }
}

/// Cache for the resolved default executable path
static DEFAULT_EXECUTABLE_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Resolve the default helper path once per process
fn default_executable() -> &'static PathBuf {
    DEFAULT_EXECUTABLE_CACHE.get_or_init(|| {
        let env = std::env::var(EXECUTABLE_ENV_VAR).ok();
        let configured = Config::load().ok().and_then(|c| c.probe.executable);
        resolve_default(env, configured)
    })
}

/// Pick the default helper path: env var wins over the config file, the
/// config file wins over the install-relative platform default. An empty
/// env var counts as unset.
fn resolve_default(env: Option<String>, configured: Option<PathBuf>) -> PathBuf {
    if let Some(env_path) = env.filter(|p| !p.is_empty()) {
        debug!(path = %env_path, "using probe executable from env");
        return PathBuf::from(env_path);
    }

    if let Some(path) = configured {
        debug!(path = %path.display(), "using probe executable from config");
        return path;
    }

    install_relative_executable()
}

/// Platform default: the helper ships next to this binary, so the path is
/// anchored to the current executable's directory rather than the caller's
/// working directory.
fn install_relative_executable() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .map(|dir| dir.join(PROBE_RELATIVE_PATH))
        .unwrap_or_else(|| PathBuf::from(PROBE_RELATIVE_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_present_in_output() {
        let output = "h264\nhevc\nav1\n";
        assert_eq!(classify_output(output, "hevc"), CodecSupport::Supported);
        assert_eq!(classify_output(output, "h264"), CodecSupport::Supported);
        assert_eq!(classify_output(output, "av1"), CodecSupport::Supported);
    }

    #[test]
    fn test_codec_absent_from_output() {
        let output = "h264\nhevc\nav1\n";
        assert_eq!(classify_output(output, "vp9"), CodecSupport::Unsupported);
    }

    #[test]
    fn test_match_is_case_sensitive() {
        // The helper prints upper-case names; matching is verbatim
        let output = "Device 0: NVIDIA GeForce RTX 3080\nH264\nHEVC\nAV1\n";
        assert_eq!(classify_output(output, "HEVC"), CodecSupport::Supported);
        assert_eq!(classify_output(output, "hevc"), CodecSupport::Unsupported);
    }

    #[test]
    fn test_driver_too_old_wins_over_codec_match() {
        let output = format!("{}. Required: 12.1 Found: 11.0\n", DRIVER_TOO_OLD_PHRASE);
        let result = classify_output(&output, "hevc");
        assert_eq!(
            result,
            CodecSupport::DriverTooOld {
                output: output.clone()
            }
        );
        assert!(!result.is_supported());
    }

    #[test]
    fn test_driver_phrase_matched_verbatim() {
        // The correctly spelled variant is NOT the phrase the helper emits
        let output = "Driver does not support the required nvenc API version";
        assert_eq!(classify_output(output, "hevc"), CodecSupport::Unsupported);
    }

    #[test]
    fn test_empty_output_is_unsupported() {
        assert_eq!(classify_output("", "hevc"), CodecSupport::Unsupported);
    }

    #[test]
    fn test_platform_relative_path_suffix() {
        if cfg!(windows) {
            assert!(PROBE_RELATIVE_PATH.ends_with(".exe"));
        } else {
            assert!(!PROBE_RELATIVE_PATH.ends_with(".exe"));
        }
    }

    #[test]
    fn test_install_relative_path_ends_with_platform_default() {
        let path = install_relative_executable();
        assert!(path.ends_with(PROBE_RELATIVE_PATH));
    }

    #[test]
    fn test_with_executable_overrides_path() {
        let probe = NvencProbe::with_executable("/tmp/stub");
        assert_eq!(probe.executable(), Path::new("/tmp/stub"));
    }

    #[test]
    fn test_env_override_beats_config() {
        let resolved = resolve_default(
            Some("/opt/env/nvenc_codecs".to_string()),
            Some(PathBuf::from("/opt/cfg/nvenc_codecs")),
        );
        assert_eq!(resolved, PathBuf::from("/opt/env/nvenc_codecs"));
    }

    #[test]
    fn test_config_override_beats_platform_default() {
        let resolved = resolve_default(None, Some(PathBuf::from("/opt/cfg/nvenc_codecs")));
        assert_eq!(resolved, PathBuf::from("/opt/cfg/nvenc_codecs"));
    }

    #[test]
    fn test_empty_env_var_is_ignored() {
        let resolved = resolve_default(
            Some(String::new()),
            Some(PathBuf::from("/opt/cfg/nvenc_codecs")),
        );
        assert_eq!(resolved, PathBuf::from("/opt/cfg/nvenc_codecs"));
    }

    #[test]
    fn test_no_overrides_falls_back_to_install_relative() {
        let resolved = resolve_default(None, None);
        assert!(resolved.ends_with(PROBE_RELATIVE_PATH));
    }
}
