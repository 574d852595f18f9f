//! Background removal via the external `imf` binary.
//!
//! The post-processor is invoked as a subprocess rather than linked in,
//! since its native dependencies are heavyweight. It converts a PNG into a
//! transparent-background WEBP and reports the keyed-out background color on
//! stderr.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::error;

use crate::error::{Error, Result};

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#[0-9a-f]{6})\b").expect("valid color regex"));

#[async_trait]
pub trait FilterRunner: Send + Sync {
    /// Keys out the background of the PNG at `infile`, writing a transparent
    /// WEBP to `outfile` and returning the detected background color as
    /// `#rrggbb`.
    async fn remove_background(&self, infile: &Path, outfile: &Path) -> Result<String>;
}

pub struct ImfRunner {
    binary_path: PathBuf,
}

impl ImfRunner {
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Resolves the `imf` binary from the PATH, falling back to an
    /// `external/bin` directory under the working directory or its parent.
    pub fn resolve_binary() -> Option<PathBuf> {
        let binary_name = if cfg!(windows) { "imf.exe" } else { "imf" };
        if let Some(paths) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&paths) {
                let candidate = dir.join(binary_name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        let cwd = std::env::current_dir().ok()?;
        for base in [cwd.join("external"), cwd.join("..").join("external")] {
            let candidate = base.join("bin").join(binary_name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}

#[async_trait]
impl FilterRunner for ImfRunner {
    async fn remove_background(&self, infile: &Path, outfile: &Path) -> Result<String> {
        let output = Command::new(&self.binary_path)
            .arg("remove-background")
            .arg("-i")
            .arg(infile)
            .arg("-o")
            .arg(outfile)
            .output()
            .await
            .map_err(|e| {
                Error::Subprocess(format!(
                    "failed to run {}: {e}",
                    self.binary_path.display()
                ))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            error!(
                status = ?output.status.code(),
                stdout = %stdout,
                stderr = %stderr,
                "remove-background command failed"
            );
            return Err(Error::Subprocess(format!(
                "remove-background exited with status {:?}",
                output.status.code()
            )));
        }
        parse_color(&stderr)
    }
}

/// Extracts the leading `#rrggbb` token the subprocess prints to stderr
pub fn parse_color(s: &str) -> Result<String> {
    match HEX_COLOR.captures(s) {
        Some(captures) => Ok(captures[1].to_string()),
        None => Err(Error::Subprocess("not a hex color".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leading_hex_color() {
        let got = parse_color("#ffee01\nsomething else\n").expect("parse color");
        assert_eq!(got, "#ffee01");
    }

    #[test]
    fn rejects_output_without_color() {
        assert!(parse_color("hello world").is_err());
    }

    #[test]
    fn rejects_uppercase_and_short_colors() {
        assert!(parse_color("#FFEE01").is_err());
        assert!(parse_color("#abc").is_err());
    }
}
