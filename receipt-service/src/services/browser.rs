//! Locating and launching the headless Chromium used for PDF rendering.
//!
//! Deployment targets differ in where a usable browser lives: developer
//! machines tend to have a system Chrome, CI images carry a Playwright or
//! Puppeteer download cache, and serverless bundles ship their own binary.
//! The launcher probes those locations in a fixed order and only then defers
//! to the automation library's own discovery.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::detection::{default_executable, DetectionOptions};
use chromiumoxide::handler::Handler;
use service_core::error::AppError;

use crate::config::BrowserSettings;

/// Environment variables that force a specific browser binary.
const ENV_OVERRIDES: [&str; 2] = ["RECEIPT_CHROME_PATH", "CHROME"];

/// Browser binary locations relative to a downloaded build directory.
const BUILD_RELATIVE_BINARIES: [&str; 5] = [
    "chrome-linux/chrome",
    "chrome-linux64/chrome",
    "chrome-linux/headless_shell",
    "chrome-mac/Chromium.app/Contents/MacOS/Chromium",
    "chrome-win/chrome.exe",
];

/// Flags for every launch; tuned for containers where the default sandbox
/// and shared-memory assumptions do not hold.
const LAUNCH_ARGS: [&str; 15] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-software-rasterizer",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-features=TranslateUI",
    "--disable-ipc-flooding-protection",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-web-security",
    "--allow-running-insecure-content",
    "--memory-pressure-off",
];

const REMEDIATION: &str = "No Chromium executable was found. Install Google Chrome or Chromium, \
or point RECEIPT_CHROME_PATH at an existing browser binary.";

pub struct BrowserLauncher {
    settings: BrowserSettings,
}

impl BrowserLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    /// Launch a headless browser, probing known install locations first.
    ///
    /// When a probed path fails to launch, one retry is made with the
    /// library's own discovery before the failure is surfaced.
    pub async fn launch(&self) -> Result<(Browser, Handler), AppError> {
        let probed = self.locate_executable();
        match self.try_launch(probed.clone()).await {
            Ok(pair) => Ok(pair),
            Err(err) if probed.is_some() => {
                tracing::warn!(
                    executable = %probed.unwrap_or_default().display(),
                    error = %err,
                    "probed browser failed to launch, retrying with library discovery"
                );
                self.try_launch(None).await.map_err(classify_launch_error)
            }
            Err(err) => Err(classify_launch_error(err)),
        }
    }

    async fn try_launch(&self, executable: Option<PathBuf>) -> anyhow::Result<(Browser, Handler)> {
        let executable = match executable {
            Some(path) => path,
            None => default_executable(DetectionOptions::default()).map_err(|e| anyhow!(e))?,
        };

        let config = BrowserConfig::builder()
            .chrome_executable(executable)
            .args(launch_args(is_serverless()))
            .request_timeout(Duration::from_secs(self.settings.request_timeout_secs))
            .build()
            .map_err(|e| anyhow!(e))?;

        let (browser, handler) = Browser::launch(config).await?;
        Ok((browser, handler))
    }

    /// Probe for a browser executable.
    ///
    /// Order: configured/env override, platform download caches, the
    /// project-local browser directory, system install paths. `None` defers
    /// to library discovery.
    pub fn locate_executable(&self) -> Option<PathBuf> {
        if let Some(path) = &self.settings.executable {
            if path.is_file() {
                return Some(path.clone());
            }
            tracing::warn!(
                executable = %path.display(),
                "configured browser executable does not exist, probing fallbacks"
            );
        }

        for var in ENV_OVERRIDES {
            if let Some(path) = env::var_os(var).map(PathBuf::from) {
                if path.is_file() {
                    return Some(path);
                }
            }
        }

        probe_cache_dirs()
            .or_else(|| newest_build_binary(Path::new(".local-browsers")))
            .or_else(probe_system_paths)
    }
}

/// Serverless platforms cannot fork the zygote and GPU helper processes.
pub fn is_serverless() -> bool {
    env::var_os("VERCEL").is_some() || env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_some()
}

pub fn launch_args(serverless: bool) -> Vec<&'static str> {
    let mut args = LAUNCH_ARGS.to_vec();
    if serverless {
        args.push("--single-process");
    }
    args
}

/// Map a launch failure to the user-facing error, distinguishing a missing
/// browser install from every other cause.
fn classify_launch_error(err: anyhow::Error) -> AppError {
    if is_missing_executable(&err.to_string()) {
        AppError::BrowserNotInstalled(REMEDIATION.to_string())
    } else {
        AppError::PdfRender(err)
    }
}

fn is_missing_executable(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("no such file")
        || message.contains("not found")
        || message.contains("could not auto detect")
        || message.contains("executable")
}

/// Browser caches left behind by Playwright and Puppeteer installs.
fn probe_cache_dirs() -> Option<PathBuf> {
    let root = cache_root()?;
    ["ms-playwright", "puppeteer/chrome"]
        .iter()
        .find_map(|vendor| newest_build_binary(&root.join(vendor)))
}

fn cache_root() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        home_dir().map(|home| home.join("Library/Caches"))
    } else if cfg!(windows) {
        env::var_os("LOCALAPPDATA").map(PathBuf::from)
    } else {
        env::var_os("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|home| home.join(".cache")))
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Pick the lexically newest chromium/chrome build under `dir` that contains
/// a known browser binary.
fn newest_build_binary(dir: &Path) -> Option<PathBuf> {
    let mut builds: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("chromium") || name.starts_with("chrome"))
        })
        .collect();
    builds.sort();

    builds.iter().rev().find_map(|build| {
        BUILD_RELATIVE_BINARIES
            .iter()
            .map(|rel| build.join(rel))
            .find(|candidate| candidate.is_file())
    })
}

fn probe_system_paths() -> Option<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(windows) {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/opt/google/chrome/chrome",
        ]
    };

    candidates.iter().map(PathBuf::from).find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_args_adds_single_process_only_for_serverless() {
        let local = launch_args(false);
        assert!(local.contains(&"--no-sandbox"));
        assert!(!local.contains(&"--single-process"));

        let serverless = launch_args(true);
        assert!(serverless.contains(&"--single-process"));
    }

    #[test]
    fn missing_executable_messages_are_classified() {
        assert!(is_missing_executable(
            "No such file or directory (os error 2)"
        ));
        assert!(is_missing_executable(
            "Could not auto detect a chrome executable"
        ));
        assert!(is_missing_executable("chrome binary not found"));
        assert!(!is_missing_executable("ws connection closed unexpectedly"));
    }

    #[test]
    fn launch_error_classification_maps_to_error_kinds() {
        match classify_launch_error(anyhow!("Could not auto detect a chrome executable")) {
            AppError::BrowserNotInstalled(hint) => {
                assert!(hint.contains("RECEIPT_CHROME_PATH"));
            }
            other => panic!("expected BrowserNotInstalled, got {other:?}"),
        }

        match classify_launch_error(anyhow!("page crashed")) {
            AppError::PdfRender(_) => {}
            other => panic!("expected PdfRender, got {other:?}"),
        }
    }
}
