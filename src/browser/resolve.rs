use crate::error::ShopgrabError;
use std::path::PathBuf;

#[cfg(target_os = "macos")]
const SYSTEM_CHROME_PATHS: [&str; 3] = [
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
];
#[cfg(target_os = "linux")]
const SYSTEM_CHROME_PATHS: [&str; 5] = [
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];
#[cfg(target_os = "windows")]
const SYSTEM_CHROME_PATHS: [&str; 2] = [
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];
#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
const SYSTEM_CHROME_PATHS: [&str; 0] = [];

/// Resolve the Chrome binary to drive, in priority order: the configured
/// path, a system install, a previously downloaded Chrome for Testing, and
/// finally a fresh download.
pub async fn resolve_chrome(
    user_path: Option<&PathBuf>,
    data_dir: &PathBuf,
) -> Result<PathBuf, ShopgrabError> {
    if let Some(path) = user_path {
        if path.exists() {
            tracing::info!("Using configured browser: {}", path.display());
            return Ok(path.clone());
        }
        tracing::warn!(
            "Configured browser path does not exist: {}",
            path.display()
        );
    }

    if let Some(path) = detect_system_chrome() {
        tracing::info!("Using system Chrome: {}", path.display());
        return Ok(path);
    }

    let downloaded = downloaded_chrome_path(data_dir);
    if downloaded.exists() {
        tracing::info!("Using downloaded Chrome: {}", downloaded.display());
        return Ok(downloaded);
    }

    tracing::info!("No Chrome found. Downloading Chrome for Testing...");
    super::download::download_chrome(data_dir).await
}

fn detect_system_chrome() -> Option<PathBuf> {
    for candidate in SYSTEM_CHROME_PATHS {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    #[cfg(unix)]
    for binary in ["google-chrome", "chromium"] {
        if let Some(path) = which(binary) {
            return Some(path);
        }
    }

    None
}

#[cfg(unix)]
fn which(binary: &str) -> Option<PathBuf> {
    let output = std::process::Command::new("which")
        .arg(binary)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// Where the downloaded Chrome binary lives inside the data dir.
pub fn downloaded_chrome_path(data_dir: &PathBuf) -> PathBuf {
    let chrome_dir = data_dir.join("chrome");
    if cfg!(target_os = "macos") {
        chrome_dir
            .join("Google Chrome for Testing.app")
            .join("Contents")
            .join("MacOS")
            .join("Google Chrome for Testing")
    } else if cfg!(target_os = "windows") {
        chrome_dir.join("chrome.exe")
    } else {
        chrome_dir.join("chrome")
    }
}
