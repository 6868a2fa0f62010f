use crate::error::ShopgrabError;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

const CHROME_VERSIONS_URL: &str =
    "https://googlechromelabs.github.io/chrome-for-testing/last-known-good-versions-with-downloads.json";

#[derive(Deserialize)]
struct VersionsManifest {
    channels: Channels,
}

#[derive(Deserialize)]
struct Channels {
    #[serde(rename = "Stable")]
    stable: Channel,
}

#[derive(Deserialize)]
struct Channel {
    downloads: Downloads,
}

#[derive(Deserialize)]
struct Downloads {
    chrome: Vec<PlatformDownload>,
}

#[derive(Deserialize)]
struct PlatformDownload {
    platform: String,
    url: String,
}

/// Fetch and unpack the stable Chrome for Testing build for this platform
/// into `data_dir/chrome`, returning the binary path.
pub async fn download_chrome(data_dir: &PathBuf) -> Result<PathBuf, ShopgrabError> {
    let chrome_dir = data_dir.join("chrome");
    std::fs::create_dir_all(&chrome_dir)
        .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to create dir: {}", e)))?;

    eprintln!("Fetching Chrome for Testing download URL...");
    let download_url = stable_download_url().await?;

    eprintln!("Downloading Chrome for Testing...");
    let response = reqwest::get(&download_url)
        .await
        .map_err(|e| ShopgrabError::ChromeDownload(format!("Download failed: {}", e)))?;
    let archive = response
        .bytes()
        .await
        .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to read response: {}", e)))?;

    eprintln!("Extracting Chrome...");
    extract_zip(&archive, &chrome_dir)?;

    let binary = super::resolve::downloaded_chrome_path(data_dir);
    if !binary.exists() {
        return Err(ShopgrabError::ChromeDownload(format!(
            "Chrome binary not found after extraction at: {}",
            binary.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&binary)
            .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to read permissions: {}", e)))?
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&binary, perms)
            .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to set permissions: {}", e)))?;
    }

    eprintln!("Chrome for Testing installed at: {}", binary.display());
    Ok(binary)
}

async fn stable_download_url() -> Result<String, ShopgrabError> {
    let manifest: VersionsManifest = reqwest::get(CHROME_VERSIONS_URL)
        .await
        .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to fetch versions: {}", e)))?
        .json()
        .await
        .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to parse versions: {}", e)))?;

    let platform = chrome_platform();
    manifest
        .channels
        .stable
        .downloads
        .chrome
        .into_iter()
        .find(|d| d.platform == platform)
        .map(|d| d.url)
        .ok_or_else(|| {
            ShopgrabError::ChromeDownload(format!("No download found for platform: {}", platform))
        })
}

fn chrome_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") {
            "mac-arm64"
        } else {
            "mac-x64"
        }
    } else if cfg!(target_os = "windows") {
        if cfg!(target_arch = "x86_64") {
            "win64"
        } else {
            "win32"
        }
    } else {
        "linux64"
    }
}

fn extract_zip(data: &[u8], dest: &Path) -> Result<(), ShopgrabError> {
    let cursor = std::io::Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to open zip: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to read zip entry: {}", e)))?;

        let name = entry.name().to_string();
        let Some(relative) = strip_archive_root(&name) else {
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to create dir: {}", e)))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ShopgrabError::ChromeDownload(format!("Failed to create parent dir: {}", e))
            })?;
        }
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).map_err(|e| {
            ShopgrabError::ChromeDownload(format!("Failed to read file from zip: {}", e))
        })?;
        std::fs::write(&out_path, &buf)
            .map_err(|e| ShopgrabError::ChromeDownload(format!("Failed to write file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }
    }

    Ok(())
}

/// Archive entries are nested under a single versioned top-level directory
/// (e.g. `chrome-linux64/chrome`); strip it so files land in `dest` directly.
fn strip_archive_root(name: &str) -> Option<&str> {
    let stripped = &name[name.find('/')? + 1..];
    (!stripped.is_empty()).then_some(stripped)
}
