use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShopgrabError {
    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("Browser navigation failed: {0}")]
    Navigation(String),

    #[error("Anti-bot challenge could not be cleared after {0} attempts")]
    ChallengeBlocked(u32),

    #[error("No extractor registered for this URL: {0}")]
    UnsupportedPlatform(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Chrome download failed: {0}")]
    ChromeDownload(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
