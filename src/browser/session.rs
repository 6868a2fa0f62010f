use crate::config::AppConfig;
use crate::error::ShopgrabError;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

/// Launch arguments that keep the browser quiet and hard to fingerprint.
const LAUNCH_ARGS: [&str; 13] = [
    "--disable-blink-features=AutomationControlled",
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-site-isolation-trials",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-default-apps",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-translate",
    "--disable-background-timer-throttling",
    "--disable-renderer-backgrounding",
    "--disable-backgrounding-occluded-windows",
    "--window-size=1920,1080",
];

/// Masks the automation markers bot detectors probe for on every new page.
const STEALTH_INIT_JS: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });

    window.chrome = { runtime: {} };

    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        originalQuery(parameters)
    );
"#;

pub struct BrowserSession {
    browser: Arc<Mutex<Browser>>,
    _handle: tokio::task::JoinHandle<()>,
    user_data_dir: PathBuf,
}

impl BrowserSession {
    pub async fn launch(chrome_path: PathBuf, config: &AppConfig) -> Result<Self, ShopgrabError> {
        // A per-process user data dir avoids SingletonLock conflicts between
        // concurrent runs and stale locks from crashed ones.
        let user_data_dir = unique_user_data_dir();
        std::fs::create_dir_all(&user_data_dir).map_err(|e| {
            ShopgrabError::BrowserLaunch(format!(
                "Failed to create user data dir {}: {}",
                user_data_dir.display(),
                e
            ))
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(user_data_dir.clone())
            .arg(format!("--user-agent={}", USER_AGENT))
            .viewport(None);
        for arg in LAUNCH_ARGS {
            builder = builder.arg(arg);
        }
        if !config.debug {
            builder = builder.arg("--headless=new");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ShopgrabError::BrowserLaunch(format!("{}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ShopgrabError::BrowserLaunch(format!("{}", e)))?;

        // The handler stream must be polled for the CDP connection to work
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                tracing::trace!("Browser event: {:?}", event);
            }
        });

        Ok(BrowserSession {
            browser: Arc::new(Mutex::new(browser)),
            _handle: handle,
            user_data_dir,
        })
    }

    pub async fn new_page(&self) -> Result<Page, ShopgrabError> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ShopgrabError::BrowserLaunch(format!("Failed to create page: {}", e)))?;

        let _ = page.evaluate(STEALTH_INIT_JS).await;

        Ok(page)
    }

    pub async fn close(self) -> Result<(), ShopgrabError> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| ShopgrabError::BrowserLaunch(format!("Failed to close browser: {}", e)))?;
        drop(browser);

        // Give Chrome subprocesses time to release file locks before cleanup
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        self.cleanup_user_data_dir().await;

        Ok(())
    }

    async fn cleanup_user_data_dir(&self) {
        if !self.user_data_dir.exists() {
            return;
        }
        for attempt in 1..=3 {
            match std::fs::remove_dir_all(&self.user_data_dir) {
                Ok(_) => return,
                Err(e) if attempt < 3 => {
                    tracing::debug!(
                        "Cleanup attempt {}/3 for {}: {}, retrying...",
                        attempt,
                        self.user_data_dir.display(),
                        e
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(_) => {
                    tracing::debug!(
                        "Could not clean up temp dir {}, will be cleaned by OS",
                        self.user_data_dir.display()
                    );
                }
            }
        }
    }
}

fn unique_user_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!(
        "shopgrab-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
    ))
}
