use std::time::Duration;

use chromiumoxide::Page;

use crate::error::ShopgrabError;

const MAX_CHALLENGE_RETRIES: u32 = 3;
const CHALLENGE_WAIT_SECS: u64 = 12;
const CHALLENGE_TITLE_MARKERS: [&str; 3] = ["Just a moment", "Attention Required", "Captcha"];

pub struct Navigator {
    delay_ms: u64,
}

impl Navigator {
    pub fn new(delay_ms: u64) -> Self {
        Self { delay_ms }
    }

    pub async fn goto(&self, page: &Page, url: &str) -> Result<(), ShopgrabError> {
        tracing::info!("Navigating to: {}", url);

        page.goto(url)
            .await
            .map_err(|e| ShopgrabError::Navigation(format!("Failed to navigate to {}: {}", url, e)))?;

        Ok(())
    }

    /// Wait until the document settles: initial delay, readiness poll, and
    /// anti-bot interstitial handling with bounded waits.
    pub async fn await_ready(&self, page: &Page) -> Result<(), ShopgrabError> {
        // Wait for initial page load
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        // Wait for document.readyState === 'complete' (up to 10s)
        for _ in 0..20 {
            let ready = page
                .evaluate("document.readyState")
                .await
                .ok()
                .and_then(|v| v.into_value::<String>().ok())
                .unwrap_or_default();
            if ready == "complete" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        for attempt in 1..=MAX_CHALLENGE_RETRIES {
            if !self.is_challenge_page(page).await {
                break;
            }

            if attempt == MAX_CHALLENGE_RETRIES {
                return Err(ShopgrabError::ChallengeBlocked(MAX_CHALLENGE_RETRIES));
            }

            tracing::info!(
                "Anti-bot challenge detected (attempt {}/{}), waiting up to {}s...",
                attempt,
                MAX_CHALLENGE_RETRIES,
                CHALLENGE_WAIT_SECS
            );

            // Wait for the challenge to resolve, checking periodically for early exit
            let check_interval_ms = 1000;
            let total_checks = (CHALLENGE_WAIT_SECS * 1000) / check_interval_ms;
            for _ in 0..total_checks {
                tokio::time::sleep(Duration::from_millis(check_interval_ms)).await;
                if !self.is_challenge_page(page).await {
                    tracing::info!("Anti-bot challenge resolved early");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Pause before reading captures so late in-page requests can land.
    pub async fn settle_delay(&self) {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
    }

    async fn is_challenge_page(&self, page: &Page) -> bool {
        match page.evaluate("document.title").await {
            Ok(val) => {
                let title = val.into_value::<String>().unwrap_or_default();
                CHALLENGE_TITLE_MARKERS.iter().any(|m| title.contains(m))
            }
            Err(_) => false,
        }
    }
}
