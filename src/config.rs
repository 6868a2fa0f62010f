use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub no_cache: bool,
    pub delay_ms: u64,
    pub debug: bool,
    pub browser_path: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    defaults: ConfigDefaults,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigDefaults {
    browser_path: Option<String>,
    delay_ms: Option<u64>,
}

impl AppConfig {
    pub fn load(no_cache: bool, delay: Option<u64>, debug: bool) -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shopgrab");
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("shopgrab");
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("shopgrab");

        let file_config = load_config_file(&config_dir);

        // Priority: CLI flags → env vars → config file → defaults
        let browser_path_env = std::env::var("SHOPGRAB_BROWSER_PATH").ok();
        let delay_env = std::env::var("SHOPGRAB_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        let browser_path = browser_path_env
            .or(file_config.defaults.browser_path)
            .map(PathBuf::from);

        let delay_ms = delay
            .or(delay_env)
            .or(file_config.defaults.delay_ms)
            .unwrap_or(2000);

        AppConfig {
            no_cache,
            delay_ms,
            debug,
            browser_path,
            cache_dir,
            data_dir,
        }
    }
}

fn load_config_file(config_dir: &PathBuf) -> ConfigFile {
    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => ConfigFile::default(),
        }
    } else {
        ConfigFile::default()
    }
}
