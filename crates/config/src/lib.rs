use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

mod settings;

pub use settings::Settings;

/// All configuration for the Liwa booking application.
///
/// Precedence (lowest to highest): defaults → config file → env var → CLI arg.
/// CLI arg merging is done by the caller after `Config::load()`.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub store_url: String,
    pub settings_path: PathBuf,
    pub assets_dir: PathBuf,

    // Server
    pub port: u16,

    // Logging
    pub log_level: String,
    pub utc: bool,

    // Business
    pub ticket_price: Decimal,
    pub admin_pin: String,

    // Ziina
    pub ziina_api_base: String,
    pub ziina_access_token: Option<String>,
    pub ziina_app_base_url: String,
    pub ziina_test_mode: bool,
}

/// Config file layout (~/.liwa/config.toml). All fields optional; they layer
/// on top of compiled-in defaults.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    store_url: Option<String>,
    settings_path: Option<PathBuf>,
    assets_dir: Option<PathBuf>,
    port: Option<u16>,
    log_level: Option<String>,
    utc: Option<bool>,
    ticket_price: Option<Decimal>,
    admin_pin: Option<String>,
    ziina_api_base: Option<String>,
    ziina_access_token: Option<String>,
    ziina_app_base_url: Option<String>,
    ziina_test_mode: Option<bool>,
}

impl Config {
    /// Config directory: ~/.liwa/
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".liwa")
    }

    /// Config file path: ~/.liwa/config.toml
    pub fn file_path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load config: defaults → config file → env vars.
    /// CLI args should be merged by the caller afterward.
    pub fn load() -> Self {
        let mut config = Self::defaults();

        // Layer 2: config file
        if let Ok(contents) = std::fs::read_to_string(Self::file_path()) {
            if let Ok(file) = toml::from_str::<FileConfig>(&contents) {
                config.apply_file(file);
            }
        }

        // Layer 3: environment variables
        config.apply_env(|key| std::env::var(key).ok());

        config
    }

    pub fn defaults() -> Self {
        Self {
            store_url: "csv:data/bookings.csv".to_string(),
            settings_path: PathBuf::from("data/settings.json"),
            assets_dir: PathBuf::from("assets"),
            port: 8000,
            log_level: "info".to_string(),
            utc: false,
            ticket_price: Decimal::from(175),
            admin_pin: "change_me".to_string(),
            ziina_api_base: "https://api-v2.ziina.com/api".to_string(),
            ziina_access_token: None,
            ziina_app_base_url: "http://localhost:8000".to_string(),
            ziina_test_mode: false,
        }
    }

    // --- Private helpers ---

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.store_url { self.store_url = v; }
        if let Some(v) = file.settings_path { self.settings_path = v; }
        if let Some(v) = file.assets_dir { self.assets_dir = v; }
        if let Some(v) = file.port { self.port = v; }
        if let Some(v) = file.log_level { self.log_level = v; }
        if let Some(v) = file.utc { self.utc = v; }
        if let Some(v) = file.ticket_price { self.ticket_price = v; }
        if let Some(v) = file.admin_pin { self.admin_pin = v; }
        if let Some(v) = file.ziina_api_base { self.ziina_api_base = v; }
        if let Some(v) = file.ziina_access_token { self.ziina_access_token = Some(v); }
        if let Some(v) = file.ziina_app_base_url { self.ziina_app_base_url = v; }
        if let Some(v) = file.ziina_test_mode { self.ziina_test_mode = v; }
    }

    /// Both the `LIWA_*` names and the original deployment's names are read;
    /// the `LIWA_*` value wins when both are set.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let get = |primary: &str, legacy: &str| var(primary).or_else(|| var(legacy));

        if let Some(v) = var("LIWA_STORE_URL") { self.store_url = v; }
        if let Some(v) = var("LIWA_SETTINGS_PATH") { self.settings_path = PathBuf::from(v); }
        if let Some(v) = var("LIWA_ASSETS_DIR") { self.assets_dir = PathBuf::from(v); }
        if let Some(v) = var("LIWA_PORT") {
            if let Ok(p) = v.parse() { self.port = p; }
        }
        if let Some(v) = var("LIWA_LOG_LEVEL") { self.log_level = v; }
        if let Some(v) = var("LIWA_UTC") { self.utc = parse_flag(&v); }
        if let Some(v) = get("LIWA_TICKET_PRICE", "TICKET_PRICE_AED") {
            if let Ok(p) = Decimal::from_str(v.trim()) { self.ticket_price = p; }
        }
        if let Some(v) = get("LIWA_ADMIN_PIN", "ADMIN_PIN") { self.admin_pin = v; }
        if let Some(v) = get("LIWA_ZIINA_API_BASE", "ZIINA_API_BASE") { self.ziina_api_base = v; }
        if let Some(v) = get("LIWA_ZIINA_ACCESS_TOKEN", "ZIINA_ACCESS_TOKEN") {
            self.ziina_access_token = Some(v);
        }
        if let Some(v) = get("LIWA_ZIINA_APP_BASE_URL", "ZIINA_APP_BASE_URL") {
            self.ziina_app_base_url = v;
        }
        if let Some(v) = get("LIWA_ZIINA_TEST_MODE", "ZIINA_TEST_MODE") {
            self.ziina_test_mode = parse_flag(&v);
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
