use std::{collections::HashMap, fs};

use anyhow::bail;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub store_backend: String,
    pub firestore_credentials: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            store_backend: "memory".into(),
            firestore_credentials: "./serviceAccount.json".into(),
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_from: "grievances@example.com".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

pub fn parse_store_backend(raw: &str) -> anyhow::Result<StoreBackend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(StoreBackend::Memory),
        "firestore" => Ok(StoreBackend::Firestore),
        other => bail!("unknown store backend '{other}', expected 'memory' or 'firestore'"),
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("grievance.toml") {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_BIND") {
        settings.server_bind = v;
    }

    if let Ok(v) = std::env::var("STORE_BACKEND") {
        settings.store_backend = v;
    }
    if let Ok(v) = std::env::var("APP__STORE_BACKEND") {
        settings.store_backend = v;
    }

    if let Ok(v) = std::env::var("FIRESTORE_CREDENTIALS") {
        settings.firestore_credentials = v;
    }
    if let Ok(v) = std::env::var("APP__FIRESTORE_CREDENTIALS") {
        settings.firestore_credentials = v;
    }

    if let Ok(v) = std::env::var("SMTP_HOST") {
        settings.smtp_host = v;
    }
    if let Ok(v) = std::env::var("APP__SMTP_HOST") {
        settings.smtp_host = v;
    }

    if let Ok(v) = std::env::var("SMTP_PORT") {
        if let Ok(parsed) = v.parse::<u16>() {
            settings.smtp_port = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__SMTP_PORT") {
        if let Ok(parsed) = v.parse::<u16>() {
            settings.smtp_port = parsed;
        }
    }

    if let Ok(v) = std::env::var("SMTP_USERNAME") {
        settings.smtp_username = v;
    }
    if let Ok(v) = std::env::var("APP__SMTP_USERNAME") {
        settings.smtp_username = v;
    }

    if let Ok(v) = std::env::var("SMTP_PASSWORD") {
        settings.smtp_password = v;
    }
    if let Ok(v) = std::env::var("APP__SMTP_PASSWORD") {
        settings.smtp_password = v;
    }

    if let Ok(v) = std::env::var("SMTP_FROM") {
        settings.smtp_from = v;
    }
    if let Ok(v) = std::env::var("APP__SMTP_FROM") {
        settings.smtp_from = v;
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };

    if let Some(v) = file_cfg.get("server_bind") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("store_backend") {
        settings.store_backend = v.clone();
    }
    if let Some(v) = file_cfg.get("firestore_credentials") {
        settings.firestore_credentials = v.clone();
    }
    if let Some(v) = file_cfg.get("smtp_host") {
        settings.smtp_host = v.clone();
    }
    if let Some(v) = file_cfg.get("smtp_port") {
        if let Ok(parsed) = v.parse::<u16>() {
            settings.smtp_port = parsed;
        }
    }
    if let Some(v) = file_cfg.get("smtp_username") {
        settings.smtp_username = v.clone();
    }
    if let Some(v) = file_cfg.get("smtp_password") {
        settings.smtp_password = v.clone();
    }
    if let Some(v) = file_cfg.get("smtp_from") {
        settings.smtp_from = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_start_on_the_memory_backend() {
        let settings = Settings::default();
        assert_eq!(settings.store_backend, "memory");
        assert_eq!(settings.smtp_port, 587);
        assert_eq!(
            parse_store_backend(&settings.store_backend).expect("backend"),
            StoreBackend::Memory
        );
    }

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!(
            parse_store_backend(" Firestore ").expect("backend"),
            StoreBackend::Firestore
        );
    }

    #[test]
    fn unknown_backend_name_is_an_error() {
        let err = parse_store_backend("dynamo").expect_err("must fail");
        assert!(err.to_string().contains("dynamo"));
    }

    #[test]
    fn flat_toml_table_overrides_defaults() {
        let mut settings = Settings::default();
        apply_file_overrides(
            &mut settings,
            "store_backend = \"firestore\"\nsmtp_port = \"2525\"\nsmtp_host = \"relay.example.com\"\n",
        );
        assert_eq!(settings.store_backend, "firestore");
        assert_eq!(settings.smtp_port, 2525);
        assert_eq!(settings.smtp_host, "relay.example.com");
    }

    #[test]
    fn unparseable_file_leaves_defaults_untouched() {
        let mut settings = Settings::default();
        apply_file_overrides(&mut settings, "smtp_port = [1, 2]");
        assert_eq!(settings.smtp_port, 587);
    }

    #[test]
    fn bad_port_value_keeps_the_default_port() {
        let mut settings = Settings::default();
        apply_file_overrides(&mut settings, "smtp_port = \"not-a-port\"");
        assert_eq!(settings.smtp_port, 587);
    }
}
