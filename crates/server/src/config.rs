use std::{collections::HashMap, fs};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub session_cookie: String,
    pub session_ttl_minutes: i64,
    pub login_success_url: String,
    pub logout_redirect: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/personnel.db".into(),
            session_cookie: "PERSONNEL_SESSION".into(),
            session_ttl_minutes: 30,
            login_success_url: "/personnel/main".into(),
            logout_redirect: "/personnel/login?logout".into(),
            admin_username: None,
            admin_password: None,
            log_filter: "info".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

/// Reads flat string keys from a `server.toml` body. Malformed files are ignored.
pub fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };

    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("session_cookie") {
        settings.session_cookie = v.clone();
    }
    if let Some(v) = file_cfg.get("session_ttl_minutes") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.session_ttl_minutes = parsed;
        }
    }
    if let Some(v) = file_cfg.get("login_success_url") {
        settings.login_success_url = v.clone();
    }
    if let Some(v) = file_cfg.get("logout_redirect") {
        settings.logout_redirect = v.clone();
    }
    if let Some(v) = file_cfg.get("admin_username") {
        settings.admin_username = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("admin_password") {
        settings.admin_password = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
}

pub fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("APP__SESSION_COOKIE") {
        settings.session_cookie = v;
    }
    if let Some(v) = var("APP__SESSION_TTL_MINUTES") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.session_ttl_minutes = parsed;
        }
    }

    if let Some(v) = var("APP__LOGIN_SUCCESS_URL") {
        settings.login_success_url = v;
    }
    if let Some(v) = var("APP__LOGOUT_REDIRECT") {
        settings.logout_redirect = v;
    }

    if let Some(v) = var("APP__ADMIN_USERNAME") {
        settings.admin_username = Some(v);
    }
    if let Some(v) = var("APP__ADMIN_PASSWORD") {
        settings.admin_password = Some(v);
    }

    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

/// Turns a bare path or single-colon `sqlite:` URL into `sqlite://` form.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let trimmed = raw_database_url.trim();
    if trimmed.is_empty() {
        return Settings::default().database_url;
    }
    if trimmed.contains("://") || trimmed.starts_with("sqlite::memory:") {
        return trimmed.to_string();
    }

    let path = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    format!("sqlite://{}", path.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
