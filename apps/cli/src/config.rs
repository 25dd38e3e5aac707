use std::{collections::HashMap, fs};

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            viewport_width: 800.0,
            viewport_height: 600.0,
        }
    }
}

/// Defaults, then `ageflow.toml`, then environment overrides.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("ageflow.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("server_url") {
                settings.server_url = v.clone();
            }
            if let Some(v) = file_cfg.get("viewport_width") {
                if let Ok(parsed) = v.parse::<f32>() {
                    settings.viewport_width = parsed;
                }
            }
            if let Some(v) = file_cfg.get("viewport_height") {
                if let Ok(parsed) = v.parse::<f32>() {
                    settings.viewport_height = parsed;
                }
            }
        }
    }

    if let Ok(v) = std::env::var("SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Ok(v) = std::env::var("APP__VIEWPORT_WIDTH") {
        if let Ok(parsed) = v.parse::<f32>() {
            settings.viewport_width = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__VIEWPORT_HEIGHT") {
        if let Ok(parsed) = v.parse::<f32>() {
            settings.viewport_height = parsed;
        }
    }

    settings
}
