use std::fs;

use serde::Deserialize;

#[derive(Debug)]
pub struct Settings {
    pub server_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
}

/// Defaults, then `panel.toml`, then environment, then the CLI flag.
pub fn load_settings(flag: Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("panel.toml") {
        if let Ok(file_cfg) = toml::from_str::<FileSettings>(&raw) {
            if let Some(v) = file_cfg.server_url {
                settings.server_url = v;
            }
        }
    }

    if let Ok(v) = std::env::var("PANEL_SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = flag {
        settings.server_url = v;
    }

    settings
}
