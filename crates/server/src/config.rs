use std::path::PathBuf;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub ws_path: String,
    pub update_key: Option<String>,
    pub local_files_dir: PathBuf,
    pub local_url_prefix: String,
    pub gamx_data_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let local_files_dir = match std::env::var("LOCAL_FILES_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("cannot resolve working directory")?
                .join("local"),
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8422".to_string())
                .parse()
                .context("PORT must be a number")?,
            ws_path: std::env::var("WS_PATH").unwrap_or_else(|_| "/ws".to_string()),
            update_key: std::env::var("UPDATE_KEY").ok().filter(|k| !k.is_empty()),
            local_files_dir,
            local_url_prefix: std::env::var("LOCAL_URL_PREFIX")
                .unwrap_or_else(|_| "/local".to_string()),
            gamx_data_dir: std::env::var("GAMX_DATA_DIR").ok().map(PathBuf::from),
        })
    }
}
