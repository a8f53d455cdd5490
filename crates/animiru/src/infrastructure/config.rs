use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct BangumiConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_bangumi_redirect_url")]
    pub redirect_url: String,
    #[serde(default = "default_bangumi_api_url")]
    pub api_url: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    #[serde(skip)]
    path: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_create_database")]
    pub create_database: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub bangumi: Option<BangumiConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: animiru_home().join("config.yml"),
            database_path: default_database_path(),
            create_database: default_create_database(),
            user_agent: default_user_agent(),
            bangumi: None,
        }
    }
}

/// `$ANIMIRU_HOME`, falling back to `~/.animiru`, or `./.animiru` without a home.
pub fn animiru_home() -> PathBuf {
    match std::env::var("ANIMIRU_HOME") {
        Ok(path) => PathBuf::from(path),
        Err(_) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".animiru"),
    }
}

fn default_database_path() -> String {
    let path = animiru_home();
    if !path.exists() {
        let _ = std::fs::create_dir_all(&path);
    }
    path.join("animiru.db").display().to_string()
}

fn default_create_database() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("animiru/{}", env!("CARGO_PKG_VERSION"))
}

fn default_bangumi_redirect_url() -> String {
    animiru_tracker::bangumi::REDIRECT_URL.to_string()
}

fn default_bangumi_api_url() -> String {
    animiru_tracker::bangumi::API_URL.to_string()
}

impl Config {
    pub fn open<P: AsRef<Path>>(path: Option<P>) -> Result<Config, anyhow::Error> {
        let config_path = match path {
            Some(p) => PathBuf::new().join(p),
            None => animiru_home().join("config.yml"),
        };

        match std::fs::File::open(&config_path) {
            Ok(file) => {
                info!("Open config from {:?}", config_path);
                let mut cfg: Self = serde_yml::from_reader(file)?;
                cfg.path = config_path;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Config {
                    path: config_path,
                    ..Default::default()
                };
                cfg.save()?;
                info!("Write default config at {:?}", cfg.path);
                Ok(cfg)
            }
        }
    }

    pub fn save(&self) -> Result<(), anyhow::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_yml::to_string(&self)?)?;

        Ok(())
    }
}
