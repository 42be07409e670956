use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Locations of the fitted artifacts. File names are resolved against `dir`
/// unless they are absolute.
#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
    pub model: PathBuf,
    pub preprocessor: PathBuf,
    pub pca: PathBuf,
    pub address_freq_maps: PathBuf,
    pub dataset: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("model"),
            model: PathBuf::from("best_model.json"),
            preprocessor: PathBuf::from("preprocessor.json"),
            pca: PathBuf::from("pca_transformer.json"),
            address_freq_maps: PathBuf::from("address_freq_maps.json"),
            dataset: PathBuf::from("festival_dataset.csv"),
        }
    }
}

impl ArtifactsConfig {
    /// All artifacts under one directory with the default file names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.dir.join(file)
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.resolve(&self.model)
    }

    pub fn preprocessor_path(&self) -> PathBuf {
        self.resolve(&self.preprocessor)
    }

    pub fn pca_path(&self) -> PathBuf {
        self.resolve(&self.pca)
    }

    pub fn address_freq_maps_path(&self) -> PathBuf {
        self.resolve(&self.address_freq_maps)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.resolve(&self.dataset)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Load configuration, optionally layering an explicit file on top of the
    /// default locations.
    pub fn load_with(extra_file: Option<&Path>) -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("festival-forecast");

        let mut builder = Config::builder()
            // 1. Load default values
            // Server
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            // Artifacts
            .set_default("artifacts.dir", "model")?
            .set_default("artifacts.model", "best_model.json")?
            .set_default("artifacts.preprocessor", "preprocessor.json")?
            .set_default("artifacts.pca", "pca_transformer.json")?
            .set_default("artifacts.address_freq_maps", "address_freq_maps.json")?
            .set_default("artifacts.dataset", "festival_dataset.csv")?
            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false));

        // 4. Explicit --config file (must exist when given)
        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        // 5. Load from Environment variables (FESTIVAL__SERVER__PORT=...)
        let builder = builder.add_source(Environment::with_prefix("FESTIVAL").separator("__"));

        let s = builder.build().context("Failed to build configuration")?;
        Ok(s.try_deserialize()?)
    }
}
