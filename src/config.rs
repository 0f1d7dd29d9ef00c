use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dataset::{resolve_sources, ClassSources, DatasetError, SourceFormat};
use crate::gesture_classifier::ModelArtifacts;
use crate::serial::{PortSettings, DEFAULT_BAUD_RATE};
use crate::types::{DEFAULT_WINDOW_LENGTH, MAT_COLUMNS, SENSOR_CHANNELS};

/// Ruta por defecto del archivo de configuración
pub const DEFAULT_CONFIG_PATH: &str = "config/params.toml";

/// Configuración completa, validada una vez al arrancar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dataset: DatasetConfig,
    pub serial: SerialConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub metrics: MetricsConfig,
}

/// Clases, fuentes por clase y tamaño de ventana
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub window_length: usize,
    pub num_features: usize,
    /// Orden = id de clase; la primera es "sin movimiento"
    pub classes: Vec<String>,
    pub sources: BTreeMap<String, Vec<PathBuf>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub settle_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub dir: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub samples: usize,
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            window_length: DEFAULT_WINDOW_LENGTH,
            num_features: SENSOR_CHANNELS,
            classes: vec!["none".to_string(), "wazari".to_string(), "ippon".to_string()],
            sources: BTreeMap::new(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: 1000,
            settle_ms: 2000,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            name: "lstm".to_string(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            samples: 300,
            seed: None,
        }
    }
}

impl AppConfig {
    /// Carga y valida
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Verifica la configuración; nombres de clase y extensiones incluidos
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dataset = &self.dataset;
        if dataset.window_length == 0 {
            return Err(ConfigError::ValidationError(
                "window_length must be positive".to_string(),
            ));
        }

        if dataset.num_features == 0 || dataset.num_features > SENSOR_CHANNELS {
            return Err(ConfigError::ValidationError(format!(
                "num_features must be between 1 and {} (got {})",
                SENSOR_CHANNELS, dataset.num_features
            )));
        }

        if dataset.classes.len() < 2 {
            return Err(ConfigError::ValidationError(
                "At least two classes are required".to_string(),
            ));
        }

        for (i, name) in dataset.classes.iter().enumerate() {
            if dataset.classes[..i].contains(name) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicated class '{}'",
                    name
                )));
            }
        }

        // Los .mat traen 6 features + marca; pedir más fallaría al cargar
        let sources = resolve_sources(&dataset.classes, &dataset.sources)?;
        for file in sources.iter().flat_map(|class| class.files.iter()) {
            if SourceFormat::from_path(file)? == SourceFormat::Mat
                && dataset.num_features > MAT_COLUMNS - 1
            {
                return Err(DatasetError::NotEnoughFeatures {
                    path: file.clone(),
                    available: MAT_COLUMNS - 1,
                    requested: dataset.num_features,
                }
                .into());
            }
        }

        if self.serial.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "baud_rate must be positive".to_string(),
            ));
        }

        if self.model.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Model name must not be empty".to_string(),
            ));
        }

        if !(self.training.test_fraction > 0.0 && self.training.test_fraction < 1.0) {
            return Err(ConfigError::ValidationError(
                "test_fraction must be in (0, 1)".to_string(),
            ));
        }

        Ok(())
    }

    /// Fuentes resueltas en orden de clase
    pub fn class_sources(&self) -> Result<Vec<ClassSources>, ConfigError> {
        Ok(resolve_sources(&self.dataset.classes, &self.dataset.sources)?)
    }

    pub fn num_classes(&self) -> usize {
        self.dataset.classes.len()
    }

    pub fn artifacts(&self) -> ModelArtifacts {
        ModelArtifacts::new(&self.model.dir, &self.model.name)
    }

    pub fn port_settings(&self) -> PortSettings {
        PortSettings {
            port: self.serial.port.clone(),
            baud_rate: self.serial.baud_rate,
            timeout: Duration::from_millis(self.serial.timeout_ms),
            settle_delay: Duration::from_millis(self.serial.settle_ms),
        }
    }
}

/// Errores de configuración
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}
