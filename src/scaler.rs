use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Window;

#[derive(Error, Debug)]
pub enum ScalerError {
    #[error("Cannot fit a scaler without samples")]
    Empty,

    #[error("Invalid feature size: expected {expected}, got {actual}")]
    InvalidFeatureSize { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Estandarización por feature: (x - mean) / scale.
/// Se ajusta con todas las filas de todas las ventanas de entrenamiento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
    #[serde(default)]
    pub samples_seen: u64,
}

impl StandardScaler {
    pub fn fit<'a, I>(windows: I) -> Result<Self, ScalerError>
    where
        I: IntoIterator<Item = &'a Window>,
    {
        let mut features: Option<usize> = None;
        let mut count = 0u64;
        let mut sum: Vec<f64> = Vec::new();
        let mut sum_sq: Vec<f64> = Vec::new();

        for window in windows {
            let f = *features.get_or_insert_with(|| {
                sum = vec![0.0; window.features()];
                sum_sq = vec![0.0; window.features()];
                window.features()
            });
            if window.features() != f {
                return Err(ScalerError::InvalidFeatureSize {
                    expected: f,
                    actual: window.features(),
                });
            }

            for row in window.rows() {
                for (c, &v) in row.iter().enumerate() {
                    let v = v as f64;
                    sum[c] += v;
                    sum_sq[c] += v * v;
                }
                count += 1;
            }
        }

        if count == 0 {
            return Err(ScalerError::Empty);
        }

        let n = count as f64;
        let mut mean = Vec::with_capacity(sum.len());
        let mut scale = Vec::with_capacity(sum.len());
        for (s, sq) in sum.iter().zip(&sum_sq) {
            let m = s / n;
            let var = (sq / n - m * m).max(0.0);
            let std = var.sqrt();
            mean.push(m as f32);
            // Desviación nula → escala 1, la feature queda solo centrada
            scale.push(if std < 10.0 * f64::EPSILON { 1.0 } else { std as f32 });
        }

        Ok(Self {
            mean,
            scale,
            samples_seen: count,
        })
    }

    pub fn features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, window: &Window) -> Result<Window, ScalerError> {
        if window.features() != self.features() {
            return Err(ScalerError::InvalidFeatureSize {
                expected: self.features(),
                actual: window.features(),
            });
        }

        let mut data = Vec::with_capacity(window.as_slice().len());
        for row in window.rows() {
            for (c, &v) in row.iter().enumerate() {
                data.push((v - self.mean[c]) / self.scale[c]);
            }
        }

        // Mismas dimensiones que la entrada
        Window::new(data, window.timesteps(), window.features()).ok_or(
            ScalerError::InvalidFeatureSize {
                expected: self.features(),
                actual: window.features(),
            },
        )
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScalerError> {
        let content = fs::read_to_string(path)?;
        let scaler: StandardScaler = serde_json::from_str(&content)?;
        if scaler.mean.len() != scaler.scale.len() {
            return Err(ScalerError::InvalidFeatureSize {
                expected: scaler.mean.len(),
                actual: scaler.scale.len(),
            });
        }
        Ok(scaler)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ScalerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
