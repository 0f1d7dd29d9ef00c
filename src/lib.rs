//! Clasificación de golpes (none / wazari / ippon) a partir de dos IMUs.
//!
//! - `dataset`, `windowing`, `csv_loader`, `mat_loader`: ventanas etiquetadas
//!   desde archivos `.csv` / `.mat`.
//! - `serial`, `gesture_buffer`, `capture`, `live`: lectura del puerto serie,
//!   captura etiquetada y clasificación en tiempo real.
//! - `scaler`, `gesture_classifier`: preprocesador + modelo ONNX.
//! - `training`, `metrics`: preparación del entrenamiento externo y evaluación.

pub mod capture;
pub mod config;
pub mod csv_loader;
pub mod dataset;
pub mod gesture_buffer;
pub mod gesture_classifier;
pub mod live;
pub mod logger;
pub mod mat_loader;
pub mod metrics;
pub mod scaler;
pub mod serial;
pub mod training;
pub mod types;
pub mod windowing;
