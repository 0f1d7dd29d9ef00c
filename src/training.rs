//! Preparación del entrenamiento externo: separación train/test, ajuste y
//! persistencia del preprocesador, exportación de las ventanas estandarizadas.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;

use crate::config::AppConfig;
use crate::dataset::{load_dataset, Dataset};
use crate::scaler::StandardScaler;

/// Archivos generados por `prepare`
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSplit {
    pub preprocessor: PathBuf,
    pub train_csv: PathBuf,
    pub test_csv: PathBuf,
    pub train_windows: usize,
    pub test_windows: usize,
}

/// Escribe ventanas como filas `label,f0..fN` (ventana aplanada [t * F + f])
pub fn write_windows_csv(path: &Path, dataset: &Dataset, scaler: &StandardScaler) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("No se pudo crear el directorio {:?}", parent))?;
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("No se pudo crear {:?}", path))?;

    if let Some(first) = dataset.windows.first() {
        let width = first.timesteps() * first.features();
        let mut header = Vec::with_capacity(width + 1);
        header.push("label".to_string());
        header.extend((0..width).map(|i| format!("f{}", i)));
        writer.write_record(&header)?;
    }

    for (window, label) in dataset.iter() {
        let processed = scaler.transform(window)?;
        let mut record = Vec::with_capacity(processed.as_slice().len() + 1);
        record.push(label.to_string());
        record.extend(processed.as_slice().iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Ajusta el preprocesador sobre el split de entrenamiento y lo persiste
pub fn prepare_split(
    dataset: Dataset,
    config: &AppConfig,
) -> Result<(PreparedSplit, StandardScaler)> {
    if dataset.is_empty() {
        bail!("El dataset está vacío: revisa [dataset.sources] y window_length");
    }

    let num_classes = config.num_classes();
    info!("Ventanas por clase: {:?}", dataset.class_counts(num_classes));

    let (train, test) = dataset.split(config.training.test_fraction, config.training.seed);
    if train.is_empty() {
        bail!("El split de entrenamiento quedó vacío");
    }

    let scaler = StandardScaler::fit(&train.windows)?;
    let artifacts = config.artifacts();
    scaler
        .save(&artifacts.preprocessor)
        .with_context(|| format!("No se pudo guardar {:?}", artifacts.preprocessor))?;
    info!("💾 Preprocesador guardado en {:?}", artifacts.preprocessor);

    let train_csv = config
        .model
        .dir
        .join(format!("{}_train.csv", config.model.name));
    let test_csv = config
        .model
        .dir
        .join(format!("{}_test.csv", config.model.name));
    write_windows_csv(&train_csv, &train, &scaler)?;
    write_windows_csv(&test_csv, &test, &scaler)?;
    info!(
        "💾 {} ventanas de entrenamiento → {:?}, {} de test → {:?}",
        train.len(),
        train_csv,
        test.len(),
        test_csv
    );

    Ok((
        PreparedSplit {
            preprocessor: artifacts.preprocessor,
            train_csv,
            test_csv,
            train_windows: train.len(),
            test_windows: test.len(),
        },
        scaler,
    ))
}

/// Carga el dataset configurado y prepara los artefactos de entrenamiento
pub fn prepare(config: &AppConfig) -> Result<PreparedSplit> {
    let sources = config.class_sources()?;
    let dataset = load_dataset(
        &sources,
        config.dataset.window_length,
        config.dataset.num_features,
    )?;
    let (split, _) = prepare_split(dataset, config)?;
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Window;

    fn temp_config(name: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.model.dir =
            std::env::temp_dir().join(format!("ippon_training_{}_{}", std::process::id(), name));
        config.model.name = "unit".to_string();
        config
    }

    #[test]
    fn test_prepare_split_writes_artifacts() {
        let config = temp_config("split");
        let mut dataset = Dataset::new();
        for i in 0..10 {
            let data = vec![i as f32, 1.0, i as f32 * 2.0, 1.0];
            dataset.push(Window::new(data, 2, 2).unwrap(), i % 3);
        }

        let (split, scaler) = prepare_split(dataset, &config).unwrap();
        assert_eq!(split.train_windows, 8);
        assert_eq!(split.test_windows, 2);
        assert_eq!(scaler.features(), 2);

        assert_eq!(StandardScaler::load(&split.preprocessor).unwrap(), scaler);

        let train = fs::read_to_string(&split.train_csv).unwrap();
        let mut lines = train.lines();
        assert_eq!(lines.next().unwrap(), "label,f0,f1,f2,f3");
        assert_eq!(lines.count(), 8);

        fs::remove_dir_all(&config.model.dir).ok();
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        let config = temp_config("empty");
        assert!(prepare_split(Dataset::new(), &config).is_err());
    }
}
