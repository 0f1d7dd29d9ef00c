use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;

use crate::types::{RawSample, SampleMatrix, SensorReading, CAPTURE_HEADER, SENSOR_CHANNELS};

/// Carga las filas de un CSV de captura con el formato
/// timestamp,ax1,...,gz2,em_movimento descartando la columna timestamp.
/// El resultado conserva todas las columnas restantes (features + marca).
pub fn load_samples_from_csv(path: impl AsRef<Path>) -> Result<SampleMatrix> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let header_len = reader
        .headers()
        .with_context(|| format!("Cabecera inválida en {:?}", path))?
        .len();
    if header_len < 2 {
        bail!(
            "El CSV {:?} necesita timestamp y al menos una columna más (tiene {})",
            path,
            header_len
        );
    }

    let mut samples = SampleMatrix::new(header_len - 1);
    let mut row = Vec::with_capacity(header_len - 1);

    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;

        row.clear();
        for (col_idx, field) in record.iter().enumerate().skip(1) {
            let value: f32 = field.trim().parse().with_context(|| {
                format!(
                    "Valor '{}' inválido en fila {}, columna {} de {:?}",
                    field,
                    row_idx + 1,
                    col_idx + 1,
                    path
                )
            })?;
            row.push(value);
        }

        if !samples.push_row(&row) {
            bail!(
                "La fila {} de {:?} tiene {} columnas, se esperaban {}",
                row_idx + 1,
                path,
                row.len() + 1,
                header_len
            );
        }
    }

    Ok(samples)
}

/// Carga un CSV de captura completo como secuencia de RawSample
pub fn load_capture_from_csv(path: impl AsRef<Path>) -> Result<Vec<RawSample>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut samples = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() != CAPTURE_HEADER.len() {
            bail!(
                "La fila {} no tiene {} columnas",
                row_idx + 1,
                CAPTURE_HEADER.len()
            );
        }

        let timestamp: f64 = record[0]
            .trim()
            .parse()
            .with_context(|| format!("timestamp inválido en fila {}", row_idx + 1))?;

        let mut values: SensorReading = [0.0; SENSOR_CHANNELS];
        for (ch, value) in values.iter_mut().enumerate() {
            *value = record[ch + 1]
                .trim()
                .parse()
                .with_context(|| {
                    format!("{} inválido en fila {}", CAPTURE_HEADER[ch + 1], row_idx + 1)
                })?;
        }

        let flag: f32 = record[SENSOR_CHANNELS + 1]
            .trim()
            .parse()
            .with_context(|| format!("em_movimento inválido en fila {}", row_idx + 1))?;

        samples.push(RawSample {
            timestamp,
            values,
            in_motion: flag != 0.0,
        });
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_csv(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "ippon_csv_loader_{}_{}.csv",
            std::process::id(),
            name
        ));
        fs::write(&path, content).unwrap();
        path
    }

    fn capture_row(ts: f64, base: f32, flag: u8) -> String {
        let values: Vec<String> = (0..SENSOR_CHANNELS)
            .map(|c| format!("{}", base + c as f32))
            .collect();
        format!("{},{},{}\n", ts, values.join(","), flag)
    }

    #[test]
    fn test_timestamp_column_is_dropped() {
        let mut content = CAPTURE_HEADER.join(",");
        content.push('\n');
        content.push_str(&capture_row(1.5, 10.0, 1));
        content.push_str(&capture_row(1.6, 20.0, 0));
        let path = temp_csv("drop_ts", &content);

        let samples = load_samples_from_csv(&path).unwrap();
        assert_eq!(samples.rows(), 2);
        assert_eq!(samples.columns(), SENSOR_CHANNELS + 1);
        assert_eq!(samples.row(0)[0], 10.0);
        assert_eq!(samples.row(0)[SENSOR_CHANNELS], 1.0);
        assert_eq!(samples.row(1)[SENSOR_CHANNELS], 0.0);

        let capture = load_capture_from_csv(&path).unwrap();
        assert_eq!(capture.len(), 2);
        assert_eq!(capture[0].timestamp, 1.5);
        assert!(capture[0].in_motion);
        assert!(!capture[1].in_motion);
        assert_eq!(capture[1].values[11], 31.0);

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_header_only_is_empty() {
        let path = temp_csv("header_only", &format!("{}\n", CAPTURE_HEADER.join(",")));
        let samples = load_samples_from_csv(&path).unwrap();
        assert_eq!(samples.rows(), 0);
        assert_eq!(samples.columns(), SENSOR_CHANNELS + 1);
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_non_numeric_value_is_an_error() {
        let path = temp_csv("bad_value", "timestamp,a,b\n1.0,2.0,abc\n");
        let err = load_samples_from_csv(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("abc"));
        fs::remove_file(path).ok();
    }
}
