//! Captura etiquetada: cada lectura válida del puerto se guarda en CSV con la
//! marca `em_movimento` que el operador activa/desactiva en tiempo real.

use std::fs::{self, File};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error, info};

use crate::serial::{LineSource, ReadEvent};
use crate::types::{RawSample, SensorReading, CAPTURE_HEADER};

/// Escritor de CSV de captura (mismo formato que los de entrenamiento)
pub struct CaptureWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl CaptureWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("No se pudo crear el directorio {:?}", parent))?;
        }
        let file =
            File::create(path).with_context(|| format!("No se pudo crear {:?}", path))?;
        Self::new(file)
    }
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(CAPTURE_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_sample(&mut self, sample: &RawSample) -> Result<()> {
        let mut record = Vec::with_capacity(CAPTURE_HEADER.len());
        record.push(sample.timestamp.to_string());
        record.extend(sample.values.iter().map(|v| v.to_string()));
        record.push(if sample.in_motion { "1" } else { "0" }.to_string());
        self.writer.write_record(&record)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("No se pudo vaciar el CSV: {}", e.error()))
    }
}

/// Nombre de archivo a partir del título: minúsculas, espacios → '_',
/// y sufijo "-new" hasta que no exista
pub fn unique_capture_path(dir: impl AsRef<Path>, title: &str) -> PathBuf {
    let stem = title.trim().to_lowercase().replace(' ', "_");
    let mut path = dir.as_ref().join(format!("{}.csv", stem));
    while path.exists() {
        let current = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        path = dir.as_ref().join(format!("{}-new.csv", current));
    }
    path
}

fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Estadísticas de una sesión de captura
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureStats {
    pub rows: u64,
    pub in_motion_rows: u64,
    pub skipped_lines: u64,
}

/// Lee del stream y escribe cada muestra con el valor actual de `labeling`.
/// Termina al bajar `running`, al final del stream o ante corrupción; en ese
/// último caso las filas ya escritas se vacían antes de devolver el error.
pub fn run_capture_loop<R: BufRead, W: Write>(
    source: &mut LineSource<R>,
    writer: &mut CaptureWriter<W>,
    labeling: &AtomicBool,
    running: &AtomicBool,
) -> Result<CaptureStats> {
    let mut stats = CaptureStats::default();

    let result = capture_until_stopped(source, writer, labeling, running, &mut stats);
    stats.skipped_lines = source.skipped();
    writer.flush()?;

    match result {
        Ok(()) => {
            info!(
                "🛑 Captura terminada: {} filas ({} en movimiento)",
                stats.rows, stats.in_motion_rows
            );
            Ok(stats)
        }
        Err(e) => {
            error!("⚠️  Dato inválido, se detiene la captura: {:#}", e);
            Err(e)
        }
    }
}

fn capture_until_stopped<R: BufRead, W: Write>(
    source: &mut LineSource<R>,
    writer: &mut CaptureWriter<W>,
    labeling: &AtomicBool,
    running: &AtomicBool,
    stats: &mut CaptureStats,
) -> Result<()> {
    while running.load(Ordering::Relaxed) {
        let values: SensorReading = match source.next_event()? {
            ReadEvent::Reading(values) => values,
            ReadEvent::Idle => continue,
            ReadEvent::Eof => break,
        };

        let sample = RawSample {
            timestamp: now_seconds(),
            values,
            in_motion: labeling.load(Ordering::Relaxed),
        };
        writer.write_sample(&sample)?;

        stats.rows += 1;
        if sample.in_motion {
            stats.in_motion_rows += 1;
        }
        debug!(
            "{:.3} {:?} {}",
            sample.timestamp,
            sample.values,
            u8::from(sample.in_motion)
        );
    }
    Ok(())
}
