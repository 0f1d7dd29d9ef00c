use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use ippon::config::{AppConfig, DEFAULT_CONFIG_PATH};
use ippon::csv_loader::load_capture_from_csv;
use ippon::dataset::{load_source, SourceFormat};
use ippon::gesture_classifier::GestureClassifier;
use ippon::logger;
use ippon::metrics::ConfusionMatrix;
use ippon::windowing::{chunk, label_windows};

/// Reproduce una grabación ventana por ventana y compara la predicción con
/// la etiqueta que sale de la columna de movimiento
#[derive(Parser, Debug)]
#[command(name = "replay_csv")]
struct Args {
    /// Archivo grabado (.csv de captura o .mat)
    file: PathBuf,

    /// Clase del movimiento grabado (ej: wazari)
    #[arg(long)]
    class: String,

    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    window_length: Option<usize>,
}

fn main() -> Result<()> {
    logger::init_logger();
    let args = Args::parse();

    let mut config = if args.config.is_file() {
        AppConfig::load_from_file(&args.config)
            .with_context(|| format!("Configuración inválida en {:?}", args.config))?
    } else {
        AppConfig::default()
    };
    if let Some(model) = args.model {
        config.model.name = model;
    }
    if let Some(window_length) = args.window_length {
        config.dataset.window_length = window_length;
    }
    config.validate()?;

    let class_id = config
        .dataset
        .classes
        .iter()
        .position(|c| *c == args.class)
        .ok_or_else(|| {
            anyhow!(
                "Clase '{}' desconocida (disponibles: {:?})",
                args.class,
                config.dataset.classes
            )
        })?;

    println!("🎞️  Reproduciendo {:?} como '{}'", args.file, args.class);

    if SourceFormat::from_path(&args.file)? == SourceFormat::Csv {
        let capture = load_capture_from_csv(&args.file)?;
        let in_motion = capture.iter().filter(|s| s.in_motion).count();
        let duration = match (capture.first(), capture.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        };
        println!(
            "   {} muestras en {:.1} s, {} en movimiento",
            capture.len(),
            duration,
            in_motion
        );
    }

    let samples = load_source(&args.file, config.dataset.num_features)?;
    let (windows, labels) = label_windows(
        chunk(&samples, config.dataset.window_length),
        class_id,
    )?;
    if windows.is_empty() {
        bail!(
            "{:?} tiene {} filas, menos que una ventana de {}",
            args.file,
            samples.rows(),
            config.dataset.window_length
        );
    }

    let mut classifier =
        GestureClassifier::load(&config.artifacts(), config.dataset.classes.clone())?;
    let mut matrix = ConfusionMatrix::new(config.num_classes());

    println!("\n  #   esperado   predicho");
    for (idx, (window, expected)) in windows.iter().zip(labels).enumerate() {
        let predicted = classifier.predict(window)?;
        matrix.record(expected, predicted)?;
        let mark = if predicted == expected { "✅" } else { "❌" };
        println!(
            "{:>3}   {:<10} {:<10} {}",
            idx,
            classifier.label(expected),
            classifier.label(predicted),
            mark
        );
    }

    println!("\n{}", matrix);
    Ok(())
}
