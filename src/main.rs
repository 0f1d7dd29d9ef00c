/*
Reconocimiento de golpes (wazari / ippon) con dos IMUs por puerto serie.

Subcomandos:
  prepare   separa train/test, ajusta y guarda el preprocesador y exporta las
            ventanas estandarizadas para entrenar el LSTM fuera de este binario
  metrics   matriz de confusión del modelo sobre ventanas del dataset
  capture   graba el puerto serie en CSV; Enter activa/desactiva la marca de
            movimiento, "q" termina
  live      clasifica en tiempo real ventanas consecutivas del puerto serie

Ejemplo:
  ./target/release/ippon --config config/params.toml live --port /dev/ttyUSB0
*/

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{bounded, never, select, unbounded, Receiver};
use log::{error, info, warn};

use ippon::capture::{run_capture_loop, unique_capture_path, CaptureWriter};
use ippon::config::{AppConfig, DEFAULT_CONFIG_PATH};
use ippon::dataset::load_dataset;
use ippon::gesture_classifier::GestureClassifier;
use ippon::live::{run_live_loop, Prediction};
use ippon::logger;
use ippon::metrics::evaluate;
use ippon::serial::open_port;
use ippon::training;

#[derive(Parser, Debug)]
#[command(name = "ippon")]
#[command(
    about = "IMU strike classifier: capture, dataset preparation, metrics and live inference",
    long_about = None
)]
struct Cli {
    /// Archivo de configuración TOML
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Valores que sobrescriben la configuración
#[derive(Args, Debug, Clone, Default)]
struct Overrides {
    /// Puerto serie (ej: /dev/ttyUSB0, COM5)
    #[arg(long)]
    port: Option<String>,

    #[arg(long)]
    baud: Option<u32>,

    /// Muestras por ventana
    #[arg(long)]
    window_length: Option<usize>,

    /// Nombre del modelo dentro de model.dir
    #[arg(long)]
    model: Option<String>,
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(window_length) = self.window_length {
            config.dataset.window_length = window_length;
        }
        if let Some(model) = &self.model {
            config.model.name = model.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Separa train/test, ajusta el preprocesador y exporta las ventanas
    Prepare {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Matriz de confusión sobre ventanas aleatorias del dataset
    Metrics {
        #[arg(long)]
        samples: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Graba el puerto serie con la marca de movimiento
    Capture {
        /// Nombre del movimiento (da nombre al archivo)
        title: String,

        #[arg(long, default_value = "dataset")]
        out_dir: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Clasificación en tiempo real
    Live {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Órdenes del operador leídas por stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorCommand {
    Toggle,
    Quit,
}

fn spawn_operator_input() -> Receiver<OperatorCommand> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let cmd = match line.trim() {
                "q" | "quit" => OperatorCommand::Quit,
                _ => OperatorCommand::Toggle,
            };
            if tx.send(cmd).is_err() || cmd == OperatorCommand::Quit {
                break;
            }
        }
    });
    rx
}

fn load_config(path: &Path, overrides: &Overrides, allow_default: bool) -> Result<AppConfig> {
    let mut config = if path.is_file() {
        AppConfig::load_from_file(path)
            .with_context(|| format!("Configuración inválida en {:?}", path))?
    } else if allow_default {
        warn!("⚠️  {:?} no existe, usando configuración por defecto", path);
        AppConfig::default()
    } else {
        bail!("No se encontró el archivo de configuración {:?}", path);
    };

    overrides.apply(&mut config);
    config
        .validate()
        .context("Configuración inválida tras aplicar los argumentos")?;
    Ok(config)
}

fn run_prepare(config: &AppConfig) -> Result<()> {
    let split = training::prepare(config)?;
    println!(
        "✅ Preprocesador: {:?}\n   Train: {} ventanas → {:?}\n   Test:  {} ventanas → {:?}",
        split.preprocessor, split.train_windows, split.train_csv, split.test_windows, split.test_csv
    );
    Ok(())
}

fn run_metrics(config: &AppConfig, samples: Option<usize>, seed: Option<u64>) -> Result<()> {
    let mut classifier =
        GestureClassifier::load(&config.artifacts(), config.dataset.classes.clone())?;

    let sources = config.class_sources()?;
    let dataset = load_dataset(
        &sources,
        config.dataset.window_length,
        config.dataset.num_features,
    )?;
    if dataset.is_empty() {
        bail!("El dataset está vacío, no hay nada que evaluar");
    }

    let samples = samples.unwrap_or(config.metrics.samples);
    let seed = seed.or(config.metrics.seed);
    let matrix = evaluate(&mut classifier, &dataset, config.num_classes(), samples, seed)?;
    println!("{}", matrix);
    Ok(())
}

fn run_capture(config: &AppConfig, title: &str, out_dir: &Path) -> Result<()> {
    let path = unique_capture_path(out_dir, title);
    let mut writer = CaptureWriter::create(&path)?;
    info!("📁 Guardando en: {:?}", path);

    let running = Arc::new(AtomicBool::new(true));
    let labeling = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = bounded(1);

    let settings = config.port_settings();
    let thread_running = Arc::clone(&running);
    let thread_labeling = Arc::clone(&labeling);
    let handle = thread::spawn(move || {
        let result = open_port(&settings)
            .map_err(anyhow::Error::from)
            .and_then(|mut source| {
                run_capture_loop(&mut source, &mut writer, &thread_labeling, &thread_running)
            });
        let _ = done_tx.send(result);
    });

    println!("Enter = iniciar/parar movimiento, q = salir");
    let mut commands = spawn_operator_input();

    let result = loop {
        select! {
            recv(commands) -> cmd => match cmd {
                Ok(OperatorCommand::Toggle) => {
                    let active = !labeling.load(Ordering::Relaxed);
                    labeling.store(active, Ordering::Relaxed);
                    let now = chrono::Local::now().format("%H:%M:%S%.3f");
                    if active {
                        println!("🟢 EN MOVIMIENTO ({})", now);
                    } else {
                        println!("🔴 PARADO ({})", now);
                    }
                }
                Ok(OperatorCommand::Quit) => {
                    info!("Deteniendo captura...");
                    running.store(false, Ordering::Relaxed);
                }
                Err(_) => commands = never(),
            },
            recv(done_rx) -> result => {
                break result.unwrap_or_else(|_| {
                    Err(anyhow::anyhow!("El hilo de captura terminó sin resultado"))
                });
            }
        }
    };

    if handle.join().is_err() {
        error!("❌ El hilo de captura entró en pánico");
    }

    let stats = result?;
    println!(
        "🛑 {} filas guardadas en {:?} ({} en movimiento, {} líneas descartadas)",
        stats.rows, path, stats.in_motion_rows, stats.skipped_lines
    );
    Ok(())
}

fn run_live(config: &AppConfig) -> Result<()> {
    let mut classifier =
        GestureClassifier::load(&config.artifacts(), config.dataset.classes.clone())?;
    if classifier.features() != config.dataset.num_features {
        warn!(
            "⚠️  El preprocesador espera {} features y la configuración indica {}; se usan {}",
            classifier.features(),
            config.dataset.num_features,
            classifier.features()
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = bounded::<Prediction>(100);
    let (done_tx, done_rx) = bounded(1);

    let settings = config.port_settings();
    let timesteps = config.dataset.window_length;
    let thread_running = Arc::clone(&running);
    let handle = thread::spawn(move || {
        let result = open_port(&settings)
            .map_err(anyhow::Error::from)
            .and_then(|mut source| {
                run_live_loop(&mut source, &mut classifier, timesteps, &thread_running, &tx)
            });
        let _ = done_tx.send(result);
    });

    println!("🎬 Clasificación en tiempo real (q = salir)");
    let mut commands = spawn_operator_input();
    let mut predictions = rx;

    let result = loop {
        select! {
            recv(predictions) -> msg => match msg {
                Ok(prediction) => {
                    if prediction.is_strike() {
                        println!(
                            "🥋 {} {}",
                            prediction.at.format("%H:%M:%S%.3f"),
                            prediction.label.to_uppercase()
                        );
                    }
                }
                Err(_) => predictions = never(),
            },
            recv(commands) -> cmd => match cmd {
                Ok(OperatorCommand::Quit) => {
                    info!("Deteniendo lectura...");
                    running.store(false, Ordering::Relaxed);
                }
                Ok(OperatorCommand::Toggle) => {}
                Err(_) => commands = never(),
            },
            recv(done_rx) -> result => {
                break result.unwrap_or_else(|_| {
                    Err(anyhow::anyhow!("El hilo de lectura terminó sin resultado"))
                });
            }
        }
    };

    if handle.join().is_err() {
        error!("❌ El hilo de lectura entró en pánico");
    }

    let stats = result?;
    println!(
        "🛑 Lectura terminada: {} muestras, {} ventanas, {} golpes",
        stats.samples, stats.windows, stats.strikes
    );
    Ok(())
}

fn main() -> Result<()> {
    logger::init_logger();
    let cli = Cli::parse();

    match &cli.command {
        Command::Prepare { overrides } => {
            let config = load_config(&cli.config, overrides, false)?;
            run_prepare(&config)
        }
        Command::Metrics {
            samples,
            seed,
            overrides,
        } => {
            let config = load_config(&cli.config, overrides, false)?;
            run_metrics(&config, *samples, *seed)
        }
        Command::Capture {
            title,
            out_dir,
            overrides,
        } => {
            let config = load_config(&cli.config, overrides, true)?;
            run_capture(&config, title, out_dir)
        }
        Command::Live { overrides } => {
            let config = load_config(&cli.config, overrides, true)?;
            run_live(&config)
        }
    }
}
