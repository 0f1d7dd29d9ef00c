//! Clasificación en tiempo real: ventanas consecutivas sin solapamiento del
//! puerto serie → clasificador → canal de resultados.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use chrono::{DateTime, Local};
use crossbeam_channel::Sender;
use log::{debug, info};

use crate::gesture_buffer::GestureBuffer;
use crate::gesture_classifier::{GestureClassifier, SequenceModel};
use crate::serial::{LineSource, ReadEvent};

/// Resultado de clasificar una ventana
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_id: usize,
    pub label: String,
    pub at: DateTime<Local>,
}

impl Prediction {
    /// Clase 0 = sin movimiento
    pub fn is_strike(&self) -> bool {
        self.class_id != 0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveStats {
    pub samples: u64,
    pub windows: u64,
    pub strikes: u64,
}

/// Bucle de lectura + clasificación. Termina al bajar `running`, al final del
/// stream, si el receptor desaparece o ante cualquier error (sin reintentos).
pub fn run_live_loop<R: BufRead, M: SequenceModel>(
    source: &mut LineSource<R>,
    classifier: &mut GestureClassifier<M>,
    timesteps: usize,
    running: &AtomicBool,
    tx: &Sender<Prediction>,
) -> Result<LiveStats> {
    let mut buffer = GestureBuffer::new(timesteps, classifier.features());
    let mut stats = LiveStats::default();

    while running.load(Ordering::Relaxed) {
        let reading = match source.next_event()? {
            ReadEvent::Reading(reading) => reading,
            ReadEvent::Idle => continue,
            ReadEvent::Eof => {
                info!("Fin del stream de entrada");
                break;
            }
        };
        stats.samples += 1;

        let Some(window) = buffer.push(&reading) else {
            continue;
        };

        let class_id = classifier.predict(&window)?;
        stats.windows += 1;

        let prediction = Prediction {
            class_id,
            label: classifier.label(class_id).to_string(),
            at: Local::now(),
        };
        if prediction.is_strike() {
            stats.strikes += 1;
            info!("🥋 {} (clase {})", prediction.label, class_id);
        } else {
            debug!("Ventana sin movimiento");
        }

        if tx.send(prediction).is_err() {
            // Canal cerrado: nadie consume los resultados
            info!("Canal de predicciones desconectado, terminando lectura");
            break;
        }
    }

    Ok(stats)
}
