//! Carga de datasets etiquetados a partir de listas de archivos por clase.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

use crate::csv_loader::load_samples_from_csv;
use crate::mat_loader::load_samples_from_mat;
use crate::types::{SampleMatrix, Window};
use crate::windowing::{chunk, label_windows};

#[derive(Error, Debug, PartialEq)]
pub enum DatasetError {
    #[error("Unknown file extension: {}", path.display())]
    UnknownExtension { path: PathBuf },

    #[error("Unknown class '{name}' (configured classes: {known:?})")]
    UnknownClass { name: String, known: Vec<String> },

    #[error("Source {} has {available} feature columns, {requested} requested", path.display())]
    NotEnoughFeatures {
        path: PathBuf,
        available: usize,
        requested: usize,
    },
}

/// Formatos de origen soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Mat,
    Csv,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("mat") => Ok(SourceFormat::Mat),
            Some("csv") => Ok(SourceFormat::Csv),
            _ => Err(DatasetError::UnknownExtension {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Archivos de una clase con su id (posición en la lista de clases)
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSources {
    pub class_id: usize,
    pub name: String,
    pub files: Vec<PathBuf>,
}

/// Resuelve el mapa nombre → archivos contra la lista ordenada de clases.
/// Devuelve las fuentes en el orden de `classes`.
pub fn resolve_sources(
    classes: &[String],
    sources: &BTreeMap<String, Vec<PathBuf>>,
) -> Result<Vec<ClassSources>, DatasetError> {
    if let Some(name) = sources.keys().find(|name| !classes.contains(name)) {
        return Err(DatasetError::UnknownClass {
            name: name.clone(),
            known: classes.to_vec(),
        });
    }

    let resolved = classes
        .iter()
        .enumerate()
        .filter_map(|(class_id, name)| {
            sources.get(name).map(|files| ClassSources {
                class_id,
                name: name.clone(),
                files: files.clone(),
            })
        })
        .collect::<Vec<_>>();

    for class in &resolved {
        for file in &class.files {
            SourceFormat::from_path(file)?;
        }
    }

    Ok(resolved)
}

/// Ventanas y etiquetas alineadas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub windows: Vec<Window>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn push(&mut self, window: Window, label: usize) {
        self.windows.push(window);
        self.labels.push(label);
    }

    pub fn extend(&mut self, windows: Vec<Window>, labels: Vec<usize>) {
        debug_assert_eq!(windows.len(), labels.len());
        self.windows.extend(windows);
        self.labels.extend(labels);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Window, usize)> {
        self.windows.iter().zip(self.labels.iter().copied())
    }

    /// Cuántas ventanas hay de cada clase
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; num_classes];
        for &label in &self.labels {
            if label < num_classes {
                counts[label] += 1;
            }
        }
        counts
    }

    /// Mezcla con semilla y separa en (train, test).
    /// El test recibe ceil(len * test_fraction) ventanas.
    pub fn split(self, test_fraction: f64, seed: u64) -> (Dataset, Dataset) {
        let n = self.len();
        let n_test = ((n as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let mut slots: Vec<Option<(Window, usize)>> =
            self.windows.into_iter().zip(self.labels).map(Some).collect();

        let mut train = Dataset::new();
        let mut test = Dataset::new();
        for (pos, idx) in indices.into_iter().enumerate() {
            if let Some((window, label)) = slots[idx].take() {
                if pos < n_test {
                    test.push(window, label);
                } else {
                    train.push(window, label);
                }
            }
        }
        (train, test)
    }
}

/// Lee un archivo según su extensión y conserva `num_features` + marca
pub fn load_source(path: &Path, num_features: usize) -> Result<SampleMatrix> {
    let samples = match SourceFormat::from_path(path)? {
        SourceFormat::Mat => load_samples_from_mat(path)?,
        SourceFormat::Csv => load_samples_from_csv(path)?,
    };

    let available = samples.columns().saturating_sub(1);
    samples.features_with_label(num_features).ok_or_else(|| {
        DatasetError::NotEnoughFeatures {
            path: path.to_path_buf(),
            available,
            requested: num_features,
        }
        .into()
    })
}

/// Carga todas las fuentes: clase → archivo → ventana, en ese orden.
/// Las extensiones se validan antes de leer ningún archivo.
pub fn load_dataset(
    sources: &[ClassSources],
    window_length: usize,
    num_features: usize,
) -> Result<Dataset> {
    for class in sources {
        for file in &class.files {
            SourceFormat::from_path(file)?;
        }
    }

    let mut dataset = Dataset::new();
    for class in sources {
        for file in &class.files {
            let samples = load_source(file, num_features)?;
            let (windows, labels) = label_windows(chunk(&samples, window_length), class.class_id)
                .with_context(|| format!("No se pudo etiquetar {:?}", file))?;
            debug!(
                "{:?}: {} filas → {} ventanas (clase {})",
                file,
                samples.rows(),
                windows.len(),
                class.name
            );
            dataset.extend(windows, labels);
        }
    }

    info!(
        "📦 Dataset cargado: {} ventanas de {} muestras x {} features",
        dataset.len(),
        window_length,
        num_features
    );
    Ok(dataset)
}
