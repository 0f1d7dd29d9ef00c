use std::path::{Path, PathBuf};

use log::info;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::ValueType;
use thiserror::Error;

use crate::scaler::{ScalerError, StandardScaler};
use crate::types::Window;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[error("Preprocessor error: {0}")]
    ScalerError(#[from] ScalerError),

    #[error("Missing {kind} file: {}", path.display())]
    MissingArtifact { kind: &'static str, path: PathBuf },

    #[error("Invalid window size: expected {expected} features, got {actual}")]
    InvalidFeatureSize { expected: usize, actual: usize },

    #[error("No output tensor found")]
    NoOutputTensor,

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },
}

/// Modelo secuencial: recibe [1, timesteps, features] y devuelve un score por clase
pub trait SequenceModel {
    fn predict_scores(
        &mut self,
        input: Vec<f32>,
        timesteps: usize,
        features: usize,
    ) -> Result<Vec<f32>, ClassifierError>;
}

/// Rutas del modelo y del preprocesador persistidos para un nombre dado
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    pub model: PathBuf,
    pub preprocessor: PathBuf,
}

impl ModelArtifacts {
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(format!("{}.onnx", name)),
            preprocessor: dir.join(format!("preprocessing_pipe_{}.json", name)),
        }
    }

    /// Ambos archivos deben existir antes de cargar nada
    pub fn ensure_present(&self) -> Result<(), ClassifierError> {
        if !self.model.is_file() {
            return Err(ClassifierError::MissingArtifact {
                kind: "model",
                path: self.model.clone(),
            });
        }
        if !self.preprocessor.is_file() {
            return Err(ClassifierError::MissingArtifact {
                kind: "preprocessor",
                path: self.preprocessor.clone(),
            });
        }
        Ok(())
    }
}

/// Modelo exportado a ONNX ejecutado con ONNX Runtime
pub struct OnnxModel {
    session: Session,
    input_name: String,
    prob_output_name: String,
}

impl OnnxModel {
    pub fn load(model_path: &Path) -> Result<Self, ClassifierError> {
        let session = Session::builder()?.commit_from_file(model_path)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or(ClassifierError::MissingIo { kind: "input" })?;

        let prob_output_name = session
            .outputs
            .iter()
            .find(|output| {
                matches!(
                    output.output_type,
                    ValueType::Tensor {
                        ty: TensorElementType::Float32,
                        ..
                    }
                )
            })
            .or_else(|| session.outputs.first())
            .map(|output| output.name.clone())
            .ok_or(ClassifierError::MissingIo { kind: "output" })?;

        info!("[ONNX] Modelo cargado: {:?}", model_path);
        info!("[ONNX] Input: {}", input_name);
        info!("[ONNX] Output: {}", prob_output_name);

        Ok(Self {
            session,
            input_name,
            prob_output_name,
        })
    }
}

impl SequenceModel for OnnxModel {
    fn predict_scores(
        &mut self,
        input: Vec<f32>,
        timesteps: usize,
        features: usize,
    ) -> Result<Vec<f32>, ClassifierError> {
        // Tensor de entrada [1, T, F]
        let shape_vec = vec![1_usize, timesteps, features];
        let input_value = ort::value::Tensor::from_array((shape_vec, input))?;

        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => &input_value,
        ])?;

        let (prob_shape, prob_data) =
            outputs[self.prob_output_name.as_str()].try_extract_tensor::<f32>()?;

        let num_classes = match prob_shape.len() {
            0 => return Err(ClassifierError::NoOutputTensor),
            1 => prob_shape[0] as usize,
            _ => prob_shape[prob_shape.len() - 1] as usize,
        };

        Ok(prob_data.iter().take(num_classes).copied().collect())
    }
}

/// Índice del score más alto; en empate gana el primero. Se ignoran NaN.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if !(s > b) => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

/// Preprocesador ajustado + modelo secuencial
pub struct GestureClassifier<M = OnnxModel> {
    model: M,
    scaler: StandardScaler,
    labels: Vec<String>,
}

impl GestureClassifier<OnnxModel> {
    /// Carga modelo y preprocesador persistidos. La falta de cualquiera es fatal.
    pub fn load(artifacts: &ModelArtifacts, labels: Vec<String>) -> Result<Self, ClassifierError> {
        artifacts.ensure_present()?;

        let scaler = StandardScaler::load(&artifacts.preprocessor)?;
        info!(
            "[ONNX] Preprocesador cargado: {:?} ({} features)",
            artifacts.preprocessor,
            scaler.features()
        );
        let model = OnnxModel::load(&artifacts.model)?;
        info!("[ONNX] Clases: {:?}", labels);

        Ok(Self::new(model, scaler, labels))
    }
}

impl<M: SequenceModel> GestureClassifier<M> {
    pub fn new(model: M, scaler: StandardScaler, labels: Vec<String>) -> Self {
        Self {
            model,
            scaler,
            labels,
        }
    }

    /// Número de features que espera el preprocesador
    pub fn features(&self) -> usize {
        self.scaler.features()
    }

    /// Scores crudos del modelo para una ventana
    pub fn predict_scores(&mut self, window: &Window) -> Result<Vec<f32>, ClassifierError> {
        if window.features() != self.scaler.features() {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: self.scaler.features(),
                actual: window.features(),
            });
        }

        let processed = self.scaler.transform(window)?;
        let (timesteps, features) = (processed.timesteps(), processed.features());
        self.model
            .predict_scores(processed.into_vec(), timesteps, features)
    }

    /// Clase con mayor score
    pub fn predict(&mut self, window: &Window) -> Result<usize, ClassifierError> {
        let scores = self.predict_scores(window)?;
        argmax(&scores).ok_or(ClassifierError::NoOutputTensor)
    }

    /// Nombre de una clase, o "?" si el modelo devuelve un índice sin nombre
    pub fn label(&self, class_id: usize) -> &str {
        self.labels
            .get(class_id)
            .map(String::as_str)
            .unwrap_or("?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Modelo de prueba: devuelve scores fijos y guarda la última entrada
    struct FixedModel {
        scores: Vec<f32>,
        last_input: Option<(Vec<f32>, usize, usize)>,
    }

    impl SequenceModel for FixedModel {
        fn predict_scores(
            &mut self,
            input: Vec<f32>,
            timesteps: usize,
            features: usize,
        ) -> Result<Vec<f32>, ClassifierError> {
            self.last_input = Some((input, timesteps, features));
            Ok(self.scores.clone())
        }
    }

    fn classifier(scores: Vec<f32>) -> GestureClassifier<FixedModel> {
        let scaler = StandardScaler {
            mean: vec![1.0, 2.0],
            scale: vec![2.0, 1.0],
            samples_seen: 1,
        };
        GestureClassifier::new(
            FixedModel {
                scores,
                last_input: None,
            },
            scaler,
            vec!["none".into(), "wazari".into(), "ippon".into()],
        )
    }

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5, 0.1]), Some(0));
        assert_eq!(argmax(&[f32::NAN, 0.3]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_predict_applies_scaler_then_model() {
        let mut clf = classifier(vec![0.1, 0.2, 0.7]);
        let window = Window::new(vec![3.0, 2.0, 5.0, 4.0], 2, 2).unwrap();

        assert_eq!(clf.predict(&window).unwrap(), 2);
        assert_eq!(clf.label(2), "ippon");
        assert_eq!(clf.label(7), "?");

        let (input, t, f) = clf.model.last_input.clone().unwrap();
        assert_eq!((t, f), (2, 2));
        assert_eq!(input, vec![1.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let mut clf = classifier(vec![1.0]);
        let window = Window::new(vec![0.0; 6], 2, 3).unwrap();
        assert!(matches!(
            clf.predict(&window),
            Err(ClassifierError::InvalidFeatureSize { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_empty_scores_are_an_error() {
        let mut clf = classifier(vec![]);
        let window = Window::new(vec![0.0; 4], 2, 2).unwrap();
        assert!(matches!(clf.predict(&window), Err(ClassifierError::NoOutputTensor)));
    }

    #[test]
    fn test_missing_artifacts_are_fatal() {
        let dir = std::env::temp_dir().join(format!("ippon_models_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let artifacts = ModelArtifacts::new(&dir, "lstm");
        assert_eq!(artifacts.model, dir.join("lstm.onnx"));
        assert_eq!(artifacts.preprocessor, dir.join("preprocessing_pipe_lstm.json"));

        assert!(matches!(
            artifacts.ensure_present(),
            Err(ClassifierError::MissingArtifact { kind: "model", .. })
        ));

        std::fs::write(&artifacts.model, b"onnx").unwrap();
        assert!(matches!(
            GestureClassifier::load(&artifacts, vec![]),
            Err(ClassifierError::MissingArtifact { kind: "preprocessor", .. })
        ));
        std::fs::remove_file(&artifacts.model).ok();
    }
}
