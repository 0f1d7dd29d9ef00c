use std::fmt;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::dataset::Dataset;
use crate::gesture_classifier::{ClassifierError, GestureClassifier, SequenceModel};

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Class id {class_id} outside 0..{num_classes}")]
    ClassOutOfRange { class_id: usize, num_classes: usize },

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Matriz de confusión: filas = clase real, columnas = clase predicha
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            counts: vec![vec![0; num_classes]; num_classes],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    pub fn record(&mut self, truth: usize, predicted: usize) -> Result<(), MetricsError> {
        let n = self.num_classes();
        for class_id in [truth, predicted] {
            if class_id >= n {
                return Err(MetricsError::ClassOutOfRange {
                    class_id,
                    num_classes: n,
                });
            }
        }
        self.counts[truth][predicted] += 1;
        Ok(())
    }

    pub fn count(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth][predicted]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes()).map(|i| self.counts[i][i]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Confusion Matrix:")?;
        for row in &self.counts {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            writeln!(f, "{}", cells.join(" "))?;
        }
        write!(f, "Accuracy: {:.4}", self.accuracy())
    }
}

/// Evalúa `samples` ventanas distintas elegidas al azar del dataset
pub fn evaluate<M: SequenceModel>(
    classifier: &mut GestureClassifier<M>,
    dataset: &Dataset,
    num_classes: usize,
    samples: usize,
    seed: Option<u64>,
) -> Result<ConfusionMatrix, MetricsError> {
    let amount = samples.min(dataset.len());
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let indices = rand::seq::index::sample(&mut rng, dataset.len(), amount);

    let mut matrix = ConfusionMatrix::new(num_classes);
    for idx in indices.iter() {
        let predicted = classifier.predict(&dataset.windows[idx])?;
        matrix.record(dataset.labels[idx], predicted)?;
    }

    info!(
        "📊 {} ventanas evaluadas, accuracy {:.4}",
        matrix.total(),
        matrix.accuracy()
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::StandardScaler;
    use crate::types::Window;

    /// Predice la clase guardada en el primer valor de la ventana
    struct EchoModel;

    impl SequenceModel for EchoModel {
        fn predict_scores(
            &mut self,
            input: Vec<f32>,
            _timesteps: usize,
            _features: usize,
        ) -> Result<Vec<f32>, ClassifierError> {
            let mut scores = vec![0.0; 3];
            scores[input[0] as usize] = 1.0;
            Ok(scores)
        }
    }

    fn echo_classifier() -> GestureClassifier<EchoModel> {
        let scaler = StandardScaler {
            mean: vec![0.0],
            scale: vec![1.0],
            samples_seen: 1,
        };
        GestureClassifier::new(EchoModel, scaler, vec![])
    }

    #[test]
    fn test_counts_and_accuracy() {
        let mut m = ConfusionMatrix::new(3);
        m.record(0, 0).unwrap();
        m.record(1, 1).unwrap();
        m.record(2, 1).unwrap();
        m.record(2, 2).unwrap();
        assert_eq!(m.total(), 4);
        assert_eq!(m.correct(), 3);
        assert_eq!(m.count(2, 1), 1);
        assert!((m.accuracy() - 0.75).abs() < 1e-12);
        assert!(m.record(3, 0).is_err());
        assert_eq!(
            m.to_string(),
            "Confusion Matrix:\n1 0 0\n0 1 0\n0 1 1\nAccuracy: 0.7500"
        );
        assert_eq!(ConfusionMatrix::new(2).accuracy(), 0.0);
    }

    #[test]
    fn test_evaluate_samples_without_replacement() {
        let mut dataset = Dataset::new();
        for i in 0..30 {
            let class_id = i % 3;
            // La ventana 0 de cada clase 2 se predice mal (como clase 0)
            let value = if class_id == 2 && i == 2 { 0.0 } else { class_id as f32 };
            dataset.push(Window::new(vec![value], 1, 1).unwrap(), class_id);
        }

        let mut clf = echo_classifier();
        let all = evaluate(&mut clf, &dataset, 3, 1000, Some(7)).unwrap();
        assert_eq!(all.total(), 30);
        assert_eq!(all.count(2, 0), 1);
        assert_eq!(all.correct(), 29);

        let some = evaluate(&mut clf, &dataset, 3, 10, Some(7)).unwrap();
        assert_eq!(some.total(), 10);
        let again = evaluate(&mut clf, &dataset, 3, 10, Some(7)).unwrap();
        assert_eq!(some, again);
    }
}
