//! Segmentación en ventanas fijas y etiquetado por voto mayoritario.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::{SampleMatrix, Window};

#[derive(Error, Debug, PartialEq)]
pub enum WindowingError {
    #[error("Negative motion flag {value} cannot be counted")]
    NegativeFlag { value: f32 },

    #[error("Window has no label column")]
    MissingLabelColumn,
}

/// Divide la matriz en floor(rows / window_length) ventanas consecutivas.
/// Las filas sobrantes al final se descartan sin error ni relleno.
pub fn chunk(samples: &SampleMatrix, window_length: usize) -> Vec<Window> {
    if window_length == 0 {
        return Vec::new();
    }

    let columns = samples.columns();
    let n_windows = samples.rows() / window_length;
    let step = window_length * columns;

    samples
        .as_slice()
        .chunks_exact(step.max(1))
        .take(n_windows)
        .filter_map(|block| Window::new(block.to_vec(), window_length, columns))
        .collect()
}

/// Valor más frecuente de la columna de marca (conteo tipo bincount).
/// En empate gana el valor más bajo.
pub fn majority_flag<I>(flags: I) -> Result<u64, WindowingError>
where
    I: IntoIterator<Item = f32>,
{
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for value in flags {
        // Truncado hacia cero, igual que un cast a entero
        let as_int = value as i64;
        if as_int < 0 {
            return Err(WindowingError::NegativeFlag { value });
        }
        *counts.entry(as_int as u64).or_insert(0) += 1;
    }

    let mut winner = 0u64;
    let mut winner_count = 0usize;
    for (&value, &count) in &counts {
        if count > winner_count {
            winner = value;
            winner_count = count;
        }
    }
    Ok(winner)
}

/// 0 si la mayoría de la última columna es "sin movimiento", si no `class_id`
pub fn extract_label(window: &Window, class_id: usize) -> Result<usize, WindowingError> {
    if window.features() == 0 {
        return Err(WindowingError::MissingLabelColumn);
    }
    let majority = majority_flag(window.column(window.features() - 1))?;
    Ok(if majority == 0 { 0 } else { class_id })
}

/// Etiqueta cada ventana y le quita la columna de marca
pub fn label_windows(
    windows: Vec<Window>,
    class_id: usize,
) -> Result<(Vec<Window>, Vec<usize>), WindowingError> {
    let mut features = Vec::with_capacity(windows.len());
    let mut labels = Vec::with_capacity(windows.len());

    for window in &windows {
        labels.push(extract_label(window, class_id)?);
        features.push(window.without_last_column());
    }

    Ok((features, labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_with_flags(flags: &[f32], features: usize) -> SampleMatrix {
        let mut m = SampleMatrix::new(features + 1);
        for (i, &flag) in flags.iter().enumerate() {
            let mut row = vec![i as f32; features];
            row.push(flag);
            m.push_row(&row);
        }
        m
    }

    #[test]
    fn test_chunk_drops_remainder() {
        let m = matrix_with_flags(&[0.0; 120], 6);
        let windows = chunk(&m, 50);
        assert_eq!(windows.len(), 2);
        for w in &windows {
            assert_eq!(w.timesteps(), 50);
            assert_eq!(w.features(), 7);
        }
        // La segunda ventana empieza en la fila 50
        assert_eq!(windows[1].row(0)[0], 50.0);
        assert_eq!(windows[1].row(49)[0], 99.0);
    }

    #[test]
    fn test_chunk_counts_for_many_sizes() {
        for rows in [0usize, 1, 49, 50, 51, 99, 100, 173] {
            let m = matrix_with_flags(&vec![0.0; rows], 2);
            assert_eq!(chunk(&m, 50).len(), rows / 50, "rows = {}", rows);
        }
        let m = matrix_with_flags(&[0.0; 10], 2);
        assert!(chunk(&m, 0).is_empty());
    }

    #[test]
    fn test_all_zero_flags_give_class_zero() {
        let m = matrix_with_flags(&[0.0; 50], 6);
        let window = &chunk(&m, 50)[0];
        assert_eq!(extract_label(window, 2).unwrap(), 0);
        assert_eq!(extract_label(window, 1).unwrap(), 0);
    }

    #[test]
    fn test_minority_motion_is_class_zero() {
        let mut flags = vec![0.0; 49];
        flags.push(1.0);
        let m = matrix_with_flags(&flags, 6);
        let window = &chunk(&m, 50)[0];
        assert_eq!(extract_label(window, 2).unwrap(), 0);
    }

    #[test]
    fn test_majority_motion_takes_class_id() {
        let mut flags = vec![1.0; 49];
        flags.push(0.0);
        let m = matrix_with_flags(&flags, 6);
        let window = &chunk(&m, 50)[0];
        assert_eq!(extract_label(window, 2).unwrap(), 2);
    }

    #[test]
    fn test_tie_goes_to_lowest_value() {
        let flags = [0.0, 1.0, 0.0, 1.0];
        assert_eq!(majority_flag(flags).unwrap(), 0);
        let flags = [2.0, 1.0, 2.0, 1.0];
        assert_eq!(majority_flag(flags).unwrap(), 1);
        assert_eq!(majority_flag(Vec::<f32>::new()).unwrap(), 0);
    }

    #[test]
    fn test_negative_flag_is_rejected() {
        let err = majority_flag([0.0, -1.0]).unwrap_err();
        assert_eq!(err, WindowingError::NegativeFlag { value: -1.0 });
        // Se trunca hacia cero como un cast entero
        assert_eq!(majority_flag([-0.5, 1.0, 0.2]).unwrap(), 0);
    }

    #[test]
    fn test_label_windows_strips_flag_column() {
        let m = matrix_with_flags(&[1.0; 100], 6);
        let (windows, labels) = label_windows(chunk(&m, 50), 1).unwrap();
        assert_eq!(labels, vec![1, 1]);
        assert!(windows.iter().all(|w| w.features() == 6 && w.timesteps() == 50));
    }
}
