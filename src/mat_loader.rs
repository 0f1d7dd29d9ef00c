use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use matfile::{MatFile, NumericData};

use crate::types::{SampleMatrix, MAT_COLUMNS};

/// Variable con la señal continua (accel.X..gyro.Z + marca)
pub const CONTINUOUS_VARIABLE: &str = "continuous_dataset";

/// Carga la matriz `continuous_dataset` (N x 7) de un archivo .mat
pub fn load_samples_from_mat(path: impl AsRef<Path>) -> Result<SampleMatrix> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("No se pudo abrir el .mat {:?}", path))?;
    let mat = MatFile::parse(BufReader::new(file))
        .map_err(|e| anyhow!("No se pudo leer el .mat {:?}: {}", path, e))?;

    let array = mat
        .find_by_name(CONTINUOUS_VARIABLE)
        .ok_or_else(|| anyhow!("El .mat {:?} no contiene '{}'", path, CONTINUOUS_VARIABLE))?;

    let size = array.size();
    ensure!(
        size.len() == 2,
        "'{}' debe ser 2-D (dimensiones {:?})",
        CONTINUOUS_VARIABLE,
        size
    );
    let (rows, cols) = (size[0], size[1]);
    ensure!(
        cols == MAT_COLUMNS,
        "'{}' debe tener {} columnas (tiene {})",
        CONTINUOUS_VARIABLE,
        MAT_COLUMNS,
        cols
    );

    let values = numeric_to_f32(array.data())?;
    column_major_to_rows(&values, rows, cols)
}

fn numeric_to_f32(data: &NumericData) -> Result<Vec<f32>> {
    macro_rules! convert {
        ($real:expr) => {
            $real.iter().map(|&v| v as f32).collect()
        };
    }

    let values: Vec<f32> = match data {
        NumericData::Double { real, .. } => convert!(real),
        NumericData::Single { real, .. } => real.clone(),
        NumericData::Int8 { real, .. } => convert!(real),
        NumericData::UInt8 { real, .. } => convert!(real),
        NumericData::Int16 { real, .. } => convert!(real),
        NumericData::UInt16 { real, .. } => convert!(real),
        NumericData::Int32 { real, .. } => convert!(real),
        NumericData::UInt32 { real, .. } => convert!(real),
        NumericData::Int64 { real, .. } => convert!(real),
        NumericData::UInt64 { real, .. } => convert!(real),
        #[allow(unreachable_patterns)]
        _ => bail!("Tipo numérico no soportado en '{}'", CONTINUOUS_VARIABLE),
    };
    Ok(values)
}

/// MATLAB guarda por columnas; aquí se reordena a fila-mayor
pub fn column_major_to_rows(values: &[f32], rows: usize, cols: usize) -> Result<SampleMatrix> {
    if values.len() != rows * cols {
        bail!(
            "Se esperaban {} valores ({} x {}), hay {}",
            rows * cols,
            rows,
            cols,
            values.len()
        );
    }

    let mut data = Vec::with_capacity(values.len());
    for r in 0..rows {
        for c in 0..cols {
            data.push(values[c * rows + r]);
        }
    }

    SampleMatrix::from_vec(data, cols).ok_or_else(|| anyhow!("Matriz vacía de {} columnas", cols))
}

/// Archivo MAT v5 sin comprimir con una única matriz de doubles
#[cfg(test)]
pub(crate) fn encode_mat_v5(
    name: &str,
    rows: usize,
    cols: usize,
    column_major: &[f64],
) -> Vec<u8> {
    fn element(data_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 16);
        out.extend_from_slice(&data_type.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        while out.len() % 8 != 0 {
            out.push(0);
        }
        out
    }

    // miUINT32 flags (mxDOUBLE_CLASS), miINT32 dims, miINT8 nombre, miDOUBLE datos
    let mut matrix = Vec::new();
    let flags: Vec<u8> = [6u32, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
    matrix.extend(element(6, &flags));
    let dims: Vec<u8> = [rows as i32, cols as i32]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    matrix.extend(element(5, &dims));
    matrix.extend(element(1, name.as_bytes()));
    let real: Vec<u8> = column_major.iter().flat_map(|v| v.to_le_bytes()).collect();
    matrix.extend(element(9, &real));

    let mut file = vec![b' '; 116];
    let text = b"MATLAB 5.0 MAT-file, ippon";
    file[..text.len()].copy_from_slice(text);
    file.extend_from_slice(&[0u8; 8]);
    file.extend_from_slice(&0x0100u16.to_le_bytes());
    file.extend_from_slice(b"IM");
    file.extend(element(14, &matrix));
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_mat(file: &str, name: &str, rows: usize, cols: usize) -> PathBuf {
        // valor(r, c) = r * 10 + c, guardado por columnas
        let values: Vec<f64> = (0..cols)
            .flat_map(|c| (0..rows).map(move |r| (r * 10 + c) as f64))
            .collect();
        let path = std::env::temp_dir().join(format!(
            "ippon_mat_{}_{}.mat",
            std::process::id(),
            file
        ));
        fs::write(&path, encode_mat_v5(name, rows, cols, &values)).unwrap();
        path
    }

    #[test]
    fn test_load_continuous_dataset() {
        let path = write_mat("ok", CONTINUOUS_VARIABLE, 3, MAT_COLUMNS);
        let m = load_samples_from_mat(&path).unwrap();

        assert_eq!(m.rows(), 3);
        assert_eq!(m.columns(), 7);
        assert_eq!(m.row(0), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m.row(2), &[20.0, 21.0, 22.0, 23.0, 24.0, 25.0, 26.0]);
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_wrong_column_count() {
        let path = write_mat("cols", CONTINUOUS_VARIABLE, 4, 5);
        let err = load_samples_from_mat(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("7 columnas"));
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_variable() {
        let path = write_mat("var", "other_dataset", 2, MAT_COLUMNS);
        let err = load_samples_from_mat(&path).unwrap_err();
        assert!(format!("{:#}", err).contains(CONTINUOUS_VARIABLE));
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_column_major_reorder() {
        // [[1, 2, 3],
        //  [4, 5, 6]] guardada por columnas
        let values = [1.0, 4.0, 2.0, 5.0, 3.0, 6.0];
        let m = column_major_to_rows(&values, 2, 3).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_column_major_size_mismatch() {
        assert!(column_major_to_rows(&[1.0, 2.0, 3.0], 2, 2).is_err());
    }

    #[test]
    fn test_missing_mat_file() {
        let err = load_samples_from_mat("/nonexistent/ippon-dataset.mat").unwrap_err();
        assert!(format!("{:#}", err).contains("ippon-dataset.mat"));
    }
}
