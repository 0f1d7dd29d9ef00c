/// Canales por muestra: [ax, ay, az, gx, gy, gz] x 2 IMUs
pub const SENSOR_CHANNELS: usize = 12;

/// Lectura cruda de los 12 canales tal como llega por el puerto serie
pub type SensorReading = [f32; SENSOR_CHANNELS];

/// Constantes del sistema
pub const DEFAULT_WINDOW_LENGTH: usize = 50;
pub const MAT_COLUMNS: usize = 7; // 6 features + columna de etiqueta

/// Cabecera de los CSV de captura (mismo formato que los de entrenamiento)
pub const CAPTURE_HEADER: [&str; SENSOR_CHANNELS + 2] = [
    "timestamp",
    "ax1",
    "ay1",
    "az1",
    "gx1",
    "gy1",
    "gz1",
    "ax2",
    "ay2",
    "az2",
    "gx2",
    "gy2",
    "gz2",
    "em_movimento",
];

/// Una muestra del par de IMUs con su marca de movimiento
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Segundos desde epoch en el momento de recepción
    pub timestamp: f64,
    pub values: SensorReading,
    pub in_motion: bool,
}

/// Matriz de muestras en orden fila-mayor: [fila * columns + columna]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleMatrix {
    data: Vec<f32>,
    columns: usize,
}

impl SampleMatrix {
    pub fn new(columns: usize) -> Self {
        Self {
            data: Vec::new(),
            columns,
        }
    }

    /// Construye la matriz desde datos planos; None si no hay filas completas
    pub fn from_vec(data: Vec<f32>, columns: usize) -> Option<Self> {
        if columns == 0 || data.len() % columns != 0 {
            return None;
        }
        Some(Self { data, columns })
    }

    /// Añade una fila. Devuelve false si el ancho no coincide.
    pub fn push_row(&mut self, row: &[f32]) -> bool {
        if row.len() != self.columns {
            return false;
        }
        self.data.extend_from_slice(row);
        true
    }

    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.data.len() / self.columns
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn row(&self, idx: usize) -> &[f32] {
        &self.data[idx * self.columns..(idx + 1) * self.columns]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Conserva las primeras `features` columnas más la última (etiqueta)
    pub fn features_with_label(&self, features: usize) -> Option<SampleMatrix> {
        if self.columns == 0 || features + 1 > self.columns {
            return None;
        }
        if features + 1 == self.columns {
            return Some(self.clone());
        }

        let mut out = SampleMatrix::new(features + 1);
        out.data.reserve(self.rows() * (features + 1));
        for r in 0..self.rows() {
            let row = self.row(r);
            out.data.extend_from_slice(&row[..features]);
            out.data.push(row[self.columns - 1]);
        }
        Some(out)
    }
}

/// Ventana de `timesteps` filas contiguas con `features` columnas, aplanada
/// en formato [t * features + f], lista para el tensor [1, T, F]
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    data: Vec<f32>,
    timesteps: usize,
    features: usize,
}

impl Window {
    pub fn new(data: Vec<f32>, timesteps: usize, features: usize) -> Option<Self> {
        if data.len() != timesteps * features {
            return None;
        }
        Some(Self {
            data,
            timesteps,
            features,
        })
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn features(&self) -> usize {
        self.features
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn row(&self, t: usize) -> &[f32] {
        &self.data[t * self.features..(t + 1) * self.features]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.features.max(1))
    }

    /// Valores de una columna a lo largo del tiempo
    pub fn column(&self, c: usize) -> impl Iterator<Item = f32> + '_ {
        self.rows().map(move |row| row[c])
    }

    /// Copia de la ventana sin la última columna
    pub fn without_last_column(&self) -> Window {
        let features = self.features.saturating_sub(1);
        let mut data = Vec::with_capacity(self.timesteps * features);
        for row in self.rows() {
            data.extend_from_slice(&row[..features]);
        }
        Window {
            data,
            timesteps: self.timesteps,
            features,
        }
    }
}
