use crate::types::{Window, DEFAULT_WINDOW_LENGTH, SENSOR_CHANNELS};

/// Buffer de ventanas contiguas sin solapamiento: al completar `timesteps`
/// muestras entrega la ventana y vuelve a empezar vacío
pub struct GestureBuffer {
    buffer: Vec<f32>,
    timesteps: usize,
    features: usize,
    filled: usize,
}

impl GestureBuffer {
    /// Crea un buffer que conserva los primeros `features` canales de cada lectura
    pub fn new(timesteps: usize, features: usize) -> Self {
        let features = features.min(SENSOR_CHANNELS);
        Self {
            buffer: Vec::with_capacity(timesteps * features),
            timesteps,
            features,
            filled: 0,
        }
    }

    /// Añade una lectura. Si la ventana se completa la devuelve y reinicia.
    pub fn push(&mut self, reading: &[f32]) -> Option<Window> {
        let take = self.features.min(reading.len());
        self.buffer.extend_from_slice(&reading[..take]);
        // Lecturas cortas se completan con ceros para mantener el ancho
        self.buffer
            .extend(std::iter::repeat(0.0).take(self.features - take));
        self.filled += 1;

        if self.filled < self.timesteps {
            return None;
        }

        let data = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.timesteps * self.features),
        );
        self.filled = 0;
        Window::new(data, self.timesteps, self.features)
    }

    /// Obtiene el número de muestras acumuladas
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn features(&self) -> usize {
        self.features
    }

    /// Limpia el buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.filled = 0;
    }
}

impl Default for GestureBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_LENGTH, SENSOR_CHANNELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(v: f32) -> [f32; SENSOR_CHANNELS] {
        let mut r = [0.0; SENSOR_CHANNELS];
        for (c, x) in r.iter_mut().enumerate() {
            *x = v * 100.0 + c as f32;
        }
        r
    }

    #[test]
    fn test_buffer_empty_initially() {
        let buffer = GestureBuffer::default();
        assert!(buffer.is_empty());
        assert_eq!(buffer.timesteps(), 50);
        assert_eq!(buffer.features(), SENSOR_CHANNELS);
    }

    #[test]
    fn test_window_after_timesteps_frames() {
        let mut buffer = GestureBuffer::new(50, SENSOR_CHANNELS);
        for i in 0..49 {
            assert!(buffer.push(&reading(i as f32)).is_none());
        }
        let window = buffer.push(&reading(49.0)).unwrap();
        assert_eq!(window.timesteps(), 50);
        assert_eq!(window.features(), SENSOR_CHANNELS);
        assert_eq!(window.row(0)[0], 0.0);
        assert_eq!(window.row(49)[0], 4900.0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_no_overlap_between_windows() {
        let mut buffer = GestureBuffer::new(10, SENSOR_CHANNELS);
        let mut windows = Vec::new();
        for i in 0..25 {
            if let Some(w) = buffer.push(&reading(i as f32)) {
                windows.push(w);
            }
        }
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].row(0)[0], 1000.0);
        assert_eq!(windows[1].row(9)[0], 1900.0);
        assert_eq!(buffer.len(), 5);

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_keeps_first_features() {
        let mut buffer = GestureBuffer::new(1, 6);
        let window = buffer.push(&reading(3.0)).unwrap();
        assert_eq!(window.features(), 6);
        assert_eq!(window.row(0), &[300.0, 301.0, 302.0, 303.0, 304.0, 305.0]);
    }
}
