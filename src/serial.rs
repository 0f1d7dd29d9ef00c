//! Lectura de líneas ASCII del puerto serie: 12 floats separados por comas
//! por línea, sin framing ni checksum.

use std::io::{self, BufRead, BufReader};
use std::thread;
use std::time::Duration;

use log::{info, warn};
use serialport::SerialPort;
use thiserror::Error;

use crate::types::{SensorReading, SENSOR_CHANNELS};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
/// La placa se reinicia al abrir el puerto
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Could not open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Non-numeric token '{token}' in line '{line}'")]
    InvalidToken { token: String, line: String },

    #[error("Line is not valid UTF-8")]
    InvalidUtf8,
}

/// Resultado de interpretar una línea
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Reading(SensorReading),
    Empty,
    WrongFieldCount(usize),
}

/// Interpreta una línea. Primero se convierten todos los tokens (un token no
/// numérico es corrupción del stream) y después se comprueba su número.
pub fn parse_line(line: &str) -> Result<ParsedLine, IngestError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ParsedLine::Empty);
    }

    let mut values = Vec::with_capacity(SENSOR_CHANNELS);
    for token in line.split(',') {
        let value: f32 = token.trim().parse().map_err(|_| IngestError::InvalidToken {
            token: token.to_string(),
            line: line.to_string(),
        })?;
        values.push(value);
    }

    if values.len() != SENSOR_CHANNELS {
        return Ok(ParsedLine::WrongFieldCount(values.len()));
    }

    let mut reading: SensorReading = [0.0; SENSOR_CHANNELS];
    reading.copy_from_slice(&values);
    Ok(ParsedLine::Reading(reading))
}

/// Evento de lectura del stream
#[derive(Debug, Clone, PartialEq)]
pub enum ReadEvent {
    Reading(SensorReading),
    /// Venció el timeout de lectura sin una línea completa
    Idle,
    Eof,
}

/// Fuente de lecturas sobre cualquier BufRead (puerto serie, archivo, memoria)
pub struct LineSource<R> {
    reader: R,
    buf: Vec<u8>,
    skipped: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
            skipped: 0,
        }
    }

    /// Líneas descartadas por número de campos incorrecto
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Lee hasta obtener una lectura válida, un timeout o el fin del stream.
    /// Una línea parcial sobrevive al timeout y se completa en la siguiente llamada.
    pub fn next_event(&mut self) -> Result<ReadEvent, IngestError> {
        loop {
            let eof = match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => true,
                Ok(_) => false,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    return Ok(ReadEvent::Idle);
                }
                Err(e) => return Err(e.into()),
            };

            if eof && self.buf.is_empty() {
                return Ok(ReadEvent::Eof);
            }

            let line = std::mem::take(&mut self.buf);
            let text = std::str::from_utf8(&line).map_err(|_| IngestError::InvalidUtf8)?;

            match parse_line(text)? {
                ParsedLine::Reading(reading) => return Ok(ReadEvent::Reading(reading)),
                ParsedLine::Empty => {}
                ParsedLine::WrongFieldCount(n) => {
                    self.skipped += 1;
                    warn!(
                        "⚠️  Línea descartada: {} campos (se esperaban {}): {}",
                        n,
                        SENSOR_CHANNELS,
                        text.trim()
                    );
                }
            }

            if eof {
                return Ok(ReadEvent::Eof);
            }
        }
    }
}

/// Configuración de apertura del puerto
#[derive(Debug, Clone)]
pub struct PortSettings {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Abre el puerto serie y espera a que la placa arranque
pub fn open_port(
    settings: &PortSettings,
) -> Result<LineSource<BufReader<Box<dyn SerialPort>>>, IngestError> {
    let port = serialport::new(settings.port.as_str(), settings.baud_rate)
        .timeout(settings.timeout)
        .open()
        .map_err(|source| IngestError::Open {
            port: settings.port.clone(),
            source,
        })?;

    thread::sleep(settings.settle_delay);
    info!(
        "📡 Conectado a {} @ {} baud",
        settings.port, settings.baud_rate
    );

    Ok(LineSource::new(BufReader::new(port)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn line_of(n: usize) -> String {
        (0..n).map(|i| format!("{}.5", i)).collect::<Vec<_>>().join(",")
    }

    #[test]
    fn test_parse_valid_line() {
        match parse_line(&format!(" {}\r\n", line_of(12))).unwrap() {
            ParsedLine::Reading(r) => {
                assert_eq!(r[0], 0.5);
                assert_eq!(r[11], 11.5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_wrong_count_and_empty() {
        assert_eq!(parse_line("").unwrap(), ParsedLine::Empty);
        assert_eq!(parse_line("  \r\n").unwrap(), ParsedLine::Empty);
        assert_eq!(
            parse_line(&line_of(11)).unwrap(),
            ParsedLine::WrongFieldCount(11)
        );
        assert_eq!(
            parse_line(&line_of(13)).unwrap(),
            ParsedLine::WrongFieldCount(13)
        );
    }

    #[test]
    fn test_parse_non_numeric_aborts() {
        let err = parse_line("1.0,2.0,abc").unwrap_err();
        assert!(matches!(err, IngestError::InvalidToken { ref token, .. } if token == "abc"));
        // Aunque el número de campos también sea incorrecto
        assert!(parse_line("1.0,,3.0").is_err());
    }

    #[test]
    fn test_source_skips_bad_counts() {
        let input = format!("{}\n\n{}\n{}", line_of(12), line_of(3), line_of(12));
        let mut source = LineSource::new(Cursor::new(input.into_bytes()));

        assert!(matches!(source.next_event().unwrap(), ReadEvent::Reading(_)));
        // La última línea no tiene salto final y aun así se entrega
        assert!(matches!(source.next_event().unwrap(), ReadEvent::Reading(_)));
        assert_eq!(source.next_event().unwrap(), ReadEvent::Eof);
        assert_eq!(source.skipped(), 1);
    }

    #[test]
    fn test_source_stops_on_corruption() {
        let input = format!("{}\n1,2,zz\n{}\n", line_of(12), line_of(12));
        let mut source = LineSource::new(Cursor::new(input.into_bytes()));
        assert!(matches!(source.next_event().unwrap(), ReadEvent::Reading(_)));
        assert!(matches!(
            source.next_event(),
            Err(IngestError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_source_rejects_invalid_utf8() {
        let mut source = LineSource::new(Cursor::new(vec![0xff, 0xfe, b'\n']));
        assert!(matches!(source.next_event(), Err(IngestError::InvalidUtf8)));
    }

    /// Lector que devuelve un timeout a mitad de línea
    struct Stutter {
        chunks: Vec<io::Result<Vec<u8>>>,
    }

    impl Read for Stutter {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Ok(bytes) => {
                    out[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(e) => Err(e),
            }
        }
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let line = format!("{}\n", line_of(12));
        let (head, tail) = line.split_at(10);
        let reader = Stutter {
            chunks: vec![
                Ok(head.as_bytes().to_vec()),
                Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
                Ok(tail.as_bytes().to_vec()),
            ],
        };
        let mut source = LineSource::new(BufReader::new(reader));

        assert_eq!(source.next_event().unwrap(), ReadEvent::Idle);
        match source.next_event().unwrap() {
            ReadEvent::Reading(r) => assert_eq!(r[11], 11.5),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(source.next_event().unwrap(), ReadEvent::Eof);
    }
}
