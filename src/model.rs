use core::fmt;
use std::process::{ExitCode, Termination};

use log::error;

#[derive(Debug, Clone, PartialEq)]
pub enum BlipError {
    /// Rejected construction parameters.
    InvalidConfig(String),
    /// A buffer of `len` elements could not be reserved.
    Allocation { what: &'static str, len: usize },
    /// A push would write past the end of the accumulation buffer.
    CapacityExceeded { needed: usize, capacity: usize },
    /// A read asked for more samples than are finished.
    ReadUnderflow { requested: usize, avail: usize },
    /// A strided source or destination slice is shorter than the request.
    BufferTooShort { needed: usize, len: usize },
    InvalidStride,
    Io(String),
}

impl fmt::Display for BlipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlipError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            BlipError::Allocation { what, len } => {
                write!(f, "Failed to allocate {} ({} samples)", what, len)
            }
            BlipError::CapacityExceeded { needed, capacity } => write!(
                f,
                "Delta buffer overflow: {} samples needed, capacity is {}. Read more often.",
                needed, capacity
            ),
            BlipError::ReadUnderflow { requested, avail } => write!(
                f,
                "Read of {} samples requested but only {} available",
                requested, avail
            ),
            BlipError::BufferTooShort { needed, len } => write!(
                f,
                "Sample slice too short: need {} elements, got {}",
                needed, len
            ),
            BlipError::InvalidStride => write!(f, "Stride must be at least 1"),
            BlipError::Io(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BlipError {}

pub type BlipResult<T> = Result<T, BlipError>;

impl From<std::io::Error> for BlipError {
    fn from(err: std::io::Error) -> Self {
        BlipError::Io(err.to_string())
    }
}

// Binaries bubble up mixed error types from clap, I/O and the engine
impl From<Box<dyn std::error::Error>> for BlipError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        BlipError::Io(err.to_string())
    }
}

pub struct TermResult(pub BlipResult<()>);

impl Termination for TermResult {
    fn report(self) -> ExitCode {
        match self.0 {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                error!("{}", err);
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_numbers() {
        let e = BlipError::ReadUnderflow { requested: 9, avail: 4 };
        assert_eq!(e.to_string(), "Read of 9 samples requested but only 4 available");

        let e = BlipError::CapacityExceeded { needed: 1100, capacity: 1024 };
        assert!(e.to_string().contains("1100"));
        assert!(e.to_string().contains("1024"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let e: BlipError = io.into();
        assert_eq!(e, BlipError::Io("no such file".to_string()));
    }
}
