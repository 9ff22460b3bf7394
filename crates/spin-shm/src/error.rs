use std::io;

/// Failures while preparing the segment or the polling thread.
///
/// All of these happen before any loop starts; binaries log them and exit.
#[derive(Debug)]
pub enum SetupError {
    /// The segment name is not of the form `/name`.
    InvalidName(String),
    /// `shm_open` failed.
    ShmOpen { name: String, source: io::Error },
    /// Sizing the segment failed.
    Truncate(io::Error),
    /// The existing segment is too small to hold both slots.
    TooSmall { size: usize, required: usize },
    /// `mmap` failed.
    Map(io::Error),
    /// `shm_unlink` failed.
    Unlink { name: String, source: io::Error },
    /// The thread could not be pinned to `cpu`.
    Affinity { cpu: usize, source: io::Error },
}

impl SetupError {
    /// The platform lacks the feature, as opposed to the call failing.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Affinity { source, .. } if source.kind() == io::ErrorKind::Unsupported)
    }
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid shared memory name: {:?}", name),
            Self::ShmOpen { name, source } => {
                write!(f, "can't open shared memory {}: {}", name, source)
            }
            Self::Truncate(e) => write!(f, "can't size shared memory: {}", e),
            Self::TooSmall { size, required } => write!(
                f,
                "shared memory segment is {} bytes, need at least {}",
                size, required
            ),
            Self::Map(e) => write!(f, "mmap failed: {}", e),
            Self::Unlink { name, source } => {
                write!(f, "can't unlink shared memory {}: {}", name, source)
            }
            Self::Affinity { cpu, source } => write!(f, "can't pin to CPU {}: {}", cpu, source),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ShmOpen { source, .. }
            | Self::Unlink { source, .. }
            | Self::Affinity { source, .. } => Some(source),
            Self::Truncate(e) | Self::Map(e) => Some(e),
            Self::InvalidName(_) | Self::TooSmall { .. } => None,
        }
    }
}
