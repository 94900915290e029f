use hotpatch_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("not a patch container: {0}")]
    NotAPatch(String),

    #[error("entry not found in patch: {0}")]
    MissingEntry(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl PackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidManifest(_) => ErrorKind::Unknown,
            Self::NotAPatch(_) => ErrorKind::InvalidInputFormat,
            Self::MissingEntry(_) | Self::Serialization(_) => ErrorKind::MetadataParseFailed,
            Self::Zip(zip::result::ZipError::Io(e)) | Self::Io(e) => {
                ErrorKind::from_io(e, ErrorKind::FileWriteFailed)
            }
            Self::Zip(_) => ErrorKind::FileWriteFailed,
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;
