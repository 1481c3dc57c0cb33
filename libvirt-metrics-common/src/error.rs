use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to connect to hypervisor: {0}")]
    Connection(String),

    #[error("domain query failed: {0}")]
    Domain(String),

    #[error("invalid domain xml: {0}")]
    Xml(String),

    #[error("xpath {path:?} for label {label}: {reason}")]
    XPath {
        label: String,
        path: String,
        reason: String,
    },

    #[error("invalid configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
