use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Library source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Invalid library file: {0}")]
    InvalidLibrary(String),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
