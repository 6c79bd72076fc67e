use thiserror::Error;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("IO error: {err}")]
    IoError {
        #[from]
        err: std::io::Error,
    },
    #[error(transparent)]
    Codec(#[from] crate::codec::CodecError),
    #[error(transparent)]
    Edit(#[from] crate::weapon::edit::EditError),
    #[error("Datatable {name} not found in any known datatable directory")]
    TableNotFound { name: String },
    #[error("Datatable has no rows: {path}")]
    MalformedTable { path: std::path::PathBuf },
    #[error("Curve table {table} has no row {row}")]
    CurveRowMissing { table: String, row: String },
    #[error("Advancements for {reference} never reach tier 15")]
    AdvancementIncomplete { reference: String },
    #[error("No {collection} found for {char_name} (tried {tried:?})")]
    MissingLinkage {
        char_name: String,
        collection: &'static str,
        tried: Vec<String>,
    },
    #[cfg(feature = "search")]
    #[error("Sqlite error: {err}")]
    Sqlite {
        #[from]
        err: rusqlite::Error,
    },
    #[cfg(feature = "search")]
    #[error("Regex error: {err}")]
    Regex {
        #[from]
        err: regex::Error,
    },
}

impl std::convert::From<std::io::Error> for Error {
    fn from(x: std::io::Error) -> Error {
        Error { kind: x.into() }
    }
}

impl std::convert::From<serde_json::Error> for Error {
    fn from(x: serde_json::Error) -> Error {
        Error { kind: x.into() }
    }
}

impl std::convert::From<crate::codec::CodecError> for Error {
    fn from(x: crate::codec::CodecError) -> Error {
        Error { kind: x.into() }
    }
}

impl std::convert::From<crate::weapon::edit::EditError> for Error {
    fn from(x: crate::weapon::edit::EditError) -> Error {
        Error { kind: x.into() }
    }
}

#[cfg(feature = "search")]
impl std::convert::From<rusqlite::Error> for Error {
    fn from(x: rusqlite::Error) -> Error {
        Error { kind: x.into() }
    }
}

#[cfg(feature = "search")]
impl std::convert::From<regex::Error> for Error {
    fn from(x: regex::Error) -> Error {
        Error { kind: x.into() }
    }
}

pub type DataResult<T> = Result<T, Error>;

pub fn failure_from_kind(kind: ErrorKind) -> Error {
    Error { kind }
}
