use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::result;

/// StatusCode describes the ways a read against a table can fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusCode {
    NotFound,
    Corruption,
    IO,
    Decompression,
    ReadOnly,
}

/// Status pairs a `StatusCode` with a human-readable message. It is the
/// error type used throughout this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, msg: &str) -> Status {
        Status {
            code,
            message: msg.to_string(),
        }
    }

    pub fn corruption(msg: impl Into<String>) -> Status {
        Status {
            code: StatusCode::Corruption,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Status {
        Status {
            code: StatusCode::NotFound,
            message: msg.into(),
        }
    }

    pub fn read_only() -> Status {
        Status {
            code: StatusCode::ReadOnly,
            message: "table is read-only".to_string(),
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for Status {}

pub type Result<T> = result::Result<T, Status>;

impl From<io::Error> for Status {
    fn from(e: io::Error) -> Status {
        let code = match e.kind() {
            io::ErrorKind::NotFound => StatusCode::NotFound,
            io::ErrorKind::UnexpectedEof => StatusCode::Corruption,
            _ => StatusCode::IO,
        };
        Status::new(code, &e.to_string())
    }
}

impl From<snap::Error> for Status {
    fn from(e: snap::Error) -> Status {
        Status::new(StatusCode::Decompression, &e.to_string())
    }
}
