use thiserror::Error;

use crate::types::Side;

/// Why a single level could not be read as `(price, quantity)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelFault {
    NotAnArray,
    TooShort(usize),
    BadPrice,
    BadQuantity,
}

impl std::fmt::Display for LevelFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelFault::NotAnArray => f.write_str("level is not an array"),
            LevelFault::TooShort(n) => write!(f, "expected at least 2 elements, got {n}"),
            LevelFault::BadPrice => f.write_str("price is not a finite number"),
            LevelFault::BadQuantity => f.write_str("quantity is not a finite number"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookError {
    /// Top-level field absent or of the wrong shape. The whole update is
    /// rejected and the stored book is left untouched.
    #[error("missing or mistyped field `{0}`")]
    MissingField(&'static str),

    /// One bad level. Dropped; the rest of the update still applies.
    #[error("malformed {side} level #{index}: {fault}")]
    MalformedLevel {
        side: Side,
        index: usize,
        fault: LevelFault,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    /// No live level on one side after skipping tombstones.
    #[error("no live {0} level in book")]
    EmptyBook(Side),

    #[error("mid price {0} is not positive")]
    DegenerateMid(f64),
}
