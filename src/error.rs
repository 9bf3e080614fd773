use std::error::Error;
use std::fmt::Display;

use crate::decoder::SoundCategory;

/// The reasons a play or volume request can be rejected.
///
/// These are ordinary data-driven conditions, not bugs: the boolean-returning
/// engine operations map all of them to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayRequestError {
    /// The sound id is out of range for its category.
    InvalidId {
        /// The category the id was requested for.
        category: SoundCategory,
        /// The rejected id.
        id: u16,
    },
    /// The raw sound data was empty.
    EmptyData,
    /// A volume outside of `0.0..=1.0` was requested.
    InvalidVolume,
    /// The command queue was full and the request was dropped.
    QueueFull,
}

impl Display for PlayRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayRequestError::InvalidId { category, id } => {
                write!(f, "sound id {id} is out of range for category {category:?}")
            }
            PlayRequestError::EmptyData => f.write_str("the raw sound data is empty"),
            PlayRequestError::InvalidVolume => f.write_str("volumes must be between 0.0 and 1.0"),
            PlayRequestError::QueueFull => f.write_str("the command queue is full, the request was dropped"),
        }
    }
}

impl Error for PlayRequestError {}
