use crate::{DateTimeOverflowError, ParseDateTimeError};
use std::fmt::{Debug, Display, Formatter};
use std::num::ParseFloatError;
use std::str::ParseBoolError;
use std::string::FromUtf8Error;
use thiserror::Error;

/// A light-weight result, mainly used while decoding terms returned by a store.
pub type ThinResult<T> = Result<T, ThinError>;

/// A thin error type that indicates an *expected* failure without any reason.
///
/// A store may hold data that does not fit the schema, for example a literal of another datatype
/// than the one declared for a property. These values are dropped while materializing documents,
/// so we do not need to store a reason.
#[derive(Clone, Copy, Debug, Default, Error, PartialEq, Eq)]
pub struct ThinError {}

impl ThinError {
    /// Creates a result with a [ThinError].
    pub fn expected<T>() -> ThinResult<T> {
        Err(ThinError::default())
    }
}

impl Display for ThinError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("An expected error occurred.")
    }
}

macro_rules! implement_from {
    ($t:ty) => {
        impl From<$t> for ThinError {
            fn from(_: $t) -> Self {
                ThinError::default()
            }
        }
    };
}

implement_from!(ParseBoolError);
implement_from!(ParseFloatError);
implement_from!(ParseDateTimeError);
implement_from!(DateTimeOverflowError);
implement_from!(FromUtf8Error);
