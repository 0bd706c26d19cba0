//! Validated name-or-id references for volumes and servers.
//!
//! Callers address platform resources by either the platform-assigned
//! identifier or the human-readable display name; the two share one string
//! domain, so the helper cannot tell them apart up front. [`ResourceRef`]
//! guarantees the one invariant resolution relies on: the reference is
//! non-empty once surrounding whitespace is trimmed. Invalid references are
//! rejected here, before any remote call is made.

use std::fmt;
use std::ops::Deref;

use thiserror::Error;

/// Raised when a reference is empty or contains only whitespace.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("reference must be a non-empty string")]
pub struct InvalidReference;

/// A non-empty, trimmed volume or server reference (name or id).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceRef(String);

impl ResourceRef {
    /// Parses a caller-supplied reference, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidReference`] when the trimmed value is empty.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, InvalidReference> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InvalidReference);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for ResourceRef {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for ResourceRef {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}
