//! Crate error type.

use std::fmt;
use std::io;

/// Possible errors from this crate.
///
/// The flow state machine itself never surfaces errors this way; transport
/// and parse failures there mutate the session status and end in a recycle.
/// This type covers the queueing API and anything built on top of it.
#[derive(Debug)]
pub enum Error {
    /// A user/usage problem, such as a request method containing whitespace.
    User(String),
    /// A wrapped std::io::Error from the underlying transport.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::User(v) => write!(f, "{}", v),
            Error::Io(v) => fmt::Display::fmt(v, f),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
