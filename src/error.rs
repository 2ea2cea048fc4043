//! Module `error` define the error types used across this package.
//!
//! Every failure path carries a `prefix`, pointing to the file and line
//! where the error was detected, and a human readable message. Use the
//! [err_at] macro to construct them.

use std::{error, fmt, result};

/// Short form to compose Error values.
///
/// Macro variants:
///
/// ```ignore
/// err_at!(Corrupt, msg: "declared length {} actual {}", a, b);
/// err_at!(IOError, fd.read(&mut buf));
/// err_at!(IOError, fd.read(&mut buf), "reading record page");
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err($crate::Error::$v(prefix, format!($($arg),+)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(prefix, format!("{}", err)))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                let msg = format!($($arg),+);
                Err($crate::Error::$v(prefix, format!("{} {}", err, msg)))
            }
        }
    }};
}

/// Error variants that can be returned by this package's API.
///
/// Each variant carries a prefix, typically identifying the error location.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Underlying storage backend failed.
    IOError(String, String),
    /// Declared length mismatch, content-hash mismatch, inconsistent
    /// sidecar or an unexpected page variant.
    Corrupt(String, String),
    /// Lookup missed where the caller expected a hit.
    KeyNotFound(String, String),
    /// Revision or key outside the permitted range.
    OutOfRange(String, String),
    /// Timed out waiting for the per-resource write permit.
    WriteLockHeld(String, String),
    /// Revision tracker slots are saturated.
    TooManyReaders(String, String),
    /// Cursor or transaction used after close/commit/abort.
    InvalidState(String, String),
    /// Operation not supported for the node kind at hand.
    UnsupportedOp(String, String),
    /// Bad path expression supplied to an index filter.
    IndexPath(String, String),
    /// Numeric conversion failure.
    FailConvert(String, String),
    /// CBOR encoding/decoding failure for metadata blobs.
    FailCbor(String, String),
    /// Invariant violation, call the programmer.
    Fatal(String, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        use Error::*;

        match self {
            IOError(p, m) => write!(f, "IOError:{} {}", p, m),
            Corrupt(p, m) => write!(f, "Corrupt:{} {}", p, m),
            KeyNotFound(p, m) => write!(f, "KeyNotFound:{} {}", p, m),
            OutOfRange(p, m) => write!(f, "OutOfRange:{} {}", p, m),
            WriteLockHeld(p, m) => write!(f, "WriteLockHeld:{} {}", p, m),
            TooManyReaders(p, m) => write!(f, "TooManyReaders:{} {}", p, m),
            InvalidState(p, m) => write!(f, "InvalidState:{} {}", p, m),
            UnsupportedOp(p, m) => write!(f, "UnsupportedOp:{} {}", p, m),
            IndexPath(p, m) => write!(f, "IndexPath:{} {}", p, m),
            FailConvert(p, m) => write!(f, "FailConvert:{} {}", p, m),
            FailCbor(p, m) => write!(f, "FailCbor:{} {}", p, m),
            Fatal(p, m) => write!(f, "Fatal:{} {}", p, m),
        }
    }
}

impl error::Error for Error {}
