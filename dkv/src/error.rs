use std::fmt;

/// Result alias used across the crate.
pub type DResult<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating, merging, storing or decoding
/// versioned entities.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Wrong runtime type for an argument or attribute value.
    Type(String),
    /// Well-typed but invalid value (required attribute empty, malformed
    /// digest, out-of-range integer, ...).
    Value(String),
    /// Requested attribute or entity is not present.
    KeyNotFound(String),
    /// Attempt to merge an instance with uncommitted changes.
    Merge(String),
    /// A query referenced a model type the registry does not know.
    UnregisteredModel(String),
    /// A decoded version's stored digest disagrees with its computed digest.
    Corruption(String),
    /// Malformed serialized data.
    Parse(String),
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Type(msg) => write!(f, "Type error: {}", msg),
            Error::Value(msg) => write!(f, "Value error: {}", msg),
            Error::KeyNotFound(msg) => write!(f, "Key not found: {}", msg),
            Error::Merge(msg) => write!(f, "Merge failure: {}", msg),
            Error::UnregisteredModel(msg) => {
                write!(f, "Unregistered model: {}", msg)
            }
            Error::Corruption(msg) => write!(f, "Corruption: {}", msg),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            Error::Value("attribute age is required".to_string()).to_string(),
            "Value error: attribute age is required"
        );
        assert_eq!(
            Error::KeyNotFound("/Person/A".to_string()).to_string(),
            "Key not found: /Person/A"
        );
    }

    #[test]
    fn from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        match Error::from(err) {
            Error::Parse(_) => {}
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
