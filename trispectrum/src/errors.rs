#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// Got an invalid parameter value in a function
    InvalidParameter(String),
    /// The requested maximal angular order has no matching coupling tensor
    UnsupportedMaxAngular {
        /// maximal angular order requested by the user
        max_angular: usize,
        /// largest maximal angular order with a coupling tensor
        max_supported: usize,
    },
    /// The system given to a calculator does not satisfy the expected
    /// invariants (neighbor offsets, species, distances, ...)
    InvalidSystem(String),
    /// Error while serializing/deserializing data
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidParameter(e) => write!(f, "invalid parameter: {}", e),
            Error::UnsupportedMaxAngular { max_angular, max_supported } => write!(f,
                "unsupported configuration: there is no coupling tensor for \
                max_angular={}, the largest supported value is {}",
                max_angular, max_supported
            ),
            Error::InvalidSystem(e) => write!(f, "invalid system: {}", e),
            Error::Json(e) => write!(f, "json error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidParameter(_) |
            Error::UnsupportedMaxAngular { .. } |
            Error::InvalidSystem(_) => None,
            Error::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::Json(error)
    }
}
