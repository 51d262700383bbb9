//! Engine error types.

use thiserror::Error;

/// Errors from the search constructor family. These are programming
/// errors in the caller; a search is never started with a bad
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

#[cfg(test)]
mod tests {
    use super::SearchError;

    #[test]
    fn message_names_the_argument() {
        let err = SearchError::InvalidArgument("depth must be between 1 and 64");
        assert_eq!(
            err.to_string(),
            "invalid argument: depth must be between 1 and 64"
        );
    }
}
