//! Page-level summary of remote failures

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteError {
    pub operation: String,
    pub message: String,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

/// Remote errors collected since the last clear, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorSummary {
    errors: Vec<RemoteError>,
}

impl ErrorSummary {
    pub fn push(&mut self, operation: impl Into<String>, message: impl Into<String>) {
        self.errors.push(RemoteError {
            operation: operation.into(),
            message: message.into(),
        });
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteError> {
        self.errors.iter()
    }
}
