//! Errors raised while building the sink set.
//!
//! Write failures are not errors of this crate: sinks report them as
//! `ContractError::SinkWrite` through the `PersistenceSink` trait.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured sink could not be opened (bad params, unwritable path)
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Two sinks configured under one name
    #[error("duplicate sink name '{name}'")]
    DuplicateSink { name: String },

    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
