// SPDX-License-Identifier: Apache-2.0
//! Error types for execution-backend interaction.

/// Errors arising from backend load, configuration, or execution.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("failed to load engine library at '{path}': {cause}")]
    LoadFailed { path: String, cause: String },

    #[error("symbol '{symbol}' not found in engine library: {cause}")]
    SymbolNotFound { symbol: String, cause: String },

    #[error("backend rejected configuration: {0}")]
    Configure(String),

    #[error("backend execution failed: {0}")]
    Execute(String),

    #[error("invalid result text from backend: {0}")]
    InvalidResult(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
