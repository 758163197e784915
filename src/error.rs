//! Error types for the gtheory library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! specific variants for design parsing, data binding, the variance-component
//! solve and decision studies.

use thiserror::Error;

/// The main error type for the gtheory library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ============ Design Errors ============
    /// The design expression is malformed, ambiguous, or references an
    /// unknown facet.
    #[error("invalid design: {message}")]
    InvalidDesign {
        /// Description of what is invalid.
        message: String,
    },

    /// The design has more facets than effect enumeration supports.
    #[error("design has {facets} facets, at most {max} are supported")]
    UnsupportedDesign {
        /// Number of facets in the expression.
        facets: usize,
        /// Maximum supported number of facets.
        max: usize,
    },

    // ============ Data Errors ============
    /// The observation table is inconsistent with itself or with the design.
    #[error("invalid data: {message}")]
    InvalidData {
        /// Description of what is invalid.
        message: String,
    },

    /// A decision study was requested on a G study with missing observations.
    #[error("incomplete data: {message}")]
    IncompleteData {
        /// Description of the missing cells.
        message: String,
    },

    // ============ Estimation Errors ============
    /// The coefficient matrix is singular, so the variance components are
    /// not identified.
    #[error("singular design: {message}")]
    SingularDesign {
        /// Description of where elimination failed.
        message: String,
    },

    /// Invalid parameters passed to a coefficient or decision-study call.
    #[error("invalid parameters: {message}")]
    InvalidParams {
        /// Description of what is invalid.
        message: String,
    },
}

/// A specialized `Result` type for gtheory operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Create a new `InvalidDesign` error.
    #[must_use]
    pub fn invalid_design(message: impl Into<String>) -> Self {
        Self::InvalidDesign {
            message: message.into(),
        }
    }

    /// Create a new `InvalidData` error.
    #[must_use]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new `IncompleteData` error.
    #[must_use]
    pub fn incomplete_data(message: impl Into<String>) -> Self {
        Self::IncompleteData {
            message: message.into(),
        }
    }

    /// Create a new `SingularDesign` error.
    #[must_use]
    pub fn singular_design(message: impl Into<String>) -> Self {
        Self::SingularDesign {
            message: message.into(),
        }
    }

    /// Create a new `InvalidParams` error.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }
}
