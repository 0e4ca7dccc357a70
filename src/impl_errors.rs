//! Implementações de traits para os enums de erro do sistema
//!
//! Este módulo existe exclusivamente para desacoplar:
//! - definição de erros (enums)
//! - implementação de traits (`Display`, `Error`, `From`)

use std::error::Error as StdError;
use std::fmt;

use crate::errors::{PipelineError, StorageError};

/* ========================================================================== */
/* Display                                                                    */
/* ========================================================================== */

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Io(err) => {
                write!(f, "[I/O] {}", err)
            }

            PipelineError::Json(err) => {
                write!(f, "[JSON] {}", err)
            }

            PipelineError::Frame(err) => {
                write!(f, "[Frame] {}", err)
            }

            PipelineError::Schema(msg) => {
                write!(f, "[Schema] {}", msg)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => {
                write!(f, "[I/O] {}", err)
            }

            StorageError::Json(err) => {
                write!(f, "[Manifesto] {}", err)
            }

            StorageError::Frame(err) => {
                write!(f, "[Frame] {}", err)
            }

            StorageError::TableExists(local) => {
                write!(f, "[Storage] tabela já existente em '{}'", local)
            }
        }
    }
}

/* ========================================================================== */
/* std::error::Error                                                          */
/* ========================================================================== */

impl StdError for PipelineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PipelineError::Io(err) => Some(err),
            PipelineError::Json(err) => Some(err),
            PipelineError::Frame(_) => None,
            PipelineError::Schema(_) => None,
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            StorageError::Json(err) => Some(err),
            StorageError::Frame(_) => None,
            StorageError::TableExists(_) => None,
        }
    }
}

/* ========================================================================== */
/* Conversions                                                                */
/* ========================================================================== */

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Json(err)
    }
}

impl From<polars::prelude::PolarsError> for PipelineError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        PipelineError::Frame(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Json(err)
    }
}

impl From<polars::prelude::PolarsError> for StorageError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        StorageError::Frame(err.to_string())
    }
}
