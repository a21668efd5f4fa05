use thiserror::Error;

use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    /// A bill-store rejection. Its message ("Erreur 404" / "Erreur 500")
    /// is rendered verbatim.
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("Too Many Requests")]
    TooManyRequests,
    #[error("Internal Server Error")]
    Internal,
}
