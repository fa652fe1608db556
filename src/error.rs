//! Error taxonomy, mirroring the `Status` enum of the original C++ source
//! (`Succeed`, `Fail`, `NotFound`, `NoPrivilege`). `Succeed` is simply `Ok`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EfairError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no privilege: {0}")]
    NoPrivilege(String),

    #[error("{0}")]
    Fail(String),
}

pub type Result<T> = std::result::Result<T, EfairError>;
