use thiserror::Error;

/// Errors that can occur while setting up a test environment.
#[derive(Error, Debug)]
pub enum TestError {
    /// Failed to connect to the in-memory database or execute schema statements.
    #[error("database error during test setup: {0}")]
    Database(#[from] sea_orm::DbErr),
}
