use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is not set.
    ///
    /// The application requires this environment variable to be defined. Check the
    /// documentation or `.env.example` file for required configuration variables.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// A server row declares a panel backend this build does not support.
    ///
    /// Surfaced as a configuration defect rather than retried: the registry only
    /// knows the fixed set of backend kinds it was built with.
    #[error("Unsupported panel kind: {0}")]
    UnsupportedPanelKind(String),
}
