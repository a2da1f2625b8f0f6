/// Fatal error taxonomy for the loader.
///
/// Recoverable conditions (a failed `COPY` batch, a rejected row, a
/// transcoding failure) are never represented here — they are folded into
/// [`crate::stats::Statistics`] and handed to the reject sink. Only
/// conditions that must unwind to the caller are typed.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("session setup failed: {message}")]
    Session {
        message: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("maintenance statement failed: {message}")]
    Maintenance {
        message: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("interrupted: {message}")]
    Interrupt { message: String },

    #[error("failed to persist COPY buffer to disk: {0}")]
    TempFile(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
