use crate::config::Config;
use crate::error::LoaderError;
use bytes::Bytes;
use futures::SinkExt;
use tokio_postgres::Client;
use tokio_postgres::NoTls;

/// Error from a single `COPY` attempt. Wraps the driver error as a string
/// so the statement-level failure path (`Recovery`, `Loader`) can be
/// exercised against a fake in tests without constructing a real
/// `tokio_postgres::Error`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CopyError(String);

impl From<tokio_postgres::Error> for CopyError {
    fn from(error: tokio_postgres::Error) -> Self {
        CopyError(error.to_string())
    }
}

impl CopyError {
    /// Builds a `CopyError` directly from a message, for fakes that need to
    /// report a `COPY` failure without a real `tokio_postgres::Error` (which
    /// has no public constructor usable outside its crate).
    #[cfg(test)]
    pub fn from_message(message: impl Into<String>) -> Self {
        CopyError(message.into())
    }
}

/// Driver abstraction satisfied by anything that can attempt a `COPY FROM
/// STDIN` and report statement-level failure without poisoning the
/// session — i.e. the server must continue accepting statements after one
/// failed `COPY`, which holds for a real Postgres connection and is
/// reproduced by the in-memory fake used in tests.
#[async_trait::async_trait]
pub trait CopySink: Send + Sync {
    async fn copy_from(&self, target: &str, data: &[u8], delimiter: u8) -> Result<u64, CopyError>;
}

/// Owns one session to the target database.
///
/// Only one in-flight `COPY` is permitted per `Connection` — this type is
/// not safe for concurrent use, matching spec.md §5. Multiple tables may be
/// loaded concurrently by running independent `Connection`s.
pub struct Connection {
    config: Config,
    client: Client,
}

impl Connection {
    /// Close any existing session, open a new one, and apply session
    /// settings in order: `client_encoding`, then `datestyle` and
    /// `lc_messages` if configured. Session-setting failures are fatal.
    pub async fn reset(config: Config) -> Result<Self, LoaderError> {
        let conn_string = format!(
            "host={} port={} dbname={} user={}{}",
            config.host,
            config.port,
            config.database,
            config.user,
            config
                .password
                .as_ref()
                .map(|p| format!(" password={}", p))
                .unwrap_or_default(),
        );
        let (client, connection) = tokio_postgres::connect(&conn_string, NoTls)
            .await
            .map_err(|source| LoaderError::Session {
                message: "failed to open database session".to_string(),
                source,
            })?;
        tokio::spawn(async move {
            if let Err(error) = connection {
                log::error!("postgres connection task failed: {error}");
            }
        });

        client
            .execute(
                "SET SESSION client_encoding TO $1",
                &[&config.client_encoding],
            )
            .await
            .map_err(|source| LoaderError::Session {
                message: "failed to set client_encoding".to_string(),
                source,
            })?;
        if let Some(datestyle) = &config.datestyle {
            client
                .execute("SET SESSION datestyle TO $1", &[datestyle])
                .await
                .map_err(|source| LoaderError::Session {
                    message: "failed to set datestyle".to_string(),
                    source,
                })?;
        }
        if let Some(lc_messages) = &config.lc_messages {
            client
                .execute("SET SESSION lc_messages TO $1", &[lc_messages])
                .await
                .map_err(|source| LoaderError::Session {
                    message: "failed to set lc_messages".to_string(),
                    source,
                })?;
        }

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_null(&self, value: &str) -> bool {
        self.config.is_null(value)
    }

    pub fn is_empty(&self, value: &str) -> bool {
        self.config.is_empty(value)
    }

    async fn maintenance(&self, sql: String, verb: &str, table: &str) -> Result<(), LoaderError> {
        if self.config.dry_run {
            log::info!("dry-run: skipping {verb} on {table}");
            return Ok(());
        }
        log::info!("{sql}");
        self.client
            .execute(&sql, &[])
            .await
            .map_err(|source| LoaderError::Maintenance {
                message: format!("couldn't {verb} table {table}"),
                source,
            })?;
        Ok(())
    }

    pub async fn truncate(&self, table: &str) -> Result<(), LoaderError> {
        self.maintenance(format!("TRUNCATE TABLE {table};"), "TRUNCATE", table)
            .await
    }

    pub async fn vacuum(&self, table: &str) -> Result<(), LoaderError> {
        self.maintenance(format!("VACUUM ANALYZE {table};"), "VACUUM", table)
            .await
    }

    pub async fn disable_triggers(&self, table: &str) -> Result<(), LoaderError> {
        self.maintenance(
            format!("ALTER TABLE {table} DISABLE TRIGGER ALL;"),
            "DISABLE TRIGGER ALL",
            table,
        )
        .await
    }

    pub async fn enable_triggers(&self, table: &str) -> Result<(), LoaderError> {
        self.maintenance(
            format!("ALTER TABLE {table} ENABLE TRIGGER ALL;"),
            "ENABLE TRIGGER ALL",
            table,
        )
        .await
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

/// Renders `sep` as a single-quoted SQL string literal suitable for a
/// `COPY ... WITH (DELIMITER '<sep>')` clause, doubling an embedded quote.
fn delimiter_literal(sep: u8) -> String {
    let ch = sep as char;
    if ch == '\'' {
        "''''".to_string()
    } else {
        format!("'{ch}'")
    }
}

#[async_trait::async_trait]
impl CopySink for Connection {
    /// Streams `data` (already in `COPY` text format) into `target` via
    /// `COPY <target> FROM STDIN WITH (DELIMITER ...)`, where `target` is
    /// the fully composed `table (col1, ..., coln)` expression the caller
    /// built once per batch and `delimiter` is the configured `copy_sep`
    /// byte the encoder used to produce `data`.
    async fn copy_from(&self, target: &str, data: &[u8], delimiter: u8) -> Result<u64, CopyError> {
        let sql = format!(
            "COPY {target} FROM STDIN WITH (DELIMITER {})",
            delimiter_literal(delimiter)
        );
        let sink = self.client.copy_in(&sql).await?;
        futures::pin_mut!(sink);
        sink.send(Bytes::copy_from_slice(data)).await?;
        Ok(sink.finish().await?)
    }
}
