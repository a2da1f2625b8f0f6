use crate::connection::Connection;
use crate::reject::Reason;
use crate::reject::RejectSink;
use crate::stats::Statistics;

/// Which cast/escaping rule applies to a large-object payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    /// Character data; single quotes are escaped `\'` (legacy
    /// Informix-style) before binding as text.
    Clob,
    /// Binary data; bound with an explicit `::bytea` cast.
    Blob,
}

/// Row-by-row large-object update, for columns `COPY` cannot carry.
///
/// Builds `UPDATE table SET blob_column = <value> WHERE key1 = $1 AND
/// key2 = $2 ...` and executes it directly (not via `COPY`), since
/// statement-level failure here is row-local rather than batch-local.
pub struct BlobUpdater<'a> {
    table: String,
    blob_column: String,
    index_columns: Vec<String>,
    commit_every: usize,
    stats: &'a mut Statistics,
}

impl<'a> BlobUpdater<'a> {
    pub fn new(
        table: &str,
        index_columns: &[String],
        blob_column: &str,
        commit_every: usize,
        stats: &'a mut Statistics,
    ) -> Self {
        Self {
            table: table.to_string(),
            blob_column: blob_column.to_string(),
            index_columns: index_columns.to_vec(),
            commit_every,
            stats,
        }
    }

    /// Updates one row's large-object column. `row_key_values` must match
    /// `index_columns` in order. Returns `false` (and rejects the row) on
    /// statement failure; the caller's loop continues.
    pub async fn insert_blob(
        &mut self,
        connection: &Connection,
        row_key_values: &[String],
        data: &[u8],
        kind: BlobKind,
        original_input_line: &[u8],
        reject: &dyn RejectSink,
    ) -> bool {
        let where_clause = self
            .index_columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ${}", i + 2))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = match kind {
            BlobKind::Clob => format!(
                "UPDATE {} SET {} = $1 WHERE {where_clause}",
                self.table, self.blob_column
            ),
            BlobKind::Blob => format!(
                "UPDATE {} SET {} = $1::bytea WHERE {where_clause}",
                self.table, self.blob_column
            ),
        };

        let text;
        let params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = match kind {
            BlobKind::Clob => {
                text = String::from_utf8_lossy(data).replace('\'', "\\'");
                std::iter::once(&text as &(dyn tokio_postgres::types::ToSql + Sync))
                    .chain(row_key_values.iter().map(|v| v as &(dyn tokio_postgres::types::ToSql + Sync)))
                    .collect()
            }
            BlobKind::Blob => std::iter::once(&data as &(dyn tokio_postgres::types::ToSql + Sync))
                .chain(row_key_values.iter().map(|v| v as &(dyn tokio_postgres::types::ToSql + Sync)))
                .collect(),
        };

        let result = connection.client().execute(&sql, &params).await;

        match result {
            Ok(_) => {
                // The executing row counts toward the next commit window,
                // so the post-commit reset lands on 1, not 0.
                self.stats.running_commands += 1;
                if self.stats.running_commands >= self.commit_every {
                    self.stats.record_commit(self.commit_every as u64);
                    self.stats.running_commands = 1;
                }
                true
            }
            Err(error) => {
                reject.log(
                    Reason::from(format!("BLOB update error: {error}")),
                    original_input_line,
                );
                self.stats.record_errors(1);
                false
            }
        }
    }
}
