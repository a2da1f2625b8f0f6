use crate::buffer::BatchBuffer;
use crate::config::Config;
use crate::connection::CopyError;
use crate::connection::CopySink;
use crate::encoder;
use crate::reject::RejectSink;
use crate::recovery;
use crate::stats::Statistics;
use std::io::Write;

/// Orchestrates batching, `COPY` attempts, and recovery for one table load.
///
/// Owns the current [`BatchBuffer`] for its entire lifetime; on a failed
/// `COPY` it hands the buffer's contents to [`recovery::recover`], which
/// returns transient ownership of the split halves and is responsible for
/// closing them. Holds a `&dyn CopySink` rather than a concrete
/// `Connection` so it can be driven against the in-memory fake in tests.
pub struct Loader<'a> {
    connection: &'a dyn CopySink,
    config: &'a Config,
    table: String,
    target: String,
    buffer: Option<BatchBuffer>,
    stats: Statistics,
}

impl<'a> Loader<'a> {
    /// `target` (`table (col1, ..., coln)`) is composed once here rather
    /// than on every `add_row` call — the column list is fixed for the
    /// duration of a table load, so building it per-call would only invite
    /// the buffer-local invariant "it must not vary within a buffer" to be
    /// violated by a careless caller.
    pub fn new(connection: &'a dyn CopySink, config: &'a Config, table: &str, columns: &[String]) -> Self {
        let target = format!("{table} ({})", columns.join(", "));
        Self {
            connection,
            config,
            table: table.to_string(),
            target,
            buffer: None,
            stats: Statistics::new(),
        }
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Encodes and buffers one row, flushing first if the buffer has
    /// reached `copy_every`. Returns `false` if this row was rejected by the
    /// encoder or if a triggered flush rejected any rows; the caller's loop
    /// continues regardless.
    pub async fn add_row(
        &mut self,
        values: &[String],
        original_input_line: &[u8],
        reject: &dyn RejectSink,
    ) -> bool {
        let mut ok = self.maybe_flush(reject).await;

        let buffer = self.buffer.get_or_insert_with(BatchBuffer::new);
        let mut row = Vec::new();
        if encoder::encode_row(self.config, values, original_input_line, reject, &mut row) {
            buffer.push_row(&row);
            self.stats.running_commands += 1;
        } else {
            self.stats.record_errors(1);
            ok = false;
        }

        ok
    }

    /// Flushes any buffered rows. Call once after the last `add_row`,
    /// instead of threading an end-of-stream flag through every call.
    pub async fn finish(&mut self, reject: &dyn RejectSink) -> bool {
        match self.buffer.take() {
            Some(buffer) if !buffer.is_empty() => self.flush(buffer, reject).await,
            _ => true,
        }
    }

    async fn maybe_flush(&mut self, reject: &dyn RejectSink) -> bool {
        if self.stats.running_commands < self.config.copy_every {
            return true;
        }
        match self.buffer.take() {
            Some(buffer) if !buffer.is_empty() => self.flush(buffer, reject).await,
            _ => true,
        }
    }

    async fn flush(&mut self, buffer: BatchBuffer, reject: &dyn RejectSink) -> bool {
        let rows = buffer.rows() as u64;
        self.stats.running_commands = 0;

        if self.config.dry_run {
            log::info!("dry-run: skipping COPY of {rows} rows into {}", self.target);
            return true;
        }

        let mut already_saved = false;
        if self.config.is_verbose() {
            self.persist_buffer(&buffer, None);
            already_saved = true;
        }

        self.stats.copy_invoked = true;
        match self
            .connection
            .copy_from(&self.target, buffer.as_bytes(), self.config.copy_sep)
            .await
        {
            Ok(_) => {
                self.stats.record_commit(rows);
                log::info!("committed {rows} rows to {}", self.target);
                true
            }
            Err(error) => {
                log::warn!("COPY failed for {rows} rows into {}: {error}", self.target);
                if !already_saved {
                    self.persist_buffer(&buffer, Some(&error));
                }
                let outcome = recovery::recover(
                    self.connection,
                    &self.target,
                    buffer,
                    rows as usize,
                    self.config.copy_sep,
                    reject,
                )
                .await;
                self.stats.commits += outcome.commits;
                self.stats.committed_rows += outcome.ok;
                self.stats.record_errors(outcome.ko);
                outcome.ko == 0
            }
        }
    }

    /// Saves `buffer` to a fresh file under the system scratch directory,
    /// reported at warn level. Called proactively when the configured
    /// `client_min_messages` threshold is verbose, and mandatorily on a
    /// `COPY` failure unless already saved proactively — a buffer is never
    /// persisted twice for the same attempt. Failure to persist is itself
    /// only logged; recovery still proceeds against the in-memory buffer.
    fn persist_buffer(&self, buffer: &BatchBuffer, error: Option<&CopyError>) {
        let build = tempfile::Builder::new()
            .prefix(&format!("{}-", self.table))
            .suffix(".bulkload")
            .tempfile();
        let mut file = match build {
            Ok(file) => file,
            Err(io_error) => {
                log::warn!("failed to create temp file for COPY buffer: {io_error}");
                return;
            }
        };
        if let Err(io_error) = file.write_all(buffer.as_bytes()) {
            log::warn!("failed to persist COPY buffer: {io_error}");
            return;
        }
        match file.keep() {
            Ok((_, path)) => match error {
                Some(error) => log::warn!("COPY failed ({error}); buffer saved to {}", path.display()),
                None => log::warn!("buffer saved to {} before COPY attempt", path.display()),
            },
            Err(persist_error) => log::warn!("failed to keep temp COPY buffer: {persist_error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::fakes::FakeConnection;
    use crate::reject::FileRejectSink;

    fn config(copy_every: usize) -> Config {
        Config {
            host: "localhost".into(),
            port: 5432,
            database: "db".into(),
            user: "user".into(),
            password: None,
            copy_sep: b'\t',
            copy_every,
            commit_every: 10,
            client_encoding: "UTF8".into(),
            datestyle: None,
            lc_messages: None,
            null_marker: "\\N".into(),
            empty_marker: "".into(),
            input_encoding: None,
            dry_run: false,
            vacuum: false,
            pedantic: false,
            client_min_messages: None,
        }
    }

    fn sink() -> FileRejectSink {
        let dir = tempfile::tempdir().expect("tempdir");
        FileRejectSink::create(dir.path().join("reject.log")).expect("create sink")
    }

    #[tokio::test]
    async fn happy_path_commits_one_batch_of_three() {
        let connection = FakeConnection::default();
        let config = config(3);
        let reject = sink();
        let columns = vec!["a".to_string(), "b".to_string()];
        let mut loader = Loader::new(&connection, &config, "t", &columns);

        for (id, value) in [("1", "a"), ("2", "b"), ("3", "c")] {
            loader
                .add_row(&[id.to_string(), value.to_string()], b"", &reject)
                .await;
        }
        loader.finish(&reject).await;

        assert_eq!(loader.stats().commits, 1);
        assert_eq!(loader.stats().committed_rows, 3);
        assert_eq!(loader.stats().errors, 0);
    }

    #[tokio::test]
    async fn single_bad_row_is_rejected_and_rest_commit() {
        let connection = FakeConnection::with_bad_lines(vec![b"2\tBAD\n"]);
        let config = config(4);
        let reject = sink();
        let columns = vec!["a".to_string(), "b".to_string()];
        let mut loader = Loader::new(&connection, &config, "t", &columns);

        for (id, value) in [("1", "a"), ("2", "BAD"), ("3", "c"), ("4", "d")] {
            loader
                .add_row(&[id.to_string(), value.to_string()], b"", &reject)
                .await;
        }
        loader.finish(&reject).await;

        assert_eq!(loader.stats().committed_rows, 3);
        assert_eq!(loader.stats().errors, 1);
        let log = std::fs::read_to_string(reject.reject_log()).expect("read reject log");
        assert!(log.contains("2\tBAD"));
    }

    #[tokio::test]
    async fn conservation_holds_for_partial_final_batch() {
        let connection = FakeConnection::default();
        let config = config(10);
        let reject = sink();
        let columns = vec!["a".to_string()];
        let mut loader = Loader::new(&connection, &config, "t", &columns);

        for i in 0..7 {
            loader.add_row(&[i.to_string()], b"", &reject).await;
        }
        loader.finish(&reject).await;

        let stats = loader.stats();
        assert_eq!(stats.committed_rows + stats.errors, 7);
        assert_eq!(stats.running_commands, 0);
    }

    #[tokio::test]
    async fn dry_run_never_invokes_copy_and_leaves_counters_at_zero() {
        let connection = FakeConnection::default();
        let mut config = config(2);
        config.dry_run = true;
        let reject = sink();
        let columns = vec!["a".to_string()];
        let mut loader = Loader::new(&connection, &config, "t", &columns);

        for i in 0..4 {
            loader.add_row(&[i.to_string()], b"", &reject).await;
        }
        loader.finish(&reject).await;

        assert_eq!(connection.attempts(), 0);
        assert_eq!(loader.stats().commits, 0);
        assert_eq!(loader.stats().committed_rows, 0);
    }

    #[tokio::test]
    async fn verbose_client_min_messages_saves_buffer_before_a_failing_copy() {
        let connection = FakeConnection::with_bad_lines(vec![b"2\tBAD\n"]);
        let mut config = config(4);
        config.client_min_messages = Some("debug1".to_string());
        let reject = sink();
        let columns = vec!["a".to_string(), "b".to_string()];
        let mut loader = Loader::new(&connection, &config, "t", &columns);

        for (id, value) in [("1", "a"), ("2", "BAD"), ("3", "c"), ("4", "d")] {
            loader
                .add_row(&[id.to_string(), value.to_string()], b"", &reject)
                .await;
        }
        loader.finish(&reject).await;

        assert_eq!(loader.stats().committed_rows, 3);
        assert_eq!(loader.stats().errors, 1);
    }
}
