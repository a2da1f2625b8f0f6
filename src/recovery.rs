use crate::buffer::BatchBuffer;
use crate::connection::CopySink;
use crate::reject::Reason;
use crate::reject::RejectSink;
use futures::future::BoxFuture;

/// Outcome of a recovery pass: sub-transactions committed, rows
/// successfully copied, rows rejected. `ok + ko` always equals the row
/// count the recovery was given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    pub commits: u64,
    pub ok: u64,
    pub ko: u64,
}

/// Binary-subdivides a failed `COPY` buffer to isolate the offending rows.
///
/// Genuinely recursive (boxed, since an `async fn` cannot call itself
/// without indirection): the first half and its entire recovered subtree
/// must finish — commits, rejects, and all — before the second half is
/// even attempted, or committed rows would land out of input order.
/// Recursion depth is bounded by `⌈log2(count)⌉` per spec.md §4.5.
pub fn recover<'a>(
    connection: &'a dyn CopySink,
    target: &'a str,
    buffer: BatchBuffer,
    count: usize,
    delimiter: u8,
    reject: &'a dyn RejectSink,
) -> BoxFuture<'a, Outcome> {
    Box::pin(async move {
        if count == 1 {
            reject.log(Reason::from("COPY error on this line"), buffer.as_bytes());
            return Outcome { commits: 0, ok: 0, ko: 1 };
        }

        let half = count / 2;
        let (a, b) = buffer.split(half);
        let mut outcome = Outcome::default();
        for (chunk, chunk_count) in [(a, half), (b, count - half)] {
            match connection.copy_from(target, chunk.as_bytes(), delimiter).await {
                Ok(_) => {
                    outcome.commits += 1;
                    outcome.ok += chunk_count as u64;
                }
                Err(error) => {
                    if chunk_count == 1 {
                        reject.log(
                            Reason::from(format!("COPY error: {error}")),
                            chunk.as_bytes(),
                        );
                        outcome.ko += 1;
                    } else {
                        let sub = recover(connection, target, chunk, chunk_count, delimiter, reject).await;
                        outcome.commits += sub.commits;
                        outcome.ok += sub.ok;
                        outcome.ko += sub.ko;
                    }
                }
            }
        }
        outcome
    })
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::Mutex;

    /// In-memory `CopySink` whose `COPY` attempts fail whenever the chunk
    /// contains one of a configured set of "bad" lines, so tests can assert
    /// exactly which rows recovery isolates. Records every successfully
    /// committed chunk's bytes, in attempt order, so tests can also assert
    /// that committed rows land in input order.
    #[derive(Default)]
    pub struct FakeConnection {
        pub bad_lines: Vec<Vec<u8>>,
        pub attempts: Mutex<u32>,
        pub committed: Mutex<Vec<u8>>,
    }

    impl FakeConnection {
        pub fn with_bad_lines(bad_lines: Vec<&[u8]>) -> Self {
            Self {
                bad_lines: bad_lines.into_iter().map(|l| l.to_vec()).collect(),
                attempts: Mutex::new(0),
                committed: Mutex::new(Vec::new()),
            }
        }

        pub fn attempts(&self) -> u32 {
            *self.attempts.lock().unwrap()
        }

        pub fn committed_bytes(&self) -> Vec<u8> {
            self.committed.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CopySink for FakeConnection {
        async fn copy_from(
            &self,
            _target: &str,
            data: &[u8],
            _delimiter: u8,
        ) -> Result<u64, crate::connection::CopyError> {
            *self.attempts.lock().unwrap() += 1;
            let contains_bad_line = self
                .bad_lines
                .iter()
                .any(|bad| data.windows(bad.len()).any(|w| w == bad.as_slice()));
            if contains_bad_line {
                Err(crate::connection::CopyError::from_message(
                    "simulated COPY failure",
                ))
            } else {
                let rows = data.iter().filter(|&&b| b == b'\n').count() as u64;
                self.committed.lock().unwrap().extend_from_slice(data);
                Ok(rows)
            }
        }
    }
}
