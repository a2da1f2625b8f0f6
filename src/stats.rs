use std::time::Instant;

/// Counters for commits, committed rows, and errors across the lifetime of
/// a `Loader`. Rendered on demand via [`Statistics::print`].
#[derive(Debug)]
pub struct Statistics {
    pub commits: u64,
    pub committed_rows: u64,
    pub running_commands: usize,
    pub errors: u64,
    pub copy_invoked: bool,
    first_commit_time: Option<Instant>,
    last_commit_time: Option<Instant>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            commits: 0,
            committed_rows: 0,
            running_commands: 0,
            errors: 0,
            copy_invoked: false,
            first_commit_time: None,
            last_commit_time: None,
        }
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successful commit of `rows` rows, updating timing.
    pub fn record_commit(&mut self, rows: u64) {
        let now = Instant::now();
        if self.first_commit_time.is_none() {
            self.first_commit_time = Some(now);
        }
        self.last_commit_time = Some(now);
        self.commits += 1;
        self.committed_rows += rows;
    }

    pub fn record_errors(&mut self, rows: u64) {
        self.errors += rows;
    }

    /// `PrintStats`: reports committed rows, commits, elapsed time, and an
    /// advisory to vacuum when errors occurred and none is scheduled.
    pub fn print(&self, will_vacuum: bool) {
        let elapsed = self
            .first_commit_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        log::info!(
            "{} updates in {} commits took {elapsed:.3} seconds",
            self.committed_rows,
            self.commits
        );
        if self.errors > 0 {
            log::error!("{} database errors occurred", self.errors);
            if self.copy_invoked && !will_vacuum {
                log::info!("please VACUUM your database to recover space");
            }
        } else if self.committed_rows > 0 {
            log::info!("no database error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conservation_holds_across_commits_and_errors() {
        let mut stats = Statistics::new();
        stats.record_commit(3);
        stats.record_commit(1);
        stats.record_errors(1);
        assert_eq!(stats.committed_rows + stats.errors, 5);
        assert_eq!(stats.commits, 2);
    }

    #[test]
    fn fresh_statistics_have_no_errors() {
        let stats = Statistics::new();
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.committed_rows, 0);
        assert!(!stats.copy_invoked);
    }
}
