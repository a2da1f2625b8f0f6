use serde::Deserialize;

/// Immutable configuration record threaded into [`crate::connection::Connection`]
/// and [`crate::loader::Loader`] at construction.
///
/// Replaces the source implementation's process-wide globals
/// (`DRY_RUN`, `PEDANTIC`, `CLIENT_MIN_MESSAGES`, `TRUNCATE`, `VACUUM`,
/// `INPUT_ENCODING`, `PG_CLIENT_ENCODING`, `DATESTYLE`, `COPY_SEP`, `NULL`,
/// `EMPTY_STRING`) with a single value passed explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,

    /// Delimiter byte used in the `COPY` stream. Defaults to tab.
    #[serde(default = "Config::default_copy_sep")]
    pub copy_sep: u8,
    /// Rows accumulated per `COPY` invocation.
    #[serde(default = "Config::default_copy_every")]
    pub copy_every: usize,
    /// Rows per commit on the row-by-row (BLOB) path.
    #[serde(default = "Config::default_commit_every")]
    pub commit_every: usize,

    /// Session `client_encoding`.
    #[serde(default = "Config::default_client_encoding")]
    pub client_encoding: String,
    /// Session `datestyle`, if any.
    #[serde(default)]
    pub datestyle: Option<String>,
    /// Session `lc_messages`, if any.
    #[serde(default)]
    pub lc_messages: Option<String>,

    /// String that upstream uses to signify NULL.
    #[serde(default = "Config::default_null_marker")]
    pub null_marker: String,
    /// String that upstream uses to signify empty.
    #[serde(default)]
    pub empty_marker: String,

    /// Optional source-side encoding to transcode from before escaping.
    #[serde(default)]
    pub input_encoding: Option<String>,

    /// Suppresses all mutating SQL when set.
    #[serde(default)]
    pub dry_run: bool,
    /// Whether a vacuum pass will follow this load (affects the stats
    /// advisory message).
    #[serde(default)]
    pub vacuum: bool,
    /// Reserved for caller policy.
    #[serde(default)]
    pub pedantic: bool,

    /// Threshold controlling whether COPY buffers are pre-emptively saved
    /// to a file before an attempt is made, mirroring the Postgres
    /// `client_min_messages` GUC naming. Any of the `debug*`/`log` levels
    /// (case-insensitive) is treated as "verbose"; unset or any quieter
    /// level (`notice`, `warning`, ...) is not.
    #[serde(default)]
    pub client_min_messages: Option<String>,
}

impl Config {
    fn default_port() -> u16 {
        5432
    }
    fn default_copy_sep() -> u8 {
        b'\t'
    }
    fn default_copy_every() -> usize {
        10_000
    }
    fn default_commit_every() -> usize {
        1_000
    }
    fn default_client_encoding() -> String {
        "UTF8".to_string()
    }
    fn default_null_marker() -> String {
        "\\N".to_string()
    }

    /// Load from a YAML file at `path`.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        Ok(config)
    }

    /// Load connection parameters from the environment (`.env` honored via
    /// `dotenvy`), with loader tuning parameters left at their defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            host: std::env::var("PGHOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("PGPORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(Self::default_port),
            database: std::env::var("PGDATABASE")?,
            user: std::env::var("PGUSER")?,
            password: std::env::var("PGPASSWORD").ok(),
            copy_sep: Self::default_copy_sep(),
            copy_every: Self::default_copy_every(),
            commit_every: Self::default_commit_every(),
            client_encoding: Self::default_client_encoding(),
            datestyle: None,
            lc_messages: None,
            null_marker: Self::default_null_marker(),
            empty_marker: String::new(),
            input_encoding: None,
            dry_run: false,
            vacuum: false,
            pedantic: false,
            client_min_messages: None,
        })
    }

    pub fn is_null(&self, value: &str) -> bool {
        value == self.null_marker
    }

    pub fn is_empty(&self, value: &str) -> bool {
        value == self.empty_marker
    }

    /// Whether `client_min_messages` is set low enough that COPY buffers
    /// should be saved to disk proactively, before an attempt is made,
    /// rather than only after a failure.
    pub fn is_verbose(&self) -> bool {
        match &self.client_min_messages {
            Some(level) => {
                let level = level.to_ascii_lowercase();
                level.starts_with("debug") || level == "log"
            }
            None => false,
        }
    }
}
