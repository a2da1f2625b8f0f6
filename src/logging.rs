use simplelog::ColorChoice;
use simplelog::CombinedLogger;
use simplelog::Config as LogConfig;
use simplelog::LevelFilter;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;
use std::fs::File;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Installs a combined term + file logger: info-and-above to the terminal,
/// debug-and-above to `logs/<table>-<unix_ts>.log`.
pub fn init_logging(table: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all("logs")?;
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let log_path = PathBuf::from("logs").join(format!("{table}-{timestamp}.log"));
    let log_file = File::create(&log_path)?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            LogConfig::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, LogConfig::default(), log_file),
    ])?;

    Ok(log_path)
}
