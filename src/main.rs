use clap::Parser;
use pgbulkload::cli::Cli;
use pgbulkload::config::Config;
use pgbulkload::connection::Connection;
use pgbulkload::error::LoaderError;
use pgbulkload::loader::Loader;
use pgbulkload::reject::FileRejectSink;
use std::io::BufRead;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = pgbulkload::logging::init_logging(&cli.table)?;
    log::info!("logging to {}", log_path.display());

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if cli.client_min_messages.is_some() {
        config.client_min_messages = cli.client_min_messages.clone();
    }
    config.dry_run = config.dry_run || cli.dry_run;
    config.vacuum = config.vacuum || cli.vacuum;

    let connection = Connection::reset(config.clone()).await?;

    let reject_path = cli
        .reject_log
        .clone()
        .unwrap_or_else(|| format!("{}.reject.log", cli.table).into());
    let reject = FileRejectSink::create(&reject_path)?;

    if cli.truncate {
        connection.truncate(&cli.table).await?;
    }
    if cli.disable_triggers {
        connection.disable_triggers(&cli.table).await?;
    }

    let mut loader = Loader::new(&connection, &config, &cli.table, &cli.columns);

    let reader: Box<dyn std::io::Read> = match &cli.input {
        Some(path) => Box::new(std::fs::File::open(path)?),
        None => Box::new(std::io::stdin()),
    };
    let reader = std::io::BufReader::new(reader);

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    for line in reader.lines() {
        if interrupted.load(Ordering::SeqCst) {
            log::error!("interrupted; committing rows sent so far and stopping");
            loader.finish(&reject).await;
            loader.stats().print(config.vacuum);
            return Err(LoaderError::Interrupt {
                message: "interrupted by user".to_string(),
            }
            .into());
        }

        let line = line?;
        let mut original_input_line = line.as_bytes().to_vec();
        original_input_line.push(b'\n');
        let values: Vec<String> = line
            .split(config.copy_sep as char)
            .map(str::to_string)
            .collect();
        loader.add_row(&values, &original_input_line, &reject).await;
    }
    loader.finish(&reject).await;

    if cli.disable_triggers {
        connection.enable_triggers(&cli.table).await?;
    }
    if config.vacuum {
        connection.vacuum(&cli.table).await?;
    }

    loader.stats().print(config.vacuum);

    Ok(())
}
