use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scan_hub::app::{self, ScanHub};
use scan_hub::history::{parse_timestamp, HistoryQuery, DEFAULT_QUERY_LIMIT, TIMESTAMP_FORMAT};
use scan_hub::{HubConfig, DEFAULT_CONFIG_PATH};

fn cli() -> Command {
    Command::new("scan-hub")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multi-camera DataMatrix / QR / barcode scanner")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value(DEFAULT_CONFIG_PATH)
                .global(true),
        )
        .subcommand(Command::new("run").about("Start all configured cameras (default)"))
        .subcommand(
            Command::new("profiles")
                .about("List the media profiles of a network camera")
                .arg(Arg::new("camera").required(true).help("Camera id")),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Save a JPEG snapshot from a network camera")
                .arg(Arg::new("camera").required(true).help("Camera id"))
                .arg(Arg::new("out").required(true).help("Output file")),
        )
        .subcommand(
            Command::new("history")
                .about("Query recorded scans")
                .arg(Arg::new("camera").long("camera").help("Only this camera id"))
                .arg(Arg::new("keyword").long("keyword").help("Payload substring"))
                .arg(Arg::new("from").long("from").help("Start time, YYYY-MM-DD HH:MM:SS"))
                .arg(Arg::new("to").long("to").help("End time, YYYY-MM-DD HH:MM:SS"))
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("500"),
                )
                .arg(Arg::new("export").long("export").value_name("FILE").help("Also write rows to CSV")),
        )
}

fn history_query(matches: &ArgMatches) -> anyhow::Result<HistoryQuery> {
    let time = |name: &str| -> anyhow::Result<_> {
        Ok(match matches.get_one::<String>(name) {
            Some(value) => Some(parse_timestamp(value)?),
            None => None,
        })
    };
    Ok(HistoryQuery {
        from: time("from")?,
        to: time("to")?,
        camera_id: matches.get_one::<String>("camera").cloned(),
        keyword: matches.get_one::<String>("keyword").cloned(),
        limit: matches
            .get_one::<usize>("limit")
            .copied()
            .unwrap_or(DEFAULT_QUERY_LIMIT),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let matches = cli().get_matches();
    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = HubConfig::load(&config_path).await?;

    match matches.subcommand() {
        Some(("profiles", sub)) => {
            let camera = sub.get_one::<String>("camera").map(String::as_str).unwrap_or_default();
            for profile in app::list_profiles(&config, camera).await? {
                println!("{}\t{}", profile.token, profile.name);
            }
        }
        Some(("snapshot", sub)) => {
            let camera = sub.get_one::<String>("camera").map(String::as_str).unwrap_or_default();
            let out = sub.get_one::<String>("out").map(PathBuf::from).unwrap_or_default();
            let size = app::save_snapshot(&config, camera, &out).await?;
            info!("Saved {} bytes to {:?}", size, out);
        }
        Some(("history", sub)) => {
            let query = history_query(sub)?;
            let export = sub.get_one::<String>("export").map(PathBuf::from);
            let rows = app::query_history(&config, &query, export.as_deref())?;
            for row in &rows {
                println!(
                    "{}\t{}\t{}\t{}",
                    row.ts.format(TIMESTAMP_FORMAT),
                    row.camera_id,
                    row.camera_kind,
                    row.payload
                );
            }
            info!("{} rows", rows.len());
        }
        _ => {
            info!("Starting scan hub...");
            info!("Config: {:?}", config_path);
            info!("Cameras: {}", config.cameras.len());
            info!("Decode mode: {}", config.decode_mode);
            info!("History: {:?}", config.history_path);

            let hub = ScanHub::new(config)?;
            hub.run().await?;
            info!("Scan hub stopped");
        }
    }

    Ok(())
}
