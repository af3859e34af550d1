use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use s3backup_core::reconcile::reconcile;
use s3backup_core::stability::StabilityProbe;
use s3backup_core::store::s3::{S3Config, S3Store};
use s3backup_core::watch::{BackupWatcher, is_backup_archive};

#[derive(Parser)]
#[command(
    name = "s3backup",
    version,
    about = "Mirror Home Assistant backup archives to an S3 bucket"
)]
struct Cli {
    /// Directory to watch for completed backup archives
    monitor_path: PathBuf,

    /// Name of the destination S3 bucket
    bucket_name: String,

    /// AWS region the bucket lives in
    bucket_region: String,

    /// S3 storage class applied to uploads
    storage_class: String,

    /// Upload local files missing from the bucket ("true"/"false")
    #[arg(action = clap::ArgAction::Set, value_parser = parse_flag)]
    upload_missing_files: bool,
}

fn parse_flag(raw: &str) -> Result<bool, std::convert::Infallible> {
    Ok(raw.eq_ignore_ascii_case("true"))
}

/// Map the add-on's `LOG_LEVEL` (1 = critical only .. 8 = everything)
/// onto a tracing filter. Unset or unrecognized values stay most verbose.
fn level_from_env(raw: Option<&str>) -> LevelFilter {
    match raw.map(str::trim) {
        Some("1" | "2") => LevelFilter::ERROR,
        Some("3") => LevelFilter::WARN,
        Some("4" | "5") => LevelFilter::INFO,
        Some("6" | "7") => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = std::env::var("LOG_LEVEL").ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::default().add_directive(level_from_env(log_level.as_deref()).into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    anyhow::ensure!(
        cli.monitor_path.is_dir(),
        "monitor path {} does not exist",
        cli.monitor_path.display()
    );

    let store = Arc::new(S3Store::new(&S3Config {
        bucket: cli.bucket_name,
        region: cli.bucket_region,
        storage_class: cli.storage_class,
    })?);

    // An unreachable bucket surfaces here and aborts the process.
    reconcile(store.as_ref(), &cli.monitor_path, cli.upload_missing_files).await?;

    info!(path = %cli.monitor_path.display(), "monitoring path for new snapshots");

    let watcher = BackupWatcher::new(
        &cli.monitor_path,
        store,
        StabilityProbe::default(),
        Arc::new(is_backup_archive),
    );

    tokio::select! {
        res = watcher.run() => res,
        _ = shutdown_signal() => {
            info!("shutdown signal received, stopping watcher");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_mapping_matches_addon_semantics() {
        assert_eq!(level_from_env(None), LevelFilter::TRACE);
        assert_eq!(level_from_env(Some("8")), LevelFilter::TRACE);
        assert_eq!(level_from_env(Some("7")), LevelFilter::DEBUG);
        assert_eq!(level_from_env(Some("6")), LevelFilter::DEBUG);
        assert_eq!(level_from_env(Some("5")), LevelFilter::INFO);
        assert_eq!(level_from_env(Some("4")), LevelFilter::INFO);
        assert_eq!(level_from_env(Some("3")), LevelFilter::WARN);
        assert_eq!(level_from_env(Some("2")), LevelFilter::ERROR);
        assert_eq!(level_from_env(Some("1")), LevelFilter::ERROR);
        assert_eq!(level_from_env(Some(" 5 ")), LevelFilter::INFO);
        assert_eq!(level_from_env(Some("verbose")), LevelFilter::TRACE);
    }

    #[test]
    fn missing_files_flag_is_true_only_for_true() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(!parse_flag("yes").unwrap());
        assert!(!parse_flag("").unwrap());
    }

    #[test]
    fn parses_all_five_positional_arguments() {
        let cli = Cli::try_parse_from([
            "s3backup",
            "/backup",
            "my-bucket",
            "eu-central-1",
            "STANDARD_IA",
            "true",
        ])
        .unwrap();
        assert_eq!(cli.monitor_path, PathBuf::from("/backup"));
        assert_eq!(cli.bucket_name, "my-bucket");
        assert_eq!(cli.bucket_region, "eu-central-1");
        assert_eq!(cli.storage_class, "STANDARD_IA");
        assert!(cli.upload_missing_files);

        let cli = Cli::try_parse_from([
            "s3backup",
            "/backup",
            "my-bucket",
            "eu-central-1",
            "STANDARD",
            "no",
        ])
        .unwrap();
        assert!(!cli.upload_missing_files);
    }

    #[test]
    fn rejects_wrong_argument_count() {
        use clap::CommandFactory;
        let err = Cli::command()
            .try_get_matches_from(["s3backup", "/backup", "my-bucket"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
