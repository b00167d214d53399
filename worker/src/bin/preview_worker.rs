use std::{process::ExitCode, sync::Arc};

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use clap::Parser;
use eyre::{Context, Result};
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{prelude::*, EnvFilter};

use previewer_core::{
    core::storage::{LocalFileStorage, Storage},
    deadpool_diesel, interact,
    job::preview_job::{PreviewJob, PreviewJobParams, PreviewOutcome, PreviewTools},
    model::{
        repository::db::{self, DbPool},
        AssetId,
    },
    processing::process_control::SystemCommandRunner,
};

/// Creates the preview thumbnail and clip for one video asset.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Id of the asset to process
    asset_id: i64,
    #[arg(short, long, env = "PREVIEWER_CONFIG", default_value = "previewer.toml")]
    config: PathBuf,
}

async fn db_setup(dir: &Path) -> Result<DbPool> {
    let db_url = dir.join("previewer.db").to_string();
    let pool = db::open_db_pool(&db_url)?;
    let conn = pool.get().await?;
    interact!(conn, db::migrate).await??;
    Ok(pool)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    if std::env::var("RUST_SPANTRACE").is_err() {
        std::env::set_var("RUST_SPANTRACE", "1");
    }
    color_eyre::install()?;
    let env_filter =
        EnvFilter::try_from_env("PREVIEWER_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = previewer_core::config::read_config(&args.config).await?;
    let runner = Arc::new(SystemCommandRunner::new(config.process_timeout));

    if config.startup_self_check {
        info!("Running self check");
        if previewer_core::startup_self_check::run_self_check(runner.as_ref(), &config.bin_paths)
            .await
            .is_err()
        {
            error!("Self check failed");
            return Ok(ExitCode::FAILURE);
        }
        info!("Self check successful");
    }

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .wrap_err_with(|| format!("could not create data directory {}", config.data_dir))?;
    let pool = db_setup(&config.data_dir).await?;
    let storage: Storage = LocalFileStorage::new(config.data_dir.clone()).into();
    let tools = PreviewTools {
        runner,
        bin_paths: config.bin_paths.clone(),
        staging: config.staging.clone(),
    };

    let asset_id = AssetId(args.asset_id);
    let job = PreviewJob::new(PreviewJobParams { asset_id }, pool, storage, tools);
    match job.run().await {
        Ok(PreviewOutcome::Created {
            thumbnail_key,
            clip_key,
        }) => {
            info!(%asset_id, %thumbnail_key, ?clip_key, "created preview");
            Ok(ExitCode::SUCCESS)
        }
        Ok(outcome) => {
            info!(%asset_id, ?outcome, "nothing to do");
            Ok(ExitCode::SUCCESS)
        }
        // the job has already logged the failure
        Err(_) => Ok(ExitCode::FAILURE),
    }
}
