use camino::Utf8Path as Path;

use crate::{
    config::BinPaths,
    processing::process_control::{CommandError, CommandInvocation, CommandRunner},
};

/// Checks that ffmpeg and ffprobe can be started. Problems are logged.
pub async fn run_self_check(runner: &dyn CommandRunner, bin_paths: &BinPaths) -> Result<(), ()> {
    check_can_run(runner, "ffmpeg", bin_paths.ffmpeg.as_deref()).await?;
    check_can_run(runner, "ffprobe", bin_paths.ffprobe.as_deref()).await?;
    Ok(())
}

async fn check_can_run(
    runner: &dyn CommandRunner,
    name: &str,
    bin_path: Option<&Path>,
) -> Result<(), ()> {
    let invocation = CommandInvocation::new(bin_path.map_or(name, |p| p.as_str())).arg("-version");
    match runner.run(&invocation).await {
        Ok(_) => {
            tracing::debug!("ok: can run {}", name);
            Ok(())
        }
        Err(CommandError::ErrorStarting { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            match bin_path {
                Some(path) => {
                    tracing::error!("Could not find {} at path from config: {}", name, path)
                }
                None => tracing::error!("Could not find {}. Is it installed?", name),
            }
            Err(())
        }
        Err(err) => {
            tracing::error!("{} test failed: {}", name, err);
            Err(())
        }
    }
}
