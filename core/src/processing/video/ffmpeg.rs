use camino::Utf8Path as Path;
use tracing::{debug, instrument};

use crate::processing::process_control::{CommandError, CommandInvocation, CommandRunner};

#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("error running ffmpeg")]
    Process(#[from] CommandError),
    #[error("ffmpeg produced no output")]
    EmptyOutput,
}

fn ffmpeg_command(input: &Path, ffmpeg_bin_path: Option<&Path>) -> CommandInvocation {
    CommandInvocation::new(ffmpeg_bin_path.map_or("ffmpeg", |p| p.as_str()))
        .args(["-nostdin", "-v", "error", "-i"])
        .arg(input.as_str())
}

/// Decodes the first frame of `input` into a JPEG.
#[instrument(err, skip(runner))]
pub async fn extract_thumbnail(
    runner: &dyn CommandRunner,
    input: &Path,
    ffmpeg_bin_path: Option<&Path>,
) -> Result<Vec<u8>, ExtractionError> {
    let invocation = ffmpeg_command(input, ffmpeg_bin_path).args([
        "-frames:v",
        "1",
        "-c:v",
        "mjpeg",
        "-f",
        "image2pipe",
        "pipe:1",
    ]);
    // the runner reads stdout to the end, never just the first chunk
    let output = runner.run(&invocation).await?;
    if output.stdout.is_empty() {
        return Err(ExtractionError::EmptyOutput);
    }
    debug!(len = output.stdout.len(), "extracted thumbnail");
    Ok(output.stdout)
}

/// Makes an animated GIF from every `sample_interval`-th frame of `input`,
/// stopping after `frame_count` frames.
#[instrument(err, skip(runner))]
pub async fn extract_clip(
    runner: &dyn CommandRunner,
    input: &Path,
    frame_count: u64,
    sample_interval: u64,
    ffmpeg_bin_path: Option<&Path>,
) -> Result<Vec<u8>, ExtractionError> {
    let invocation = ffmpeg_command(input, ffmpeg_bin_path)
        .arg("-vf")
        .arg(format!("select=not(mod(n\\,{}))", sample_interval))
        .args(["-vsync", "vfr", "-frames:v"])
        .arg(frame_count.to_string())
        .args(["-f", "gif", "pipe:1"]);
    let output = runner.run(&invocation).await?;
    if output.stdout.is_empty() {
        return Err(ExtractionError::EmptyOutput);
    }
    debug!(len = output.stdout.len(), "extracted clip");
    Ok(output.stdout)
}
