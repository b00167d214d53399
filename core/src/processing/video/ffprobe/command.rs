use camino::Utf8Path as Path;
use tracing::{debug, instrument};

use crate::processing::process_control::{CommandError, CommandInvocation, CommandRunner};

use super::ProbeResult;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ProbeParseError {
    #[error("ffprobe output is not valid UTF-8")]
    NotUtf8,
    #[error("expected 'rate/count' from ffprobe, got '{0}'")]
    Malformed(String),
    #[error("'{field}' in ffprobe output is not a number")]
    NotNumeric { field: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("error running ffprobe")]
    Process(#[from] CommandError),
    #[error("error parsing ffprobe output")]
    Parse(#[from] ProbeParseError),
}

fn probe_invocation(path: &Path, ffprobe_bin_path: Option<&Path>) -> CommandInvocation {
    CommandInvocation::new(ffprobe_bin_path.map_or("ffprobe", |p| p.as_str()))
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_frames",
            "-show_entries",
            "stream=r_frame_rate,nb_read_frames",
            "-of",
            "csv=p=0",
        ])
        .arg(path.as_str())
}

/// Gets frame rate and frame count of the first video stream in `path`.
#[instrument(err, skip(runner))]
pub async fn ffprobe_frames(
    runner: &dyn CommandRunner,
    path: &Path,
    ffprobe_bin_path: Option<&Path>,
) -> Result<ProbeResult, ProbeError> {
    let output = runner
        .run(&probe_invocation(path, ffprobe_bin_path))
        .await?;
    let probe = parse_probe_output(&output.stdout)?;
    debug!(fps = probe.fps, frames = probe.frames, "probed video stream");
    Ok(probe)
}

/// Parses the first line ffprobe prints for `stream=r_frame_rate,nb_read_frames`.
///
/// The csv form is `num/den,count`, where the frame rate is a rational and is
/// rounded down to whole frames per second (`30000/1001` is 29). A line
/// without a comma is read as plain `rate/count`. Thousands separators in the
/// count and surrounding whitespace are ignored.
pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeResult, ProbeParseError> {
    let text = std::str::from_utf8(stdout).map_err(|_| ProbeParseError::NotUtf8)?;
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    let (fps, frames) = match line.split_once(',') {
        Some((rate, count)) => (parse_frame_rate(rate)?, parse_count(count)?),
        None => {
            let fields: Vec<&str> = line.split('/').collect();
            let [rate, count] = fields.as_slice() else {
                return Err(ProbeParseError::Malformed(line.to_owned()));
            };
            (parse_count(rate)?, parse_count(count)?)
        }
    };
    Ok(ProbeResult { fps, frames })
}

/// `num/den` or a bare integer. A zero denominator (ffprobe prints `0/0` for
/// an unknown rate) gives 0.
fn parse_frame_rate(rate: &str) -> Result<u64, ProbeParseError> {
    let parts: Vec<&str> = rate.split('/').collect();
    match parts.as_slice() {
        [fps] => parse_integer(fps),
        [num, den] => Ok(parse_integer(num)?
            .checked_div(parse_integer(den)?)
            .unwrap_or(0)),
        _ => Err(ProbeParseError::Malformed(rate.to_owned())),
    }
}

fn parse_count(field: &str) -> Result<u64, ProbeParseError> {
    let digits: String = field
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    digits.parse().map_err(|_| ProbeParseError::NotNumeric {
        field: field.to_owned(),
    })
}

fn parse_integer(field: &str) -> Result<u64, ProbeParseError> {
    field
        .trim()
        .parse()
        .map_err(|_| ProbeParseError::NotNumeric {
            field: field.to_owned(),
        })
}
