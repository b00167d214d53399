use std::sync::Arc;

use eyre::eyre;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::{
    catalog::storage_key,
    config::{BinPaths, StagingConfig},
    core::storage::{Storage, StorageProvider},
    interact,
    model::{
        repository::{self, db::DbPool},
        Asset, AssetId, AssetThumbnail, CreateAssetThumbnail,
    },
    processing::{
        process_control::{CommandError, CommandRunner},
        staging::{stage_object, StagePurpose, StagedFile, StagingError},
        video::{
            ffmpeg::{extract_clip, extract_thumbnail, ExtractionError},
            ffprobe::{ffprobe_frames, ClipEligibility, ProbeError, ProbeParseError},
        },
    },
};

/// Everything needed to call out to ffmpeg and ffprobe.
#[derive(Clone)]
pub struct PreviewTools {
    pub runner: Arc<dyn CommandRunner>,
    pub bin_paths: BinPaths,
    pub staging: StagingConfig,
}

#[derive(Debug, Clone)]
pub struct PreviewJobParams {
    pub asset_id: AssetId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    Created {
        thumbnail_key: String,
        clip_key: Option<String>,
    },
    SkippedNotVideo,
    SkippedAlreadyProcessed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum PreviewState {
    Loaded,
    Validated,
    Staged,
    ThumbExtracted,
    Probed,
    ClipExtracted,
    ClipSkipped,
    Persisted,
    CleanedUp,
    Done,
    SkippedNotVideo,
    SkippedAlreadyProcessed,
    Failed,
}

#[derive(thiserror::Error, Debug)]
pub enum PreviewError {
    #[error("{asset_id} does not exist")]
    NotFound { asset_id: AssetId },
    #[error("error staging source file of {asset_id}")]
    Staging {
        asset_id: AssetId,
        #[source]
        source: StagingError,
    },
    #[error("error running ffprobe for {asset_id}")]
    ProbeProcess {
        asset_id: AssetId,
        #[source]
        source: CommandError,
    },
    #[error("error parsing ffprobe output for {asset_id}")]
    ProbeParse {
        asset_id: AssetId,
        #[source]
        source: ProbeParseError,
    },
    #[error("error extracting preview of {asset_id}")]
    Extraction {
        asset_id: AssetId,
        #[source]
        source: ExtractionError,
    },
    #[error("error persisting preview of {asset_id}")]
    Persistence {
        asset_id: AssetId,
        #[source]
        source: eyre::Report,
    },
}

impl PreviewError {
    pub fn asset_id(&self) -> AssetId {
        match self {
            PreviewError::NotFound { asset_id }
            | PreviewError::Staging { asset_id, .. }
            | PreviewError::ProbeProcess { asset_id, .. }
            | PreviewError::ProbeParse { asset_id, .. }
            | PreviewError::Extraction { asset_id, .. }
            | PreviewError::Persistence { asset_id, .. } => *asset_id,
        }
    }

    /// Name of the pipeline stage that failed, for logging.
    pub fn stage(&self) -> &'static str {
        match self {
            PreviewError::NotFound { .. } => "load",
            PreviewError::Staging { .. } => "staging",
            PreviewError::ProbeProcess { .. } | PreviewError::ProbeParse { .. } => "probe",
            PreviewError::Extraction { .. } => "extraction",
            PreviewError::Persistence { .. } => "persistence",
        }
    }

    fn persistence(asset_id: AssetId, source: eyre::Report) -> Self {
        PreviewError::Persistence { asset_id, source }
    }

    fn probe(asset_id: AssetId, err: ProbeError) -> Self {
        match err {
            ProbeError::Process(source) => PreviewError::ProbeProcess { asset_id, source },
            ProbeError::Parse(source) => PreviewError::ProbeParse { asset_id, source },
        }
    }
}

/// Creates the thumbnail and, for long enough videos, the animated clip of one asset.
pub struct PreviewJob {
    params: PreviewJobParams,
    pool: DbPool,
    storage: Storage,
    tools: PreviewTools,
}

impl PreviewJob {
    pub fn new(
        params: PreviewJobParams,
        pool: DbPool,
        storage: Storage,
        tools: PreviewTools,
    ) -> PreviewJob {
        PreviewJob {
            params,
            pool,
            storage,
            tools,
        }
    }

    #[instrument(name = "PreviewJob", skip(self), fields(asset_id = %self.params.asset_id))]
    pub async fn run(self) -> Result<PreviewOutcome, PreviewError> {
        let result = self.process().in_current_span().await;
        match &result {
            Ok(outcome) => info!(?outcome, "preview job finished"),
            Err(err) => {
                enter(PreviewState::Failed);
                error!(stage = err.stage(), error = ?err, "preview job failed");
            }
        }
        result
    }

    async fn process(&self) -> Result<PreviewOutcome, PreviewError> {
        let asset_id = self.params.asset_id;
        let asset = {
            let conn = self
                .pool
                .get()
                .await
                .map_err(|err| PreviewError::persistence(asset_id, err))?;
            interact!(conn, move |conn| repository::asset::get_asset(conn, asset_id))
                .await
                .and_then(|res| res)
                .map_err(|err| PreviewError::persistence(asset_id, err))?
                .ok_or(PreviewError::NotFound { asset_id })?
        };
        enter(PreviewState::Loaded);

        if !asset.is_video() {
            debug!(mime_type = %asset.mime_type, "not a video");
            enter(PreviewState::SkippedNotVideo);
            return Ok(PreviewOutcome::SkippedNotVideo);
        }
        if asset.thumbnail.is_some() {
            enter(PreviewState::SkippedAlreadyProcessed);
            return Ok(PreviewOutcome::SkippedAlreadyProcessed);
        }
        enter(PreviewState::Validated);

        // both are deleted again when dropped, whichever way this function returns
        let thumb_file = self.stage(&asset, StagePurpose::Thumb).await?;
        let clip_file = self.stage(&asset, StagePurpose::Gif).await?;
        enter(PreviewState::Staged);

        let runner = self.tools.runner.as_ref();
        let ffmpeg_bin_path = self.tools.bin_paths.ffmpeg.as_deref();
        let ffprobe_bin_path = self.tools.bin_paths.ffprobe.as_deref();
        let (thumbnail, probe) = tokio::try_join!(
            async {
                let thumbnail = extract_thumbnail(runner, thumb_file.path(), ffmpeg_bin_path)
                    .await
                    .map_err(|source| PreviewError::Extraction { asset_id, source })?;
                enter(PreviewState::ThumbExtracted);
                Ok::<_, PreviewError>(thumbnail)
            },
            async {
                let probe = ffprobe_frames(runner, clip_file.path(), ffprobe_bin_path)
                    .await
                    .map_err(|err| PreviewError::probe(asset_id, err))?;
                enter(PreviewState::Probed);
                Ok::<_, PreviewError>(probe)
            }
        )?;

        let clip = match probe.clip_eligibility() {
            ClipEligibility::NotEligible => {
                debug!(fps = probe.fps, frames = probe.frames, "video too short for clip");
                enter(PreviewState::ClipSkipped);
                None
            }
            ClipEligibility::Eligible {
                frame_count,
                sample_interval,
            } => {
                let clip = extract_clip(
                    runner,
                    clip_file.path(),
                    frame_count,
                    sample_interval,
                    ffmpeg_bin_path,
                )
                .await
                .map_err(|source| PreviewError::Extraction { asset_id, source })?;
                enter(PreviewState::ClipExtracted);
                Some(clip)
            }
        };

        let record = self.persist(asset_id, &thumbnail, clip.as_deref()).await?;
        enter(PreviewState::Persisted);

        for staged in [thumb_file, clip_file] {
            let path = staged.path().to_owned();
            if let Err(err) = staged.close() {
                warn!(%path, %err, "could not delete staged file");
            }
        }
        enter(PreviewState::CleanedUp);
        enter(PreviewState::Done);
        Ok(PreviewOutcome::Created {
            thumbnail_key: record.thumbnail_key,
            clip_key: record.clip_key,
        })
    }

    /// Writes the artifacts, then creates the record pointing at them.
    /// If anything fails the objects written so far are deleted again, so
    /// either everything is persisted or nothing is.
    async fn persist(
        &self,
        asset_id: AssetId,
        thumbnail: &[u8],
        clip: Option<&[u8]>,
    ) -> Result<AssetThumbnail, PreviewError> {
        let mut written: Vec<String> = Vec::default();
        let result = self
            .write_and_record(asset_id, thumbnail, clip, &mut written)
            .await;
        if result.is_err() {
            for key in &written {
                if let Err(err) = self.storage.delete(key).await {
                    warn!(%key, %err, "could not delete object of failed preview");
                }
            }
        }
        result
    }

    async fn write_and_record(
        &self,
        asset_id: AssetId,
        thumbnail: &[u8],
        clip: Option<&[u8]>,
        written: &mut Vec<String>,
    ) -> Result<AssetThumbnail, PreviewError> {
        let thumbnail_key = storage_key::thumbnail(asset_id);
        self.storage
            .save(&thumbnail_key, thumbnail)
            .await
            .map_err(|err| PreviewError::persistence(asset_id, err))?;
        written.push(thumbnail_key);
        if let Some(clip) = clip {
            let clip_key = storage_key::clip(asset_id);
            self.storage
                .save(&clip_key, clip)
                .await
                .map_err(|err| PreviewError::persistence(asset_id, err))?;
            written.push(clip_key);
        }

        let create = CreateAssetThumbnail {
            asset_id,
            with_clip: clip.is_some(),
        };
        let conn = self
            .pool
            .get()
            .await
            .map_err(|err| PreviewError::persistence(asset_id, err))?;
        let updated = interact!(conn, move |conn| {
            repository::asset::set_asset_thumbnail(conn, create)
        })
        .await
        .and_then(|res| res)
        .map_err(|err| PreviewError::persistence(asset_id, err))?;
        updated.thumbnail.ok_or_else(|| {
            PreviewError::persistence(asset_id, eyre!("thumbnail missing after insert"))
        })
    }

    async fn stage(&self, asset: &Asset, purpose: StagePurpose) -> Result<StagedFile, PreviewError> {
        stage_object(
            &self.storage,
            &asset.file_key,
            &self.tools.staging.dir,
            &self.tools.staging.prefix,
            purpose,
            asset.id,
        )
        .await
        .map_err(|source| PreviewError::Staging {
            asset_id: asset.id,
            source,
        })
    }
}

fn enter(state: PreviewState) {
    debug!(%state, "preview state");
}
