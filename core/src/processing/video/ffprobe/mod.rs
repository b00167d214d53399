mod command;

pub use command::{ffprobe_frames, parse_probe_output, ProbeError, ProbeParseError};

/// Seconds of source video per frame of the preview clip.
pub const CLIP_SECONDS_PER_FRAME: u64 = 5;

/// Frame rate and frame count of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeResult {
    /// frames per second
    pub fps: u64,
    /// total number of decodable frames
    pub frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipEligibility {
    /// Too short for a preview clip, not an error.
    NotEligible,
    Eligible {
        /// Exact number of frames to request from ffmpeg, always >= 1
        frame_count: u64,
        /// Take every `sample_interval`-th source frame
        sample_interval: u64,
    },
}

impl ProbeResult {
    /// A clip gets one frame per [`CLIP_SECONDS_PER_FRAME`] seconds of video,
    /// and is only made if that is at least one frame.
    pub fn clip_eligibility(&self) -> ClipEligibility {
        let interval = match self.fps.checked_mul(CLIP_SECONDS_PER_FRAME) {
            Some(0) | None => return ClipEligibility::NotEligible,
            Some(interval) => interval,
        };
        if interval > self.frames {
            return ClipEligibility::NotEligible;
        }
        ClipEligibility::Eligible {
            frame_count: self.frames / interval,
            sample_interval: interval,
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn long_enough_video_is_eligible() {
        let probe = ProbeResult {
            fps: 30,
            frames: 200,
        };
        assert_eq!(
            probe.clip_eligibility(),
            ClipEligibility::Eligible {
                frame_count: 1,
                sample_interval: 150
            }
        );
    }

    #[test]
    fn short_video_is_not_eligible() {
        let probe = ProbeResult {
            fps: 30,
            frames: 100,
        };
        assert_eq!(probe.clip_eligibility(), ClipEligibility::NotEligible);
    }

    #[test]
    fn exactly_five_seconds_is_eligible() {
        let probe = ProbeResult {
            fps: 24,
            frames: 120,
        };
        assert_eq!(
            probe.clip_eligibility(),
            ClipEligibility::Eligible {
                frame_count: 1,
                sample_interval: 120
            }
        );
    }

    #[test]
    fn zero_fps_is_not_eligible() {
        let probe = ProbeResult {
            fps: 0,
            frames: 5000,
        };
        assert_eq!(probe.clip_eligibility(), ClipEligibility::NotEligible);
    }

    proptest! {
        #[test]
        fn prop_eligible_clip_length(fps in 1u64..240, frames in 0u64..10_000_000) {
            match (ProbeResult { fps, frames }).clip_eligibility() {
                ClipEligibility::Eligible { frame_count, sample_interval } => {
                    prop_assert!(fps * 5 <= frames);
                    prop_assert_eq!(sample_interval, fps * 5);
                    prop_assert_eq!(frame_count, frames / (fps * 5));
                    prop_assert!(frame_count >= 1);
                }
                ClipEligibility::NotEligible => {
                    prop_assert!(fps * 5 > frames);
                }
            }
        }
    }
}
