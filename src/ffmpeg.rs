//! FFmpeg library setup.
//!
//! FFmpeg logs to stderr through its own logger, independent of the `log`
//! facade. [`set_ffmpeg_log_level`] tunes that output; the CLI defaults it to
//! [`FfmpegLogLevel::Error`] so decoder chatter does not interleave with the
//! progress bar.

use std::path::Path;
use std::str::FromStr;

use ffmpeg_next::util::log::Level;

use crate::error::GeoframeError;

/// FFmpeg's own console verbosity, most quiet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    Quiet,
    Fatal,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
}

impl From<FfmpegLogLevel> for Level {
    fn from(level: FfmpegLogLevel) -> Self {
        match level {
            FfmpegLogLevel::Quiet => Self::Quiet,
            FfmpegLogLevel::Fatal => Self::Fatal,
            FfmpegLogLevel::Error => Self::Error,
            FfmpegLogLevel::Warning => Self::Warning,
            FfmpegLogLevel::Info => Self::Info,
            FfmpegLogLevel::Verbose => Self::Verbose,
            FfmpegLogLevel::Debug => Self::Debug,
        }
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "verbose" => Ok(FfmpegLogLevel::Verbose),
            "debug" => Ok(FfmpegLogLevel::Debug),
            other => Err(format!(
                "unknown FFmpeg log level '{other}' (expected quiet, fatal, error, warning, info, verbose or debug)"
            )),
        }
    }
}

/// Set FFmpeg's internal log verbosity. Does not affect `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.into());
}

/// Initialise FFmpeg before touching `path`. Safe to call repeatedly.
pub(crate) fn initialize(path: &Path) -> Result<(), GeoframeError> {
    ffmpeg_next::init()
        .map_err(|error| GeoframeError::input(path, format!("FFmpeg initialisation failed: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!("quiet".parse(), Ok(FfmpegLogLevel::Quiet));
        assert_eq!("WARN".parse(), Ok(FfmpegLogLevel::Warning));
        assert!("loud".parse::<FfmpegLogLevel>().is_err());
    }
}
