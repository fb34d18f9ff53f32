//! Media element seam.
//!
//! A [`MediaElement`] is one host decoder (a `<video>` element, a GStreamer
//! pipeline, a simulated stand-in). Loading is fire-and-forget: `load`
//! returns at once and progress is observed through [`ReadyState`] on later
//! ticks. Nothing here blocks.

use std::fmt;

use splice_common::error::SpliceResult;

use crate::timeline::LaneId;

/// Decode readiness, ordered from nothing to fully buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ReadyState {
    #[default]
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::HaveNothing,
            1 => ReadyState::HaveMetadata,
            2 => ReadyState::HaveCurrentData,
            3 => ReadyState::HaveFutureData,
            _ => ReadyState::HaveEnoughData,
        }
    }

    /// A frame for the current position is decoded.
    pub fn can_render(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// Playable location produced by a [`MediaResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaUri(pub String);

impl MediaUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a source key into something a media element can load.
pub trait MediaResolver {
    fn resolve(&self, source_key: &str) -> SpliceResult<MediaUri>;
}

impl<F> MediaResolver for F
where
    F: Fn(&str) -> SpliceResult<MediaUri>,
{
    fn resolve(&self, source_key: &str) -> SpliceResult<MediaUri> {
        self(source_key)
    }
}

/// One host decoder.
pub trait MediaElement {
    /// Start loading `uri`. Returns immediately.
    fn load(&mut self, uri: &MediaUri);

    fn ready_state(&self) -> ReadyState;

    /// Decode or network failure for the current source.
    fn error(&self) -> Option<String>;

    /// Seek to `secs` in source time.
    fn seek(&mut self, secs: f64);

    fn current_time(&self) -> f64;

    fn play(&mut self);

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn set_playback_rate(&mut self, rate: f64);

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;

    /// Drop the current source and free its decode resources.
    fn clear_source(&mut self);

    /// Route element events (stalled, waiting, error) to `lane`.
    fn attach_listeners(&mut self, lane: &LaneId);

    fn detach_listeners(&mut self);
}

/// Creates media elements for lane buffers.
pub trait MediaElementFactory {
    fn create(&mut self, lane: &LaneId) -> Box<dyn MediaElement>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_common::error::SpliceError;

    #[test]
    fn test_ready_state_ordering() {
        assert!(ReadyState::HaveCurrentData.can_render());
        assert!(ReadyState::HaveEnoughData.can_render());
        assert!(!ReadyState::HaveMetadata.can_render());
        assert!(ReadyState::HaveNothing < ReadyState::HaveMetadata);
        assert_eq!(ReadyState::from_u8(3), ReadyState::HaveFutureData);
        assert_eq!(ReadyState::from_u8(9), ReadyState::HaveEnoughData);
        assert_eq!(ReadyState::HaveCurrentData.as_u8(), 2);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |key: &str| -> SpliceResult<MediaUri> {
            if key.is_empty() {
                Err(SpliceError::media_resolution(key, "empty key"))
            } else {
                Ok(MediaUri::new(format!("file:///media/{key}")))
            }
        };
        assert_eq!(
            resolver.resolve("a.mp4").unwrap().as_str(),
            "file:///media/a.mp4"
        );
        assert!(resolver.resolve("").is_err());
    }
}
