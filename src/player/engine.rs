// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::error::NimbusResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Live,
    Vod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
}

/// Buffering and adaptive bitrate settings applied before each load.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamProfile {
    pub kind: StreamKind,
    pub low_latency: bool,
    pub buffering_goal: Duration,
    pub rebuffering_goal: Duration,
    pub buffer_behind: Duration,
    pub retry: RetryPolicy,
    pub abr_enabled: bool,
    pub abr_switch_interval: Duration,
    /// Bits per second
    pub default_bandwidth_estimate: u64,
}

impl StreamProfile {
    pub fn for_kind(kind: StreamKind) -> Self {
        let live = kind == StreamKind::Live;
        Self {
            kind,
            low_latency: live,
            buffering_goal: Duration::from_secs(if live { 4 } else { 20 }),
            rebuffering_goal: Duration::from_secs(if live { 2 } else { 4 }),
            buffer_behind: Duration::from_secs(if live { 10 } else { 30 }),
            retry: RetryPolicy {
                max_attempts: 2,
                timeout: Duration::from_secs(8),
            },
            abr_enabled: true,
            abr_switch_interval: Duration::from_secs(2),
            default_bandwidth_estimate: 5_000_000,
        }
    }
}

/// Seekable window reported by the engine, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRange {
    pub start: f64,
    pub end: f64,
}

/// Live-edge position: just behind the end of the seekable window.
pub fn live_edge(range: &SeekRange) -> Option<f64> {
    if range.end.is_finite() {
        Some((range.end - 0.3).max(0.0))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Buffering(bool),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presentation {
    /// Muted, windowed
    #[default]
    Preview,
    /// Unmuted, fullscreen
    Fullscreen,
}

/// A place video is rendered into. One engine is bound to each surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Surface {
    pub name: String,
}

impl Surface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A streaming media engine attached to one surface.
///
/// Methods take `&self` so a shared engine can serve overlapping loads; the
/// implementation serializes what it must.
pub trait Engine: Send + Sync + 'static {
    fn configure(&self, profile: &StreamProfile) -> impl Future<Output = NimbusResult<()>> + Send;

    /// Resolves once the media is loaded, or fails with `StreamUnavailable`.
    fn load(&self, url: &str) -> impl Future<Output = NimbusResult<()>> + Send;

    fn is_live(&self) -> impl Future<Output = bool> + Send;

    fn seek_range(&self) -> impl Future<Output = Option<SeekRange>> + Send;

    fn seek(&self, position: f64) -> impl Future<Output = NimbusResult<()>> + Send;

    fn play(&self) -> impl Future<Output = NimbusResult<()>> + Send;

    fn unload(&self) -> impl Future<Output = NimbusResult<()>> + Send;

    fn destroy(&self) -> impl Future<Output = NimbusResult<()>> + Send;

    fn set_presentation(
        &self,
        presentation: Presentation,
    ) -> impl Future<Output = NimbusResult<()>> + Send;

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}

/// Creates engines bound to a surface.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: Engine;

    /// Fails with `EngineInit`.
    fn attach(&self, surface: &Surface) -> impl Future<Output = NimbusResult<Self::Engine>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        let live = StreamProfile::for_kind(StreamKind::Live);
        assert!(live.low_latency);
        assert_eq!(live.buffering_goal, Duration::from_secs(4));
        assert_eq!(live.rebuffering_goal, Duration::from_secs(2));
        assert_eq!(live.buffer_behind, Duration::from_secs(10));

        let vod = StreamProfile::for_kind(StreamKind::Vod);
        assert!(!vod.low_latency);
        assert_eq!(vod.buffering_goal, Duration::from_secs(20));
        assert_eq!(vod.rebuffering_goal, Duration::from_secs(4));
        assert_eq!(vod.buffer_behind, Duration::from_secs(30));

        for profile in [live, vod] {
            assert_eq!(profile.retry.max_attempts, 2);
            assert_eq!(profile.retry.timeout, Duration::from_secs(8));
            assert_eq!(profile.default_bandwidth_estimate, 5_000_000);
            assert_eq!(profile.abr_switch_interval, Duration::from_secs(2));
        }
    }

    #[test]
    fn test_live_edge() {
        let edge = live_edge(&SeekRange { start: 0.0, end: 120.0 }).unwrap();
        assert!((edge - 119.7).abs() < 1e-9);
        assert_eq!(live_edge(&SeekRange { start: 0.0, end: 0.1 }), Some(0.0));
        assert_eq!(live_edge(&SeekRange { start: 0.0, end: f64::NAN }), None);
    }
}
