//! Per-call route accumulator.
//!
//! A [`RouteRecorder`] starts `Open`, consumes points through [`RouteRecorder::on_point`],
//! and is finalized exactly once by [`RouteRecorder::close`]. Any call after close fails
//! with [`RouteError::InvalidState`]; there is no way back to `Open`.

use tokio::time::Instant;

use super::RouteError;
use crate::geo::{haversine_meters, Point, RouteSummary};
use crate::store::FeatureStore;

/// Lifecycle state, exposed for error reporting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Open,
    Closed,
}

impl RecorderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct Progress {
    point_count: i32,
    feature_count: i32,
    distance_meters: i32,
    previous: Option<Point>,
    started: Option<Instant>,
}

#[derive(Debug)]
enum Phase {
    Open(Progress),
    Closed,
}

#[derive(Debug)]
pub struct RouteRecorder<'a> {
    store: &'a FeatureStore,
    phase: Phase,
}

impl<'a> RouteRecorder<'a> {
    pub fn new(store: &'a FeatureStore) -> Self {
        Self {
            store,
            phase: Phase::Open(Progress::default()),
        }
    }

    pub fn state(&self) -> RecorderState {
        match self.phase {
            Phase::Open(_) => RecorderState::Open,
            Phase::Closed => RecorderState::Closed,
        }
    }

    /// Record one point of the route.
    pub fn on_point(&mut self, point: Point) -> Result<(), RouteError> {
        let Phase::Open(progress) = &mut self.phase else {
            return Err(RouteError::InvalidState {
                operation: "on_point",
                state: RecorderState::Closed,
            });
        };

        progress.point_count = progress.point_count.saturating_add(1);
        if self.store.lookup(point).exists() {
            progress.feature_count = progress.feature_count.saturating_add(1);
        }
        match progress.previous {
            // Whole meters per segment, matching the summary's integer distance.
            Some(previous) => {
                let segment = haversine_meters(&previous, &point) as i32;
                progress.distance_meters = progress.distance_meters.saturating_add(segment);
            }
            None => progress.started = Some(Instant::now()),
        }
        progress.previous = Some(point);
        Ok(())
    }

    /// Finalize the route. Succeeds once; every later call is an invalid-state fault.
    pub fn close(&mut self) -> Result<RouteSummary, RouteError> {
        let Phase::Open(progress) = std::mem::replace(&mut self.phase, Phase::Closed) else {
            return Err(RouteError::InvalidState {
                operation: "close",
                state: RecorderState::Closed,
            });
        };

        let elapsed_seconds = progress
            .started
            .map(|started| i32::try_from(started.elapsed().as_secs()).unwrap_or(i32::MAX))
            .unwrap_or(0);

        Ok(RouteSummary {
            point_count: progress.point_count,
            feature_count: progress.feature_count,
            distance_meters: progress.distance_meters,
            elapsed_seconds,
        })
    }
}
