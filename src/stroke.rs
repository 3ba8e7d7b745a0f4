use serde::Deserialize;

use crate::brush::{BrushConfig, BrushPhysics};
use crate::session::CanvasHandle;

/// One gesture sample as delivered by the boundary layer.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    /// 0.0..=1.0
    pub pressure: f64,
    /// Milliseconds, host clock.
    pub timestamp: f64,
}

/// Ordered sample history for one in-progress or completed gesture.
///
/// A stroke exclusively owns its brush config and physics state, and records
/// the canvas it draws on so canvas destruction can cascade.
#[derive(Clone, Debug)]
pub struct Stroke {
    pub canvas: CanvasHandle,
    pub brush: BrushConfig,
    pub physics: BrushPhysics,
    points: Vec<StrokePoint>,
    active: bool,
}

impl Stroke {
    pub fn new(canvas: CanvasHandle, brush: BrushConfig, first: StrokePoint) -> Self {
        Self {
            canvas,
            brush,
            physics: BrushPhysics::new(),
            points: vec![first],
            active: true,
        }
    }

    /// Append a sample.  Appending to an ended stroke is a contract
    /// violation by the caller; ignored in release builds.
    pub fn add_point(&mut self, point: StrokePoint) {
        debug_assert!(self.active, "add_point on an ended stroke");
        if !self.active {
            return;
        }
        self.points.push(point);
    }

    /// Append the final sample and deactivate.  Flips `active` exactly once.
    pub fn end(&mut self, point: StrokePoint) {
        self.add_point(point);
        self.active = false;
    }

    pub fn last_point(&self) -> Option<StrokePoint> {
        self.points.last().copied()
    }

    pub fn points(&self) -> &[StrokePoint] {
        &self.points
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
