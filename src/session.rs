//! Boundary layer: maps opaque integer handles to canvases and strokes.
//!
//! Handles are stable indices into growable slot tables; destroying an
//! entity tombstones its slot and slots are never reused, so a stale handle
//! from a late in-flight call resolves to `None` and the operation becomes a
//! benign no-op — never an error.  This mirrors the host-bridge contract:
//! the host is the sole source of handles, and a stale one just means a
//! harmless race between destroy and a queued call.

use std::time::Instant;

use crate::brush::{parse_color, BrushConfig, BrushStyle};
use crate::canvas::PixelCanvas;
use crate::stroke::{Stroke, StrokePoint};
use crate::telemetry::RenderTelemetry;

pub type CanvasHandle = usize;
pub type StrokeHandle = usize;

/// Background color used when the boundary string cannot be parsed.
const DEFAULT_BACKGROUND: u32 = 0xFFFF_FFFF;

/// Owns every canvas and stroke of one drawing session and exposes the
/// operations the host adapter calls.  Single-threaded by construction:
/// all mutation goes through `&mut self`.
#[derive(Default)]
pub struct CanvasSession {
    canvases: Vec<Option<PixelCanvas>>,
    strokes: Vec<Option<Stroke>>,
    telemetry: RenderTelemetry,
}

impl CanvasSession {
    pub fn new() -> Self {
        Self {
            canvases: Vec::new(),
            strokes: Vec::new(),
            telemetry: RenderTelemetry::new(),
        }
    }

    /// Allocate a canvas and return its handle.  `background` follows the
    /// boundary color form (`#RRGGBB` / `#RRGGBBAA`), falling back to opaque
    /// white.
    pub fn create_canvas(&mut self, width: u32, height: u32, background: &str) -> CanvasHandle {
        let color = parse_color(background, DEFAULT_BACKGROUND);
        let handle = self.canvases.len();
        self.canvases.push(Some(PixelCanvas::new(width, height, color)));
        crate::log_info!("canvas {} created ({}×{})", handle, width, height);
        handle
    }

    /// Tombstone the canvas and every stroke bound to it — no stroke may
    /// outlive its canvas.
    pub fn destroy_canvas(&mut self, handle: CanvasHandle) {
        let Some(slot) = self.canvases.get_mut(handle) else {
            return;
        };
        if slot.take().is_none() {
            return;
        }
        for stroke_slot in &mut self.strokes {
            if stroke_slot.as_ref().is_some_and(|s| s.canvas == handle) {
                *stroke_slot = None;
            }
        }
        crate::log_info!("canvas {} destroyed", handle);
    }

    pub fn clear_canvas(&mut self, handle: CanvasHandle) {
        if let Some(canvas) = self.canvas_mut(handle) {
            canvas.clear();
        }
    }

    /// Start a stroke at `first` with the given brush style.  `None` when
    /// the canvas handle is unknown.
    pub fn begin_stroke(
        &mut self,
        canvas: CanvasHandle,
        first: StrokePoint,
        style: &BrushStyle,
    ) -> Option<StrokeHandle> {
        if self.canvas(canvas).is_none() {
            return None;
        }
        let brush = BrushConfig::from_style(style);
        let handle = self.strokes.len();
        self.strokes.push(Some(Stroke::new(canvas, brush, first)));
        Some(handle)
    }

    /// Rasterize from the stroke's last sample to `point` and record the
    /// segment's render duration.  Unknown handles are a no-op.
    pub fn add_point_to_stroke(
        &mut self,
        canvas: CanvasHandle,
        stroke: StrokeHandle,
        point: StrokePoint,
    ) {
        let Some(Some(canvas)) = self.canvases.get_mut(canvas) else {
            return;
        };
        let Some(Some(stroke)) = self.strokes.get_mut(stroke) else {
            return;
        };
        let Some(prev) = stroke.last_point() else {
            return;
        };
        stroke.add_point(point);

        let start = Instant::now();
        canvas.apply_stroke_line(prev.x, prev.y, point.x, point.y, point.pressure, &stroke.brush);
        self.telemetry.record(start.elapsed().as_secs_f64() * 1000.0);
    }

    /// Append the final sample, rasterize the closing segment, deactivate
    /// the stroke and release its slot.  A begin/end pair at a single point
    /// still produces one stamp through the degenerate-segment path.
    pub fn end_stroke(&mut self, canvas: CanvasHandle, stroke: StrokeHandle, point: StrokePoint) {
        let Some(slot) = self.strokes.get_mut(stroke) else {
            return;
        };
        let Some(mut ended) = slot.take() else {
            return;
        };
        let prev = ended.last_point();
        ended.end(point);

        if let (Some(prev), Some(Some(canvas))) = (prev, self.canvases.get_mut(canvas)) {
            let start = Instant::now();
            canvas.apply_stroke_line(prev.x, prev.y, point.x, point.y, point.pressure, &ended.brush);
            self.telemetry.record(start.elapsed().as_secs_f64() * 1000.0);
        }
    }

    /// Run the canvas fluid step, then advance the wobble integrator of
    /// every stroke still active anywhere.
    pub fn apply_motion(
        &mut self,
        canvas: CanvasHandle,
        accel_x: f64,
        accel_y: f64,
        accel_z: f64,
    ) {
        let Some(canvas) = self.canvas_mut(canvas) else {
            return;
        };
        canvas.apply_physics(accel_x, accel_y, accel_z);

        for stroke in self.strokes.iter_mut().flatten() {
            if stroke.is_active() {
                let brush = stroke.brush;
                stroke.physics.integrate(accel_x, accel_y, accel_z, &brush);
            }
        }
    }

    /// Data-URI snapshot of the canvas; empty string for unknown handles.
    pub fn snapshot(&self, handle: CanvasHandle) -> String {
        match self.canvas(handle) {
            Some(canvas) => crate::snapshot::data_uri(canvas),
            None => String::new(),
        }
    }

    /// Rolling average of per-segment render durations, milliseconds.
    pub fn average_render_time(&self) -> f64 {
        self.telemetry.average()
    }

    pub fn canvas(&self, handle: CanvasHandle) -> Option<&PixelCanvas> {
        self.canvases.get(handle).and_then(|c| c.as_ref())
    }

    pub fn canvas_mut(&mut self, handle: CanvasHandle) -> Option<&mut PixelCanvas> {
        self.canvases.get_mut(handle).and_then(|c| c.as_mut())
    }

    pub fn stroke(&self, handle: StrokeHandle) -> Option<&Stroke> {
        self.strokes.get(handle).and_then(|s| s.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64, t: f64) -> StrokePoint {
        StrokePoint { x, y, pressure: 1.0, timestamp: t }
    }

    fn black_brush(size: f64) -> BrushStyle {
        // 8-digit color string: 0xFF000000, opaque black as ARGB.
        BrushStyle { size, color: "#FF000000".into(), ..BrushStyle::default() }
    }

    #[test]
    fn fresh_session_reports_zero_average_render_time() {
        assert_eq!(CanvasSession::new().average_render_time(), 0.0);
    }

    #[test]
    fn begin_and_end_at_one_point_leaves_a_stamp() {
        // The §8 scenario: 10×10 white canvas, size-4 opaque black brush,
        // begin at (5,5) and end immediately at (5,5).
        let mut session = CanvasSession::new();
        let canvas = session.create_canvas(10, 10, "#FFFFFF");
        let stroke = session
            .begin_stroke(canvas, point(5.0, 5.0, 0.0), &black_brush(4.0))
            .unwrap();
        session.end_stroke(canvas, stroke, point(5.0, 5.0, 1.0));

        let pixels = session.canvas(canvas).unwrap();
        assert_eq!(pixels.pixel(5, 5), Some(0xFF00_0000));
        assert_eq!(pixels.pixel(0, 0), Some(0xFFFF_FFFF));
        // One segment rendered, one telemetry entry.
        assert!(session.average_render_time() >= 0.0);
    }

    #[test]
    fn unknown_handles_are_benign() {
        let mut session = CanvasSession::new();
        assert!(session.begin_stroke(99, point(0.0, 0.0, 0.0), &BrushStyle::default()).is_none());
        session.add_point_to_stroke(99, 0, point(1.0, 1.0, 1.0));
        session.end_stroke(99, 0, point(1.0, 1.0, 1.0));
        session.clear_canvas(99);
        session.destroy_canvas(99);
        session.apply_motion(99, 1.0, 0.0, 0.0);
        assert_eq!(session.snapshot(99), "");
    }

    #[test]
    fn clear_then_snapshot_is_uniform_background() {
        let mut session = CanvasSession::new();
        let canvas = session.create_canvas(6, 6, "#336699");
        let stroke = session
            .begin_stroke(canvas, point(1.0, 1.0, 0.0), &black_brush(6.0))
            .unwrap();
        session.add_point_to_stroke(canvas, stroke, point(5.0, 5.0, 1.0));
        session.end_stroke(canvas, stroke, point(5.0, 5.0, 2.0));

        session.clear_canvas(canvas);
        let background = session.canvas(canvas).unwrap().background();
        assert!(session.canvas(canvas).unwrap().pixels().iter().all(|&p| p == background));

        // Snapshot of the cleared canvas equals a snapshot of a pristine
        // canvas of the same size and color.
        let pristine = PixelCanvas::new(6, 6, background);
        assert_eq!(session.snapshot(canvas), crate::snapshot::data_uri(&pristine));
    }

    #[test]
    fn destroying_a_canvas_drops_only_its_strokes() {
        let mut session = CanvasSession::new();
        let a = session.create_canvas(8, 8, "#FFFFFF");
        let b = session.create_canvas(8, 8, "#FFFFFF");
        let sa = session.begin_stroke(a, point(1.0, 1.0, 0.0), &black_brush(4.0)).unwrap();
        let sb = session.begin_stroke(b, point(1.0, 1.0, 0.0), &black_brush(4.0)).unwrap();

        session.destroy_canvas(a);
        assert!(session.canvas(a).is_none());
        assert!(session.stroke(sa).is_none());
        assert!(session.stroke(sb).is_some());

        // Late in-flight calls against the dead pair are no-ops.
        session.add_point_to_stroke(a, sa, point(4.0, 4.0, 1.0));
        session.end_stroke(a, sa, point(4.0, 4.0, 2.0));

        // Handles are not reused after a destroy.
        let c = session.create_canvas(4, 4, "#FFFFFF");
        assert_eq!(c, 2);
    }

    #[test]
    fn stroke_handles_stay_bound_to_their_session_state() {
        let mut session = CanvasSession::new();
        let canvas = session.create_canvas(16, 16, "#FFFFFF");
        let stroke = session
            .begin_stroke(canvas, point(2.0, 2.0, 0.0), &black_brush(5.0))
            .unwrap();
        session.add_point_to_stroke(canvas, stroke, point(10.0, 2.0, 1.0));
        assert_eq!(session.stroke(stroke).unwrap().points().len(), 2);

        session.end_stroke(canvas, stroke, point(10.0, 10.0, 2.0));
        // Ended strokes release their slot.
        assert!(session.stroke(stroke).is_none());
    }

    #[test]
    fn motion_advances_physics_of_active_strokes() {
        let mut session = CanvasSession::new();
        let canvas = session.create_canvas(8, 8, "#FFFFFF");
        let style = BrushStyle { fluid_response: 0.5, dampening: 0.9, ..BrushStyle::default() };
        let stroke = session.begin_stroke(canvas, point(1.0, 1.0, 0.0), &style).unwrap();

        session.apply_motion(canvas, 2.0, 0.0, 0.0);
        let physics = session.stroke(stroke).unwrap().physics;
        assert!((physics.velocity_x - 0.9).abs() < 1e-12);
        assert_eq!(physics.velocity_y, 0.0);
    }

    #[test]
    fn unparsable_background_falls_back_to_white() {
        let mut session = CanvasSession::new();
        let canvas = session.create_canvas(2, 2, "chartreuse");
        assert_eq!(session.canvas(canvas).unwrap().background(), 0xFFFF_FFFF);
    }
}
