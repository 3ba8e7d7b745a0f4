// ============================================================================
// FluidCanvas CLI — headless stroke-script replay
// ============================================================================
//
// Usage examples:
//   fluidcanvas --script gesture.json --output result.png
//   fluidcanvas -s gesture.json -o result.bmp --verbose
//   fluidcanvas -s gesture.json --data-uri          (print the snapshot URI)
//
// The script is the JSON record of what a host adapter would feed the
// engine live: stroke gestures and accelerometer samples, in order.
// Replay is deterministic — the chalk texture roll is seeded per canvas.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use serde::Deserialize;

use crate::brush::BrushStyle;
use crate::session::CanvasSession;
use crate::snapshot;
use crate::stroke::StrokePoint;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// FluidCanvas headless renderer.
///
/// Replay a JSON stroke script onto a fresh canvas and write the result —
/// no host runtime required.
#[derive(Parser, Debug)]
#[command(
    name = "fluidcanvas",
    about = "FluidCanvas headless stroke-script renderer",
    long_about = "Replay a recorded gesture script (strokes + accelerometer samples)\n\
                  onto a fresh canvas and save the resulting raster.\n\n\
                  Example:\n  \
                  fluidcanvas --script gesture.json --output result.png"
)]
pub struct CliArgs {
    /// JSON stroke script to replay.
    #[arg(short, long, value_name = "SCRIPT.json")]
    pub script: PathBuf,

    /// Output image path. BMP output is written by the engine's own
    /// encoder; any other extension goes through the image crate.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the snapshot data-URI to stdout instead of (or as well as)
    /// writing a file.
    #[arg(long)]
    pub data_uri: bool,

    /// Print per-event timing and the rolling render average.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Script format
// ============================================================================

fn default_background() -> String {
    "#FFFFFF".to_string()
}

#[derive(Deserialize)]
pub struct StrokeScript {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_background")]
    pub background: String,
    pub events: Vec<ScriptEvent>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// One complete gesture: first point begins the stroke, the last ends it.
    Stroke {
        #[serde(default)]
        brush: BrushStyle,
        points: Vec<StrokePoint>,
    },
    /// One accelerometer sample driving the fluid step.
    Motion { x: f64, y: f64, z: f64 },
    /// Reset the canvas to its background color.
    Clear,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the replay and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let script = match load_script(&args.script) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let total = Instant::now();
    let mut session = CanvasSession::new();
    let canvas = session.create_canvas(script.width, script.height, &script.background);

    for (i, event) in script.events.iter().enumerate() {
        let start = Instant::now();
        replay_event(&mut session, canvas, event);
        if args.verbose {
            println!("event {:>3}: {:>8.3} ms", i, start.elapsed().as_secs_f64() * 1000.0);
        }
    }

    if args.verbose {
        println!(
            "replayed {} events in {:.3} ms (avg segment render {:.3} ms)",
            script.events.len(),
            total.elapsed().as_secs_f64() * 1000.0,
            session.average_render_time()
        );
    }
    crate::log_info!(
        "replayed {} ({} events, avg segment {:.3} ms)",
        args.script.display(),
        script.events.len(),
        session.average_render_time()
    );

    if args.data_uri {
        println!("{}", session.snapshot(canvas));
    }

    if let Some(output) = &args.output {
        if let Err(e) = write_output(&session, canvas, output) {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
        if args.verbose {
            println!("wrote {}", output.display());
        }
    }

    ExitCode::SUCCESS
}

fn load_script(path: &Path) -> Result<StrokeScript, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("cannot parse {}: {}", path.display(), e))
}

fn replay_event(session: &mut CanvasSession, canvas: usize, event: &ScriptEvent) {
    match event {
        ScriptEvent::Stroke { brush, points } => {
            let Some((&first, rest)) = points.split_first() else {
                return;
            };
            let Some(stroke) = session.begin_stroke(canvas, first, brush) else {
                return;
            };
            match rest.split_last() {
                Some((&last, middle)) => {
                    for &p in middle {
                        session.add_point_to_stroke(canvas, stroke, p);
                    }
                    session.end_stroke(canvas, stroke, last);
                }
                // Single-sample gesture: end on the starting point.
                None => session.end_stroke(canvas, stroke, first),
            }
        }
        ScriptEvent::Motion { x, y, z } => session.apply_motion(canvas, *x, *y, *z),
        ScriptEvent::Clear => session.clear_canvas(canvas),
    }
}

/// Write the canvas to disk.  `.bmp` uses the engine's own bit-exact
/// encoder; everything else converts to RGBA and saves via the image crate.
fn write_output(session: &CanvasSession, canvas: usize, path: &Path) -> Result<(), String> {
    let pixel_canvas = session
        .canvas(canvas)
        .ok_or_else(|| "canvas missing after replay".to_string())?;

    let is_bmp = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bmp"));

    if is_bmp {
        let bmp = snapshot::encode_bmp(pixel_canvas);
        return fs::write(path, bmp).map_err(|e| format!("cannot write {}: {}", path.display(), e));
    }

    let (w, h) = (pixel_canvas.width(), pixel_canvas.height());
    let mut rgba = Vec::with_capacity((w * h * 4) as usize);
    for &p in pixel_canvas.pixels() {
        rgba.push(((p >> 16) & 0xFF) as u8);
        rgba.push(((p >> 8) & 0xFF) as u8);
        rgba.push((p & 0xFF) as u8);
        rgba.push(((p >> 24) & 0xFF) as u8);
    }
    let img = image::RgbaImage::from_raw(w, h, rgba)
        .ok_or_else(|| "pixel buffer size mismatch".to_string())?;
    img.save(path)
        .map_err(|e| format!("cannot write {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_parse_with_defaulted_brush_and_background() {
        let json = r#"{
            "width": 10, "height": 10,
            "events": [
                {"type": "stroke", "points": [
                    {"x": 5.0, "y": 5.0, "pressure": 1.0, "timestamp": 0.0}
                ]},
                {"type": "motion", "x": 0.0, "y": 0.0, "z": 9.8},
                {"type": "clear"}
            ]
        }"#;
        let script: StrokeScript = serde_json::from_str(json).unwrap();
        assert_eq!(script.background, "#FFFFFF");
        assert_eq!(script.events.len(), 3);
    }

    #[test]
    fn single_point_stroke_replays_as_one_stamp() {
        // Double-hash delimiters: the color strings contain `"#`.
        let json = r##"{
            "width": 10, "height": 10, "background": "#FFFFFF",
            "events": [
                {"type": "stroke",
                 "brush": {"size": 4.0, "color": "#FF000000"},
                 "points": [{"x": 5.0, "y": 5.0, "pressure": 1.0, "timestamp": 0.0}]}
            ]
        }"##;
        let script: StrokeScript = serde_json::from_str(json).unwrap();

        let mut session = CanvasSession::new();
        let canvas = session.create_canvas(script.width, script.height, &script.background);
        for event in &script.events {
            replay_event(&mut session, canvas, event);
        }
        assert_eq!(session.canvas(canvas).unwrap().pixel(5, 5), Some(0xFF00_0000));
    }
}
