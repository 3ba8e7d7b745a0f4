use serde::Deserialize;

/// Named compositing/falloff variant for a brush.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushTexture {
    #[default]
    Normal,
    /// Adds deterministic spatial noise to the stamp alpha.
    Chalk,
    /// Softer blend; deposits velocity into the canvas fluid field.
    Watercolor,
}

impl BrushTexture {
    /// Parse a boundary texture string. Unknown names fall back to `Normal`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "chalk" => BrushTexture::Chalk,
            "watercolor" => BrushTexture::Watercolor,
            _ => BrushTexture::Normal,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BrushTexture::Normal => "normal",
            BrushTexture::Chalk => "chalk",
            BrushTexture::Watercolor => "watercolor",
        }
    }
}

/// Brush parameters as they arrive from the boundary (color still a hex
/// string).  Deserialized straight out of stroke scripts; defaults match the
/// engine's built-in brush.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BrushStyle {
    pub size: f64,
    pub opacity: f64,
    pub color: String,
    pub texture: String,
    pub dampening: f64,
    pub fluid_response: f64,
}

impl Default for BrushStyle {
    fn default() -> Self {
        Self {
            size: 10.0,
            opacity: 1.0,
            // 8-digit form: reads as opaque black in ARGB.
            color: "#FF000000".to_string(),
            texture: "normal".to_string(),
            dampening: 0.9,
            fluid_response: 0.5,
        }
    }
}

/// Immutable per-stroke brush parameters.  Created once at stroke start;
/// out-of-range inputs are clamped rather than rejected.
#[derive(Clone, Copy, Debug)]
pub struct BrushConfig {
    /// Base diameter in pixels, > 0.
    pub size: f64,
    /// 0.0..=1.0
    pub opacity: f64,
    /// 32-bit ARGB.
    pub color: u32,
    pub texture: BrushTexture,
    /// Velocity damping per physics step, 0.0..=1.0.
    pub dampening: f64,
    /// Acceleration-to-velocity coupling, >= 0.
    pub fluid_response: f64,
}

impl BrushConfig {
    pub fn new(
        size: f64,
        opacity: f64,
        color: u32,
        texture: BrushTexture,
        dampening: f64,
        fluid_response: f64,
    ) -> Self {
        Self {
            size: if size > 0.0 { size } else { 1.0 },
            opacity: opacity.clamp(0.0, 1.0),
            color,
            texture,
            dampening: dampening.clamp(0.0, 1.0),
            fluid_response: fluid_response.max(0.0),
        }
    }

    /// Build a config from boundary-layer style values.  Unparsable colors
    /// fall back to opaque black.
    pub fn from_style(style: &BrushStyle) -> Self {
        Self::new(
            style.size,
            style.opacity,
            parse_color(&style.color, 0xFF00_0000),
            BrushTexture::from_name(&style.texture),
            style.dampening,
            style.fluid_response,
        )
    }
}

/// Per-stroke "wobble" integrator driven by device acceleration samples.
/// Independent of the canvas fluid field; state carried on the owning stroke.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrushPhysics {
    pub velocity_x: f64,
    pub velocity_y: f64,
}

impl BrushPhysics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one acceleration sample.  Below the force threshold only the
    /// damping applies, so the velocity decays toward rest; otherwise the
    /// x/y acceleration is integrated first and damping applied after.
    pub fn integrate(&mut self, accel_x: f64, accel_y: f64, accel_z: f64, brush: &BrushConfig) {
        let force = (accel_x * accel_x + accel_y * accel_y + accel_z * accel_z).sqrt();
        if force < 0.1 {
            self.velocity_x *= brush.dampening;
            self.velocity_y *= brush.dampening;
            return;
        }

        self.velocity_x += accel_x * brush.fluid_response;
        self.velocity_y += accel_y * brush.fluid_response;

        self.velocity_x *= brush.dampening;
        self.velocity_y *= brush.dampening;
    }
}

/// Parse a `#RRGGBB` or `#RRGGBBAA` color string.  A bare `#RRGGBB` is
/// widened by appending full opacity (`0xFF`) as the low byte.  Anything
/// else returns `fallback`.
pub fn parse_color(s: &str, fallback: u32) -> u32 {
    let Some(hex) = s.strip_prefix('#') else {
        return fallback;
    };
    match hex.len() {
        6 => match u32::from_str_radix(hex, 16) {
            Ok(v) => (v << 8) | 0xFF,
            Err(_) => fallback,
        },
        8 => u32::from_str_radix(hex, 16).unwrap_or(fallback),
        _ => fallback,
    }
}
