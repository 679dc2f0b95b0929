// ============================================================================
// CRATE CONFIGURATION & IMPORTS
// ============================================================================

// External crate imports
use bon::Builder;
use rusttype::{Font, Scale};
use thiserror::Error;

// Standard library imports
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TIME MODEL
// ============================================================================

/// Length of the 24-hour cycle in milliseconds.
pub const DAY_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

const HOUR_MS: f64 = 60.0 * 60.0 * 1000.0;
const MINUTE_MS: f64 = 60.0 * 1000.0;
const SECOND_MS: f64 = 1000.0;

/// A wall-clock time of day with minute resolution, parsed from `"HH:MM"`.
///
/// Hours must be in `[0, 24)` and minutes in `[0, 60)`; anything else is
/// rejected at parse time rather than propagated into the angle math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ClockError> {
        if hour >= 24 || minute >= 60 {
            return Err(ClockError::MalformedTimeOfDay {
                input: format!("{hour:02}:{minute:02}"),
            });
        }
        Ok(Self { hour, minute })
    }

    /// Milliseconds since midnight.
    pub fn millis_of_day(self) -> f64 {
        f64::from(self.hour) * HOUR_MS + f64::from(self.minute) * MINUTE_MS
    }
}

impl FromStr for TimeOfDay {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ClockError::MalformedTimeOfDay {
            input: s.to_string(),
        };
        let (hour, minute) = s.split_once(':').ok_or_else(err)?;
        let hour: u32 = hour.parse().map_err(|_| err())?;
        let minute: u32 = minute.parse().map_err(|_| err())?;
        if hour >= 24 || minute >= 60 {
            return Err(err());
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Angle on the 24-hour dial for a time of day, before rotation is applied.
/// `00:00` maps to 0 and `12:00` to pi, increasing with the day.
pub fn angle_for_time(time: TimeOfDay) -> f64 {
    TAU * time.millis_of_day() / DAY_MS
}

/// A snapshot of the current wall clock with millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millisecond: u32,
}

impl WallClock {
    pub fn new(hour: u32, minute: u32, second: u32, millisecond: u32) -> Self {
        Self {
            hour,
            minute,
            second,
            millisecond,
        }
    }

    /// Milliseconds since midnight.
    pub fn millis_of_day(self) -> f64 {
        f64::from(self.hour) * HOUR_MS
            + f64::from(self.minute) * MINUTE_MS
            + f64::from(self.second) * SECOND_MS
            + f64::from(self.millisecond)
    }

    /// Angle of a hand at this instant, normalized to `[0, TAU)` over the
    /// hand's containing period, before rotation is applied.
    pub fn hand_angle(self, kind: HandKind) -> f64 {
        let minute_ms = f64::from(self.minute) * MINUTE_MS;
        let second_ms = f64::from(self.second) * SECOND_MS;
        let milli_ms = f64::from(self.millisecond);
        match kind {
            HandKind::Hour => TAU * self.millis_of_day() / DAY_MS,
            HandKind::Minute => TAU * ((minute_ms + second_ms + milli_ms) / HOUR_MS),
            HandKind::Second => TAU * ((second_ms + milli_ms) / MINUTE_MS),
            HandKind::Millisecond => TAU * (milli_ms / SECOND_MS),
        }
    }
}

/// Source of the current local wall-clock time.
pub trait TimeSource {
    fn now(&self) -> WallClock;
}

/// Reads the host's local time via chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTime;

impl TimeSource for LocalTime {
    fn now(&self) -> WallClock {
        use chrono::Timelike;
        let now = chrono::Local::now();
        WallClock {
            hour: now.hour(),
            minute: now.minute(),
            second: now.second(),
            // Leap seconds surface as sub-second millis >= 1000.
            millisecond: now.timestamp_subsec_millis().min(999),
        }
    }
}

// ============================================================================
// COLOR CONFIGURATION
// ============================================================================

/// Color representation for face elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn as_tuple(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ClockError;

    /// Parses `"#rrggbb"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ClockError::MalformedColor {
            input: s.to_string(),
        };
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

// ============================================================================
// PUBLIC API - MAIN INTERFACE
// ============================================================================

/// A background time span on the face: a filled wedge plus a label.
/// Spans may wrap midnight (`end` earlier in the day than `start`).
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub color: Color,
    pub label: String,
}

impl Segment {
    /// Builds a segment from `"HH:MM"` endpoints, rejecting malformed times.
    pub fn new(start: &str, end: &str, color: Color, label: &str) -> Result<Self, ClockError> {
        Ok(Self {
            start: start.parse()?,
            end: end.parse()?,
            color,
            label: label.to_string(),
        })
    }
}

/// The hands the face knows how to draw. Only the hour hand is visible by
/// default; the faster hands sweep their own shorter periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandKind {
    Hour,
    Minute,
    Second,
    Millisecond,
}

#[derive(Debug, Clone, Builder)]
pub struct ClockConfig {
    /// Logical face radius before pixel-density scaling.
    #[builder(default = 100.0)]
    pub radius: f64,
    /// Radians added uniformly to every drawn element. With the default of
    /// zero, angle zero points along the positive x-axis.
    #[builder(default = 0.0)]
    pub rotation: f64,
    /// Physical/logical pixel ratio; scales the backing buffer so output is
    /// crisp on high-density displays while the on-screen size is unchanged.
    #[builder(default = 1.0)]
    pub pixel_density_scale: f64,
    #[builder(default = Color::new(0x44, 0x44, 0x44))]
    pub stroke_color: Color,
    #[builder(default = Color::new(0xff, 0xff, 0xff))]
    pub background_color: Color,
    /// Ordered background spans; order is z-order among overlapping wedges.
    #[builder(default)]
    pub segments: Vec<Segment>,
    #[builder(default = vec![HandKind::Hour])]
    pub visible_hands: Vec<HandKind>,
    #[builder(default = include_bytes!("DejaVuSans.ttf"))]
    pub font_data: &'static [u8],
}

/// Configuration and construction failures.
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("face radius must be positive, got {0}")]
    NonPositiveRadius(f64),
    #[error("pixel density scale must be positive, got {0}")]
    NonPositiveScale(f64),
    #[error(
        "malformed time of day {input:?}, expected HH:MM with hours in [0,24) and minutes in [0,60)"
    )]
    MalformedTimeOfDay { input: String },
    #[error("malformed color {input:?}, expected #rrggbb")]
    MalformedColor { input: String },
    #[error("embedded font data failed to load")]
    FontData,
}

// ============================================================================
// DERIVED GEOMETRY
// ============================================================================

/// Radial extents derived once from the scaled face radius. The ratios are
/// the visual-design contract of the face.
#[derive(Debug, Clone, Copy)]
struct FaceExtents {
    /// Scaled radius; also the center coordinate on both axes.
    radius: f64,
    minor_tick: f64,
    major_tick: f64,
    tick_width: f64,
    numeral: f64,
    numeral_size: f64,
    hand: f64,
    hand_width: f64,
    label: f64,
    pin: f64,
}

impl FaceExtents {
    fn from_radius(radius: f64) -> Self {
        Self {
            radius,
            minor_tick: radius * 0.98,
            major_tick: radius * 0.95,
            tick_width: radius * 0.005,
            numeral: radius * 0.9,
            numeral_size: radius * 0.05,
            hand: radius * 0.95,
            hand_width: radius * 0.01,
            label: radius * 0.8,
            pin: radius * 0.02,
        }
    }
}

impl HandKind {
    /// (extent, stroke width, color) for a hand: the hour hand is shortened,
    /// the faster hands get thinner strokes and their own colors.
    fn style(self, extents: &FaceExtents, stroke: Color) -> (f64, f32, (u8, u8, u8)) {
        match self {
            HandKind::Hour => (
                extents.hand * 0.75,
                extents.hand_width as f32,
                stroke.as_tuple(),
            ),
            HandKind::Minute => (extents.hand, extents.hand_width as f32, stroke.as_tuple()),
            HandKind::Second => (
                extents.hand,
                (extents.hand_width * 0.5) as f32,
                (0xff, 0x99, 0x00),
            ),
            HandKind::Millisecond => (
                extents.hand,
                (extents.hand_width * 0.25) as f32,
                (0x80, 0x00, 0x80),
            ),
        }
    }
}

// ============================================================================
// RETAINED MODE ABSTRACTIONS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum DrawCommand {
    Clear((u8, u8, u8)),
    Wedge {
        cx: f64,
        cy: f64,
        r: f64,
        start_angle: f64,
        end_angle: f64,
        color: (u8, u8, u8),
    },
    Line {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        thickness: f32,
        color: (u8, u8, u8),
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        font_size: f32,
        color: (u8, u8, u8),
    },
    Circle {
        cx: f64,
        cy: f64,
        radius: f64,
        color: (u8, u8, u8),
    },
}

pub(crate) struct Scene {
    commands: Vec<DrawCommand>,
}

impl Scene {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    fn add_command(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    #[cfg(test)]
    pub(crate) fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    fn render(&self, canvas: &mut Canvas, font: &Font) {
        for command in &self.commands {
            match command {
                DrawCommand::Clear(color) => {
                    canvas.clear(*color);
                }
                DrawCommand::Wedge {
                    cx,
                    cy,
                    r,
                    start_angle,
                    end_angle,
                    color,
                } => {
                    fill_wedge(canvas, *cx, *cy, *r, *start_angle, *end_angle, *color);
                }
                DrawCommand::Line {
                    x0,
                    y0,
                    x1,
                    y1,
                    thickness,
                    color,
                } => {
                    draw_thick_line_aa(
                        canvas.frame,
                        canvas.width,
                        x0.round() as i32,
                        y0.round() as i32,
                        x1.round() as i32,
                        y1.round() as i32,
                        *thickness,
                        color.0,
                        color.1,
                        color.2,
                    );
                }
                DrawCommand::Text {
                    x,
                    y,
                    text,
                    font_size,
                    color,
                } => {
                    draw_text(
                        canvas.frame,
                        canvas.width,
                        canvas.height,
                        x.round() as i32,
                        y.round() as i32,
                        text,
                        font,
                        Scale::uniform(*font_size),
                        *color,
                    );
                }
                DrawCommand::Circle {
                    cx,
                    cy,
                    radius,
                    color,
                } => {
                    draw_circle(canvas, *cx, *cy, *radius, *color);
                }
            }
        }
    }
}

// ============================================================================
// CORE DATA TYPES
// ============================================================================

/// A borrowed RGBA8 frame buffer the face is rasterized into.
pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: usize,
    height: usize,
}

impl<'a> Canvas<'a> {
    pub fn new(frame: &'a mut [u8], width: usize, height: usize) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    fn clear(&mut self, color: (u8, u8, u8)) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&[color.0, color.1, color.2, 0xff]);
        }
    }
}

/// Renders a 24-hour analog face: segment wedges and labels, tick marks,
/// hour numerals, and the configured hands, in that order. Geometry derived
/// from the config is fixed at construction; only the time read varies per
/// render call.
pub struct ClockRenderer {
    config: ClockConfig,
    extents: FaceExtents,
    font: Font<'static>,
}

impl ClockRenderer {
    pub fn new(config: ClockConfig) -> Result<Self, ClockError> {
        if config.radius <= 0.0 {
            return Err(ClockError::NonPositiveRadius(config.radius));
        }
        if config.pixel_density_scale <= 0.0 {
            return Err(ClockError::NonPositiveScale(config.pixel_density_scale));
        }
        let font = Font::try_from_bytes(config.font_data).ok_or(ClockError::FontData)?;
        let extents = FaceExtents::from_radius(config.radius * config.pixel_density_scale);
        log::debug!(
            "clock face: logical radius {}, scaled radius {}, {} segments",
            config.radius,
            extents.radius,
            config.segments.len()
        );
        Ok(Self {
            config,
            extents,
            font,
        })
    }

    /// Side length of the backing buffer in physical pixels.
    pub fn physical_size(&self) -> u32 {
        (self.extents.radius * 2.0).round() as u32
    }

    /// Side length of the displayed face in logical units.
    pub fn logical_size(&self) -> f64 {
        self.config.radius * 2.0
    }

    /// Fully erases and redraws the face for the current time. Idempotent:
    /// the output depends only on the config and the time read.
    pub fn render(&self, canvas: &mut Canvas, clock: &dyn TimeSource) {
        let now = clock.now();
        let scene = self.scene(now);
        scene.render(canvas, &self.font);
    }

    pub(crate) fn scene(&self, now: WallClock) -> Scene {
        let mut scene = Scene::new();
        scene.add_command(DrawCommand::Clear(self.config.background_color.as_tuple()));
        self.push_segments(&mut scene);
        self.push_ticks(&mut scene);
        self.push_numerals(&mut scene);
        self.push_hands(&mut scene, now);
        log::trace!("scene built: {} commands", scene.commands.len());
        scene
    }

    fn polar(&self, angle: f64, extent: f64) -> (f64, f64) {
        let r = self.extents.radius;
        (r + angle.cos() * extent, r + angle.sin() * extent)
    }

    fn push_segments(&self, scene: &mut Scene) {
        let r = self.extents.radius;
        let rotation = self.config.rotation;

        // Wedge fill pass. Raw angles go straight to the wedge primitive,
        // which sweeps across the 2pi -> 0 seam when end < start.
        for segment in &self.config.segments {
            scene.add_command(DrawCommand::Wedge {
                cx: r,
                cy: r,
                r,
                start_angle: angle_for_time(segment.start) + rotation,
                end_angle: angle_for_time(segment.end) + rotation,
                color: segment.color.as_tuple(),
            });
        }

        // Label pass, after every wedge so labels sit on top of all of them.
        for segment in &self.config.segments {
            let mid = label_mid_angle(
                angle_for_time(segment.start),
                angle_for_time(segment.end),
            );
            let (x, y) = self.polar(mid + rotation, self.extents.label);
            scene.add_command(DrawCommand::Text {
                x,
                y,
                text: segment.label.clone(),
                font_size: (self.extents.numeral_size / 2.0) as f32,
                color: self.config.stroke_color.as_tuple(),
            });
        }
    }

    fn push_ticks(&self, scene: &mut Scene) {
        let major_ticks = 24u32; // one per hour
        let minor_per_major = 4u32; // one per 15 minutes
        let total_ticks = major_ticks * minor_per_major;

        for tick in 0..total_ticks {
            let major = tick % minor_per_major == 0;
            let inner_extent = if major {
                self.extents.major_tick
            } else {
                self.extents.minor_tick
            };
            let outer_extent = self.extents.radius - self.extents.tick_width;
            let angle = TAU * f64::from(tick) / f64::from(total_ticks) + self.config.rotation;
            let (x0, y0) = self.polar(angle, inner_extent);
            let (x1, y1) = self.polar(angle, outer_extent);
            scene.add_command(DrawCommand::Line {
                x0,
                y0,
                x1,
                y1,
                thickness: self.extents.tick_width as f32,
                color: self.config.stroke_color.as_tuple(),
            });
        }
    }

    fn push_numerals(&self, scene: &mut Scene) {
        let hours = 24u32;
        for hour in 0..hours {
            let angle = TAU * f64::from(hour) / f64::from(hours) + self.config.rotation;
            let (x, y) = self.polar(angle, self.extents.numeral);
            scene.add_command(DrawCommand::Text {
                x,
                y,
                text: format!("{hour}"),
                font_size: self.extents.numeral_size as f32,
                color: self.config.stroke_color.as_tuple(),
            });
        }
    }

    fn push_hands(&self, scene: &mut Scene, now: WallClock) {
        let r = self.extents.radius;

        for kind in &self.config.visible_hands {
            let (extent, width, color) = kind.style(&self.extents, self.config.stroke_color);
            let angle = now.hand_angle(*kind) + self.config.rotation;
            // Short tail on the opposite side of the pivot.
            let x0 = r - angle.cos() * extent * 0.1;
            let y0 = r - angle.sin() * extent * 0.1;
            let (x1, y1) = self.polar(angle, extent);
            scene.add_command(DrawCommand::Line {
                x0,
                y0,
                x1,
                y1,
                thickness: width,
                color,
            });
        }

        scene.add_command(DrawCommand::Circle {
            cx: r,
            cy: r,
            radius: self.extents.pin,
            color: self.config.stroke_color.as_tuple(),
        });
    }
}

/// Midpoint of a segment's arc for label placement. When the segment wraps
/// midnight the end angle gets a full turn added first, so the midpoint
/// bisects the arc actually drawn rather than its complement.
fn label_mid_angle(start_angle: f64, end_angle: f64) -> f64 {
    let end_angle = if end_angle < start_angle {
        end_angle + TAU
    } else {
        end_angle
    };
    (start_angle + end_angle) / 2.0
}

// ============================================================================
// DRAWING PRIMITIVES
// ============================================================================

fn set_pixel(frame: &mut [u8], width: usize, x: usize, y: usize, r: u8, g: u8, b: u8, alpha: f32) {
    if x < width && y < frame.len() / (width * 4) {
        let idx = (y * width + x) * 4;
        let src = [r as f32, g as f32, b as f32, 255.0 * alpha];
        let dst = [
            frame[idx] as f32,
            frame[idx + 1] as f32,
            frame[idx + 2] as f32,
            frame[idx + 3] as f32,
        ];
        let a = src[3] / 255.0;
        let out = [
            (src[0] * a + dst[0] * (1.0 - a)).round() as u8,
            (src[1] * a + dst[1] * (1.0 - a)).round() as u8,
            (src[2] * a + dst[2] * (1.0 - a)).round() as u8,
            0xff,
        ];
        frame[idx..idx + 4].copy_from_slice(&out);
    }
}

fn draw_thick_line_aa(
    frame: &mut [u8],
    width: usize,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    thickness: f32,
    r: u8,
    g: u8,
    b: u8,
) {
    let min_x = x0.min(x1) - thickness.ceil() as i32 - 1;
    let max_x = x0.max(x1) + thickness.ceil() as i32 + 1;
    let min_y = y0.min(y1) - thickness.ceil() as i32 - 1;
    let max_y = y0.max(y1) + thickness.ceil() as i32 + 1;
    let dx = (x1 - x0) as f32;
    let dy = (y1 - y0) as f32;
    let len_sq = dx * dx + dy * dy;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            if x < 0 || y < 0 {
                continue;
            }
            let px = x as f32 - x0 as f32;
            let py = y as f32 - y0 as f32;
            let t = if len_sq > 0.0 {
                ((px * dx + py * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let lx = x0 as f32 + t * dx;
            let ly = y0 as f32 + t * dy;
            let dist = ((lx - x as f32).powi(2) + (ly - y as f32).powi(2)).sqrt();
            // Distance falloff past the half-thickness gives round caps.
            let aa = (1.0 - (dist - thickness / 2.0).clamp(0.0, 1.0)).clamp(0.0, 1.0);
            if aa > 0.01 {
                set_pixel(frame, width, x as usize, y as usize, r, g, b, aa);
            }
        }
    }
}

/// Filled circular sector from the center out to the rim arc. Follows the
/// canvas arc convention: when `end_angle < start_angle` the sweep runs
/// through the 2pi -> 0 seam; an empty sweep draws nothing.
fn fill_wedge(
    canvas: &mut Canvas,
    cx: f64,
    cy: f64,
    r: f64,
    start_angle: f64,
    end_angle: f64,
    color: (u8, u8, u8),
) {
    let mut sweep = end_angle - start_angle;
    if sweep < 0.0 {
        sweep += TAU;
    }
    if sweep <= 0.0 {
        return;
    }
    let start = start_angle.rem_euclid(TAU);

    let min_x = (cx - r - 1.0).floor().max(0.0) as usize;
    let max_x = ((cx + r + 1.0).ceil() as usize).min(canvas.width.saturating_sub(1));
    let min_y = (cy - r - 1.0).floor().max(0.0) as usize;
    let max_y = ((cy + r + 1.0).ceil() as usize).min(canvas.height.saturating_sub(1));

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist > r + 1.0 {
                continue;
            }
            let relative = (dy.atan2(dx) - start).rem_euclid(TAU);
            if relative > sweep {
                continue;
            }
            let aa = if dist > r {
                1.0 - (dist - r).min(1.0)
            } else {
                1.0
            };
            if aa > 0.0 {
                set_pixel(
                    canvas.frame,
                    canvas.width,
                    x,
                    y,
                    color.0,
                    color.1,
                    color.2,
                    aa as f32,
                );
            }
        }
    }
}

fn draw_circle(canvas: &mut Canvas, cx: f64, cy: f64, radius: f64, color: (u8, u8, u8)) {
    let min_x = (cx - radius - 1.0).floor().max(0.0) as usize;
    let max_x = ((cx + radius + 1.0).ceil() as usize).min(canvas.width.saturating_sub(1));
    let min_y = (cy - radius - 1.0).floor().max(0.0) as usize;
    let max_y = ((cy + radius + 1.0).ceil() as usize).min(canvas.height.saturating_sub(1));

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            let aa = if dist > radius {
                1.0 - (dist - radius).min(1.0)
            } else {
                1.0
            };
            if aa > 0.0 {
                set_pixel(
                    canvas.frame,
                    canvas.width,
                    x,
                    y,
                    color.0,
                    color.1,
                    color.2,
                    aa as f32,
                );
            }
        }
    }
}

fn draw_text(
    frame: &mut [u8],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    text: &str,
    font: &Font,
    scale: Scale,
    color: (u8, u8, u8),
) {
    use rusttype::{point, PositionedGlyph};
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<PositionedGlyph> = font
        .layout(text, scale, point(0.0, 0.0 + v_metrics.ascent))
        .collect();
    // Bounding box of the whole string, for centering on both axes.
    let (min_x, max_x, min_y, max_y) = glyphs.iter().filter_map(|g| g.pixel_bounding_box()).fold(
        (i32::MAX, i32::MIN, i32::MAX, i32::MIN),
        |(min_x, max_x, min_y, max_y), bb| {
            (
                min_x.min(bb.min.x),
                max_x.max(bb.max.x),
                min_y.min(bb.min.y),
                max_y.max(bb.max.y),
            )
        },
    );
    let width_px = if min_x < max_x { max_x - min_x } else { 0 };
    let height_px = if min_y < max_y { max_y - min_y } else { 0 };
    let offset_x = x - width_px / 2;
    let offset_y = y - height_px / 2;
    for glyph in glyphs {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, v| {
                let px = offset_x + gx as i32 + bb.min.x - min_x;
                let py = offset_y + gy as i32 + bb.min.y - min_y;
                if px >= 0 && px < width as i32 && py >= 0 && py < height as i32 {
                    set_pixel(
                        frame,
                        width,
                        px as usize,
                        py as usize,
                        color.0,
                        color.1,
                        color.2,
                        v as f32,
                    );
                }
            });
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const EPS: f64 = 1e-9;

    struct FixedTime(WallClock);

    impl TimeSource for FixedTime {
        fn now(&self) -> WallClock {
            self.0
        }
    }

    fn time(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn renderer(config: ClockConfig) -> ClockRenderer {
        ClockRenderer::new(config).unwrap()
    }

    fn distance(x: f64, y: f64, cx: f64, cy: f64) -> f64 {
        ((x - cx).powi(2) + (y - cy).powi(2)).sqrt()
    }

    #[test]
    fn angle_for_midnight_is_zero() {
        assert!(angle_for_time(time("00:00")).abs() < EPS);
    }

    #[test]
    fn angle_for_noon_is_pi() {
        assert!((angle_for_time(time("12:00")) - PI).abs() < EPS);
    }

    #[test]
    fn angle_for_last_minute_of_day() {
        let expected = TAU * f64::from(23 * 60 + 59) / 1440.0;
        assert!((angle_for_time(time("23:59")) - expected).abs() < EPS);
    }

    #[test]
    fn time_of_day_rejects_malformed_input() {
        for input in ["0730", "7:aa", "25:00", "07:60", "", ":30", "-1:00"] {
            assert!(
                input.parse::<TimeOfDay>().is_err(),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn time_of_day_accepts_valid_input() {
        let t = time("07:30");
        assert_eq!(t, TimeOfDay { hour: 7, minute: 30 });
        assert_eq!(t.to_string(), "07:30");
    }

    #[test]
    fn color_parses_hex() {
        let c: Color = "#ff9900".parse().unwrap();
        assert_eq!(c, Color::new(0xff, 0x99, 0x00));
        assert!("ff9900".parse::<Color>().is_err());
        assert!("#ff99".parse::<Color>().is_err());
        assert!("#ff99zz".parse::<Color>().is_err());
    }

    #[test]
    fn wrapped_segment_label_midpoint_bisects_drawn_arc() {
        let start = angle_for_time(time("19:00"));
        let end = angle_for_time(time("07:30"));
        assert!(end < start, "precondition: segment wraps midnight");
        let mid = label_mid_angle(start, end);
        // The wrap-corrected end is past the start, and the midpoint sits
        // strictly between them.
        assert!(mid > start && mid < end + TAU);
        // 19:00 plus half of 12.5 hours is 01:15.
        let expected = angle_for_time(time("01:15")) + TAU;
        assert!((mid - expected).abs() < EPS);
    }

    #[test]
    fn unwrapped_segment_label_midpoint() {
        let mid = label_mid_angle(angle_for_time(time("09:00")), angle_for_time(time("17:00")));
        assert!((mid - angle_for_time(time("13:00"))).abs() < EPS);
    }

    #[test]
    fn tick_pass_emits_96_ticks_with_major_extents() {
        let face = renderer(ClockConfig::builder().radius(100.0).build());
        let mut scene = Scene::new();
        face.push_ticks(&mut scene);

        let r = 100.0;
        let mut majors = Vec::new();
        assert_eq!(scene.commands().len(), 96);
        for (i, command) in scene.commands().iter().enumerate() {
            let DrawCommand::Line { x0, y0, x1, y1, .. } = command else {
                panic!("tick {i} is not a line");
            };
            let inner = distance(*x0, *y0, r, r);
            let outer = distance(*x1, *y1, r, r);
            assert!((outer - (r - r * 0.005)).abs() < 1e-9, "tick {i} outer end");
            if (inner - r * 0.95).abs() < 1e-9 {
                majors.push(i);
            } else {
                assert!((inner - r * 0.98).abs() < 1e-9, "tick {i} inner end");
            }
        }
        let expected: Vec<usize> = (0..96).step_by(4).collect();
        assert_eq!(majors, expected);
    }

    #[test]
    fn numerals_are_evenly_spaced() {
        let face = renderer(ClockConfig::builder().radius(100.0).build());
        let mut scene = Scene::new();
        face.push_numerals(&mut scene);

        let r = 100.0;
        let angles: Vec<f64> = scene
            .commands()
            .iter()
            .map(|command| {
                let DrawCommand::Text { x, y, .. } = command else {
                    panic!("numeral is not text");
                };
                assert!((distance(*x, *y, r, r) - r * 0.9).abs() < 1e-6);
                (y - r).atan2(x - r)
            })
            .collect();
        assert_eq!(angles.len(), 24);
        for h in 0..24 {
            let gap = (angles[(h + 1) % 24] - angles[h]).rem_euclid(TAU);
            assert!((gap - TAU / 24.0).abs() < 1e-9, "gap after numeral {h}");
        }
    }

    #[test]
    fn numeral_labels_run_0_through_23() {
        let face = renderer(ClockConfig::builder().radius(100.0).build());
        let mut scene = Scene::new();
        face.push_numerals(&mut scene);
        let labels: Vec<String> = scene
            .commands()
            .iter()
            .map(|command| {
                let DrawCommand::Text { text, .. } = command else {
                    panic!("numeral is not text");
                };
                text.clone()
            })
            .collect();
        let expected: Vec<String> = (0..24).map(|h| h.to_string()).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn hour_hand_angle_at_half_past_seven() {
        let now = WallClock::new(7, 30, 0, 0);
        let expected = TAU * 7.5 / 24.0;
        assert!((now.hand_angle(HandKind::Hour) - expected).abs() < EPS);
    }

    #[test]
    fn faster_hand_angles() {
        let now = WallClock::new(3, 15, 30, 500);
        let minute = TAU * ((15.0 * 60_000.0 + 30.0 * 1000.0 + 500.0) / 3_600_000.0);
        let second = TAU * ((30.0 * 1000.0 + 500.0) / 60_000.0);
        let milli = TAU * 0.5;
        assert!((now.hand_angle(HandKind::Minute) - minute).abs() < EPS);
        assert!((now.hand_angle(HandKind::Second) - second).abs() < EPS);
        assert!((now.hand_angle(HandKind::Millisecond) - milli).abs() < EPS);
    }

    #[test]
    fn visible_hands_control_emitted_lines() {
        let face = renderer(
            ClockConfig::builder()
                .radius(100.0)
                .visible_hands(vec![HandKind::Hour, HandKind::Second])
                .build(),
        );
        let mut scene = Scene::new();
        face.push_hands(&mut scene, WallClock::new(6, 0, 0, 0));

        let lines: Vec<_> = scene
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Line { .. }))
            .collect();
        assert_eq!(lines.len(), 2);
        // The second hand keeps its own color.
        let DrawCommand::Line { color, .. } = lines[1] else {
            unreachable!()
        };
        assert_eq!(*color, (0xff, 0x99, 0x00));
        // Pin circle sits on top of the hands.
        assert!(matches!(
            scene.commands().last(),
            Some(DrawCommand::Circle { .. })
        ));
    }

    #[test]
    fn hour_hand_line_geometry_at_six() {
        // 06:00 is a quarter of the day: angle pi/2, straight down in
        // buffer coordinates with no rotation.
        let face = renderer(ClockConfig::builder().radius(100.0).build());
        let mut scene = Scene::new();
        face.push_hands(&mut scene, WallClock::new(6, 0, 0, 0));

        let DrawCommand::Line { x0, y0, x1, y1, .. } = &scene.commands()[0] else {
            panic!("hand is not a line");
        };
        let extent = 100.0 * 0.95 * 0.75;
        assert!((x1 - 100.0).abs() < 1e-6);
        assert!((y1 - (100.0 + extent)).abs() < 1e-6);
        // Tail reaches 10% of the extent behind the pivot.
        assert!((x0 - 100.0).abs() < 1e-6);
        assert!((y0 - (100.0 - extent * 0.1)).abs() < 1e-6);
    }

    #[test]
    fn wrapped_segment_label_lands_on_wrapped_bisector_with_rotation() {
        let rotation = -FRAC_PI_2;
        let segment =
            Segment::new("19:00", "07:30", Color::new(0x20, 0x30, 0x40), "night").unwrap();
        let face = renderer(
            ClockConfig::builder()
                .radius(100.0)
                .rotation(rotation)
                .segments(vec![segment])
                .build(),
        );
        let mut scene = Scene::new();
        face.push_segments(&mut scene);

        // One wedge, then one label.
        assert_eq!(scene.commands().len(), 2);
        let DrawCommand::Text { x, y, .. } = &scene.commands()[1] else {
            panic!("label is not text");
        };
        // Bisector of the drawn arc is 01:15, not the 13:15 of the
        // unwrapped midpoint.
        let mid = angle_for_time(time("01:15")) + rotation;
        let expected_x = 100.0 + mid.cos() * 80.0;
        let expected_y = 100.0 + mid.sin() * 80.0;
        assert!((x - expected_x).abs() < 1e-6);
        assert!((y - expected_y).abs() < 1e-6);
    }

    #[test]
    fn wedge_pass_passes_raw_angles_through() {
        let rotation = -FRAC_PI_2;
        let segment =
            Segment::new("19:00", "07:30", Color::new(0x20, 0x30, 0x40), "night").unwrap();
        let face = renderer(
            ClockConfig::builder()
                .radius(100.0)
                .rotation(rotation)
                .segments(vec![segment])
                .build(),
        );
        let mut scene = Scene::new();
        face.push_segments(&mut scene);

        let DrawCommand::Wedge {
            start_angle,
            end_angle,
            ..
        } = &scene.commands()[0]
        else {
            panic!("fill pass should emit a wedge first");
        };
        assert!((start_angle - (angle_for_time(time("19:00")) + rotation)).abs() < EPS);
        assert!((end_angle - (angle_for_time(time("07:30")) + rotation)).abs() < EPS);
        assert!(end_angle < start_angle, "fill pass keeps the raw wrap");
    }

    #[test]
    fn scene_layers_in_fixed_order() {
        let segment =
            Segment::new("09:00", "17:00", Color::new(0xdd, 0xee, 0xff), "work").unwrap();
        let face = renderer(
            ClockConfig::builder()
                .radius(100.0)
                .segments(vec![segment])
                .build(),
        );
        let scene = face.scene(WallClock::new(12, 0, 0, 0));
        let commands = scene.commands();

        // clear, wedge, label, 96 ticks, 24 numerals, hand, pin
        assert_eq!(commands.len(), 1 + 1 + 1 + 96 + 24 + 1 + 1);
        assert!(matches!(commands[0], DrawCommand::Clear(_)));
        assert!(matches!(commands[1], DrawCommand::Wedge { .. }));
        assert!(matches!(commands[2], DrawCommand::Text { .. }));
        assert!(matches!(commands[3], DrawCommand::Line { .. }));
        assert!(matches!(commands[99 + 3], DrawCommand::Text { .. }));
        assert!(matches!(commands.last(), Some(DrawCommand::Circle { .. })));
    }

    #[test]
    fn construction_rejects_degenerate_radius() {
        for radius in [0.0, -5.0] {
            let result = ClockRenderer::new(ClockConfig::builder().radius(radius).build());
            assert!(matches!(result, Err(ClockError::NonPositiveRadius(_))));
        }
    }

    #[test]
    fn construction_rejects_degenerate_scale() {
        let result = ClockRenderer::new(
            ClockConfig::builder()
                .radius(100.0)
                .pixel_density_scale(0.0)
                .build(),
        );
        assert!(matches!(result, Err(ClockError::NonPositiveScale(_))));
    }

    #[test]
    fn pixel_density_scales_backing_buffer_not_layout() {
        let face = renderer(
            ClockConfig::builder()
                .radius(100.0)
                .pixel_density_scale(2.0)
                .build(),
        );
        assert_eq!(face.physical_size(), 400);
        assert!((face.logical_size() - 200.0).abs() < EPS);
    }

    #[test]
    fn render_is_idempotent_for_a_fixed_time() {
        let segments = vec![
            Segment::new("22:00", "06:30", Color::new(0x33, 0x44, 0x66), "sleep").unwrap(),
            Segment::new("09:00", "17:00", Color::new(0xdd, 0xee, 0xff), "work").unwrap(),
        ];
        let face = renderer(
            ClockConfig::builder()
                .radius(40.0)
                .rotation(-FRAC_PI_2)
                .segments(segments)
                .build(),
        );
        let side = face.physical_size() as usize;
        let clock = FixedTime(WallClock::new(7, 30, 0, 0));

        let mut first = vec![0u8; side * side * 4];
        let mut second = vec![0u8; side * side * 4];
        face.render(&mut Canvas::new(&mut first, side, side), &clock);
        face.render(&mut Canvas::new(&mut second, side, side), &clock);
        assert_eq!(first, second);
    }

    #[test]
    fn render_erases_previous_content() {
        let face = renderer(ClockConfig::builder().radius(30.0).build());
        let side = face.physical_size() as usize;
        let clock = FixedTime(WallClock::new(0, 0, 0, 0));

        let mut clean = vec![0u8; side * side * 4];
        face.render(&mut Canvas::new(&mut clean, side, side), &clock);
        // The same render on a buffer full of garbage converges to the same
        // output, so no frame depends on what was drawn before it.
        let mut dirty = vec![0xabu8; side * side * 4];
        face.render(&mut Canvas::new(&mut dirty, side, side), &clock);
        assert_eq!(clean, dirty);
    }

    #[test]
    fn segment_constructor_rejects_malformed_endpoints() {
        assert!(Segment::new("19:00", "7:aa", Color::new(0, 0, 0), "x").is_err());
        assert!(Segment::new("24:00", "07:00", Color::new(0, 0, 0), "x").is_err());
    }

    #[test]
    fn wedge_with_equal_endpoints_draws_nothing() {
        let side = 40usize;
        let angle = angle_for_time(time("09:00"));

        let mut plain = vec![0u8; side * side * 4];
        Canvas::new(&mut plain, side, side).clear((0xff, 0xff, 0xff));

        let mut wedged = vec![0u8; side * side * 4];
        let mut canvas = Canvas::new(&mut wedged, side, side);
        canvas.clear((0xff, 0xff, 0xff));
        fill_wedge(&mut canvas, 20.0, 20.0, 20.0, angle, angle, (0xff, 0x00, 0x00));

        assert_eq!(plain, wedged);
    }
}
