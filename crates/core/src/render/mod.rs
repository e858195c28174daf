use serde::{Deserialize, Serialize};

use crate::config::VisualizerConfig;

/// 2D drawing surface the visualiser paints on.
pub trait Canvas {
    fn width(&self) -> f32;

    fn height(&self) -> f32;

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    /// Sets the colour used by subsequent fills. Unparsable styles are
    /// ignored and the previous colour stays active.
    fn set_fill_style(&mut self, style: &str);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    fn set_image_smoothing(&mut self, _enabled: bool) {}
}

/// Straight RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rgb`, `#rrggbb`, `rgb(r, g, b)` and `rgba(r, g, b, a)`.
    pub fn parse(style: &str) -> Option<Self> {
        let style = style.trim();
        if let Some(hex) = style.strip_prefix('#') {
            return parse_hex(hex);
        }
        if let Some(body) = style
            .strip_prefix("rgba(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<&str> = body.split(',').map(str::trim).collect();
            if parts.len() != 4 {
                return None;
            }
            let alpha: f32 = parts[3].parse().ok()?;
            return Some(Self::new(
                parts[0].parse().ok()?,
                parts[1].parse().ok()?,
                parts[2].parse().ok()?,
                (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ));
        }
        if let Some(body) = style
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<&str> = body.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return None;
            }
            return Some(Self::new(
                parts[0].parse().ok()?,
                parts[1].parse().ok()?,
                parts[2].parse().ok()?,
                255,
            ));
        }
        None
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let channel = |digits: &str| u8::from_str_radix(digits, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (slot, index) in out.iter_mut().zip(0..3) {
                let digit = channel(hex.get(index..index + 1)?)?;
                *slot = digit * 17;
            }
            Some(Rgba::new(out[0], out[1], out[2], 255))
        }
        6 => Some(Rgba::new(
            channel(hex.get(0..2)?)?,
            channel(hex.get(2..4)?)?,
            channel(hex.get(4..6)?)?,
            255,
        )),
        _ => None,
    }
}

/// In-memory raster canvas.
#[derive(Debug, Clone)]
pub struct SoftwareCanvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
    fill: Rgba,
    smoothing: bool,
}

impl SoftwareCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width as usize * height as usize],
            fill: Rgba::BLACK,
            smoothing: true,
        }
    }

    /// Changes the surface size. Like a browser canvas, resizing wipes it.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![Rgba::TRANSPARENT; width as usize * height as usize];
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Number of pixels that are not fully transparent.
    pub fn painted_pixels(&self) -> usize {
        self.pixels.iter().filter(|pixel| pixel.a != 0).count()
    }

    pub fn fill_color(&self) -> Rgba {
        self.fill
    }

    pub fn image_smoothing(&self) -> bool {
        self.smoothing
    }

    fn span(&self, origin: f32, extent: f32, limit: u32) -> std::ops::Range<usize> {
        let (start, end) = if extent < 0.0 {
            (origin + extent, origin)
        } else {
            (origin, origin + extent)
        };
        let clamp = |value: f32| value.round().clamp(0.0, limit as f32) as usize;
        clamp(start)..clamp(end)
    }

    fn paint(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        let columns = self.span(x, width, self.width);
        let rows = self.span(y, height, self.height);
        let stride = self.width as usize;
        for row in rows {
            let line = &mut self.pixels[row * stride..(row + 1) * stride];
            line[columns.clone()].fill(color);
        }
    }
}

impl Canvas for SoftwareCanvas {
    fn width(&self) -> f32 {
        self.width as f32
    }

    fn height(&self) -> f32 {
        self.height as f32
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.paint(x, y, width, height, Rgba::TRANSPARENT);
    }

    fn set_fill_style(&mut self, style: &str) {
        if let Some(color) = Rgba::parse(style) {
            self.fill = color;
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.paint(x, y, width, height, self.fill);
    }

    fn set_image_smoothing(&mut self, enabled: bool) {
        self.smoothing = enabled;
    }
}

/// Geometry of one painted bar in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Width shared by every bar: a fixed fraction of the canvas width split
/// across a row of `bars` bars.
pub fn bar_width(canvas_width: f32, bars: usize, config: &VisualizerConfig) -> f32 {
    canvas_width * config.thickness_scalar / bars.max(1) as f32
}

/// Lays out one bar per magnitude, left to right and vertically centred.
/// Heights are half the magnitude, rounded down.
pub fn layout_bars(
    magnitudes: &[u8],
    canvas_width: f32,
    canvas_height: f32,
    config: &VisualizerConfig,
) -> Vec<Bar> {
    let width = bar_width(canvas_width, magnitudes.len(), config);
    let mut x = 0.0;
    magnitudes
        .iter()
        .map(|magnitude| {
            let height = f32::from(magnitude / 2);
            let bar = Bar {
                x,
                y: canvas_height / 2.0 - height / 2.0,
                width,
                height,
            };
            x += width + config.bar_spacing;
            bar
        })
        .collect()
}
