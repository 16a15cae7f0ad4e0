//! Colour palettes and a minimal RGB canvas for waveform and spectrogram
//! images.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// An 8-bit RGB colour.
pub type Rgb = [u8; 3];

/// Spectrogram key colours, from silence to full scale. Shared by every scheme.
const SPECTROGRAM_COLORS: [Rgb; 7] = [
    [0, 0, 0],
    [14, 17, 16],
    [40, 50, 76],
    [90, 180, 100],
    [224, 224, 44],
    [255, 60, 30],
    [255, 255, 255],
];

/// Named colour scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorScheme {
    /// Blue → green → yellow → red.
    #[default]
    Default,
    /// Blue → cyan → yellow → red.
    Iso,
    /// Grey → lavender → indigo → brown.
    Purple,
}

impl ColorScheme {
    /// All schemes, in display order.
    pub const ALL: [ColorScheme; 3] = [ColorScheme::Default, ColorScheme::Iso, ColorScheme::Purple];

    /// Key colours, from low to high spectral centroid.
    pub fn waveform_colors(self) -> &'static [Rgb] {
        match self {
            ColorScheme::Default => &[[50, 0, 200], [0, 220, 80], [255, 224, 0], [255, 0, 0]],
            ColorScheme::Iso => &[[0, 0, 255], [0, 255, 255], [255, 255, 0], [255, 0, 0]],
            ColorScheme::Purple => &[[173, 173, 173], [147, 149, 196], [77, 80, 138], [108, 66, 0]],
        }
    }

    /// Key colours, from quiet to loud spectrogram bins.
    pub fn spectrogram_colors(self) -> &'static [Rgb] {
        &SPECTROGRAM_COLORS
    }

    /// Scheme name as used in configuration.
    pub fn name(self) -> &'static str {
        match self {
            ColorScheme::Default => "default",
            ColorScheme::Iso => "iso",
            ColorScheme::Purple => "purple",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown color scheme '{s}' (expected default, iso or purple)"))
    }
}

/// Expands key colours into a palette of `num_colors` linearly interpolated
/// entries. Channel values are truncated, not rounded.
pub fn interpolate_colors(colors: &[Rgb], num_colors: usize) -> Vec<Rgb> {
    match (colors, num_colors) {
        ([], _) | (_, 0) => return Vec::new(),
        ([only], n) => return vec![*only; n],
        (_, 1) => return vec![colors[0]],
        _ => {}
    }
    let segments = (colors.len() - 1) as f64;
    (0..num_colors)
        .map(|i| {
            let index = i as f64 * segments / (num_colors - 1) as f64;
            let lower = index as usize;
            let alpha = index - lower as f64;
            let a = colors[lower];
            let b = colors[(lower + 1).min(colors.len() - 1)];
            let mix = |c: usize| ((1.0 - alpha) * f64::from(a[c]) + alpha * f64::from(b[c])) as u8;
            [mix(0), mix(1), mix(2)]
        })
        .collect()
}

/// Fixed-size RGB image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Canvas {
    /// Creates a canvas filled with `background`.
    pub fn new(width: usize, height: usize, background: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![background; width * height],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at `(x, y)`, if inside the canvas.
    pub fn get(&self, x: i64, y: i64) -> Option<Rgb> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Sets a pixel; coordinates outside the canvas are ignored.
    pub fn set(&mut self, x: i64, y: i64, color: Rgb) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    /// Mixes `color` into the pixel at `(x, y)` with weight `alpha`.
    pub fn blend(&mut self, x: i64, y: i64, color: Rgb, alpha: f32) {
        if let Some(current) = self.get(x, y) {
            let mix = |c: usize| ((1.0 - alpha) * f32::from(current[c]) + alpha * f32::from(color[c])) as u8;
            self.set(x, y, [mix(0), mix(1), mix(2)]);
        }
    }

    /// Draws a one-pixel line between two points (Bresenham).
    pub fn line(&mut self, from: (i64, i64), to: (i64, i64), color: Rgb) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.set(x, y, color);
            if (x, y) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Brightens every pixel of row `y` by `amount`, saturating.
    pub fn brighten_row(&mut self, y: usize, amount: u8) {
        if y >= self.height {
            return;
        }
        for pixel in &mut self.pixels[y * self.width..(y + 1) * self.width] {
            for c in pixel.iter_mut() {
                *c = c.saturating_add(amount);
            }
        }
    }

    /// Writes the canvas as a binary PPM (P6).
    pub fn write_ppm<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "P6\n{} {}\n255\n", self.width, self.height)?;
        for pixel in &self.pixels {
            writer.write_all(pixel)?;
        }
        writer.flush()
    }

    /// Saves the canvas as a PPM file.
    pub fn save_ppm(&self, path: &Path) -> io::Result<()> {
        self.write_ppm(BufWriter::new(File::create(path)?))
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}
