//! FFT wrapper with windowing functions

use rustfft::{FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::sync::Arc;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Rectangular (no windowing)
    Rectangular,
    /// Hann window (raised cosine)
    Hann,
    /// Hamming window
    Hamming,
    /// Blackman window
    Blackman,
}

impl Window {
    /// Apply window to a buffer.
    ///
    /// Uses the symmetric form, so both edges of a Hann window are zero.
    pub fn apply(&self, buffer: &mut [f32]) {
        let n = buffer.len();
        if n < 2 {
            return;
        }
        let denom = (n - 1) as f32;
        match self {
            Window::Rectangular => {}
            Window::Hann => {
                for (i, sample) in buffer.iter_mut().enumerate() {
                    *sample *= 0.5 - 0.5 * (2.0 * PI * i as f32 / denom).cos();
                }
            }
            Window::Hamming => {
                for (i, sample) in buffer.iter_mut().enumerate() {
                    *sample *= 0.54 - 0.46 * (2.0 * PI * i as f32 / denom).cos();
                }
            }
            Window::Blackman => {
                for (i, sample) in buffer.iter_mut().enumerate() {
                    let x = 2.0 * PI * i as f32 / denom;
                    *sample *= 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos();
                }
            }
        }
    }

    /// Get window coefficients
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        let mut coeffs = vec![1.0; size];
        self.apply(&mut coeffs);
        coeffs
    }
}

/// Forward FFT with a cached plan and window.
pub struct Fft {
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    size: usize,
    scratch: Vec<Complex<f32>>,
}

impl Fft {
    /// Create a forward FFT of `size` points using `window`.
    pub fn new(size: usize, window: Window) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self {
            fft,
            window: window.coefficients(size),
            size,
            scratch: Vec::with_capacity(size),
        }
    }

    /// Get FFT size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Windowed magnitude spectrum of `input`, normalized by the FFT size.
    ///
    /// Input shorter than the FFT size is zero-padded before windowing;
    /// longer input is truncated. Returns `size / 2 + 1` bins (DC to Nyquist).
    pub fn magnitudes(&mut self, input: &[f32]) -> Vec<f32> {
        self.scratch.clear();
        self.scratch.extend(
            input
                .iter()
                .take(self.size)
                .map(|&x| Complex::new(x, 0.0)),
        );
        self.scratch.resize(self.size, Complex::new(0.0, 0.0));
        for (c, w) in self.scratch.iter_mut().zip(&self.window) {
            c.re *= w;
        }

        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.size as f32;
        self.scratch[..=self.size / 2]
            .iter()
            .map(|c| c.norm() * scale)
            .collect()
    }
}
