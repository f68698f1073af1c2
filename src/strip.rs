// Strip Module - Shared per-pixel color state and frame snapshots
use palette::Srgb;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::color;

const SLOW_SNAPSHOT: Duration = Duration::from_millis(3);

/// Fixed-size ordered sequence of pixel colors. Sole authority on the
/// current frame bytes; effects never touch it directly, the registry
/// commits their composed output once per tick.
pub struct Strip {
    pixels: RwLock<Vec<Srgb<f64>>>,
    len: usize,
}

impl Strip {
    pub fn new(len: usize) -> Self {
        log::info!("Initialized strip with {} LEDs", len);
        Strip {
            pixels: RwLock::new(vec![color::black(); len]),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Set a single pixel, bypassing the effect pipeline. Out-of-range
    /// indices are dropped. Byte components are interpreted on the 0..255
    /// scale.
    pub fn set_pixel(&self, index: usize, on: bool, red: u8, green: u8, blue: u8) {
        if index >= self.len {
            log::debug!("set_pixel: index {} out of range (strip is {})", index, self.len);
            return;
        }
        let color = if on {
            Srgb::new(
                f64::from(red) / 255.0,
                f64::from(green) / 255.0,
                f64::from(blue) / 255.0,
            )
        } else {
            color::black()
        };
        self.pixels.write().unwrap()[index] = color;
    }

    /// Set the half-open pixel range [first, last), bypassing effects.
    pub fn set_range(&self, first: usize, last: usize, on: bool, red: u8, green: u8, blue: u8) {
        let last = last.min(self.len);
        if first >= last {
            return;
        }
        let color = if on {
            Srgb::new(
                f64::from(red) / 255.0,
                f64::from(green) / 255.0,
                f64::from(blue) / 255.0,
            )
        } else {
            color::black()
        };
        let mut pixels = self.pixels.write().unwrap();
        for pixel in &mut pixels[first..last] {
            *pixel = color;
        }
    }

    /// Replace the whole frame with the animator's composed scratch array.
    /// The write lock makes the commit atomic with respect to snapshots.
    pub fn commit(&self, frame: &[Srgb<f64>]) {
        debug_assert_eq!(frame.len(), self.len);
        let mut pixels = self.pixels.write().unwrap();
        pixels.copy_from_slice(frame);
    }

    /// Snapshot the current frame as 3·N device-order bytes, applying the
    /// output color correction. Correction is never stored back.
    pub fn snapshot_frame(&self) -> Vec<u8> {
        let start = Instant::now();
        let mut frame = Vec::with_capacity(self.len * 3);
        {
            let pixels = self.pixels.read().unwrap();
            for pixel in pixels.iter() {
                let (r, g, b) = color::to_rgb255(*pixel);
                let (r, g, b) = color_correction(r, g, b);
                frame.push(r);
                frame.push(g);
                frame.push(b);
            }
        }
        if start.elapsed() > SLOW_SNAPSHOT {
            log::warn!("snapshot_frame() -> {:?}", start.elapsed());
        }
        frame
    }
}

/// Per-channel output correction for the strip hardware. Green and blue
/// are attenuated harder at higher levels; red passes through.
fn color_correction(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let g_factor = if g > 15 {
        0.43
    } else if g > 5 {
        0.60
    } else {
        0.75
    };
    let b_factor = if b > 15 {
        0.30
    } else if b > 5 {
        0.45
    } else {
        0.53
    };
    (
        r,
        (f64::from(g) * g_factor) as u8,
        (f64::from(b) * b_factor) as u8,
    )
}
