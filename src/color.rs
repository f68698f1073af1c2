// Color Module - sRGB pixel colors and perceptual (HSLuv) helpers
use anyhow::Result;
use palette::white_point::D65;
use palette::{FromColor, Hsluv, Srgb};

/// Lightness below this is treated as black by the tick composition.
const NEAR_BLACK_LIGHTNESS: f64 = 1e-4;

pub const MAX_VELOCITY: u8 = 127;

/// Parse "#rrggbb" or "#rgb" into an sRGB color with components in [0,1].
pub fn from_hex(hex: &str) -> Result<Srgb<f64>> {
    let hex = hex.trim_start_matches('#');
    let (r, g, b) = match hex.len() {
        6 => (
            u8::from_str_radix(&hex[0..2], 16)?,
            u8::from_str_radix(&hex[2..4], 16)?,
            u8::from_str_radix(&hex[4..6], 16)?,
        ),
        3 => {
            let digit = |s: &str| -> Result<u8> {
                let v = u8::from_str_radix(s, 16)?;
                Ok(v * 16 + v)
            };
            (digit(&hex[0..1])?, digit(&hex[1..2])?, digit(&hex[2..3])?)
        }
        _ => anyhow::bail!("invalid hex color: #{}", hex),
    };
    Ok(Srgb::new(
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    ))
}

/// Decompose into HSLuv: hue in degrees, saturation and lightness in [0,1].
pub fn to_hsluv(color: Srgb<f64>) -> (f64, f64, f64) {
    let hsluv: Hsluv<D65, f64> = Hsluv::from_color(color);
    (
        hsluv.hue.into_positive_degrees(),
        hsluv.saturation / 100.0,
        hsluv.l / 100.0,
    )
}

/// Recompose from HSLuv components as produced by [`to_hsluv`].
pub fn from_hsluv(hue: f64, saturation: f64, lightness: f64) -> Srgb<f64> {
    let hsluv: Hsluv<D65, f64> = Hsluv::new(hue, saturation * 100.0, lightness * 100.0);
    Srgb::from_color(hsluv)
}

/// Scale a color's lightness by (velocity/127)^2.2. The gamma exponent
/// compensates for eye response so velocity steps feel linear.
pub fn adjust_to_velocity(color: Srgb<f64>, velocity: u8) -> Srgb<f64> {
    let (h, s, l) = to_hsluv(color);
    let scale = (f64::from(velocity.min(MAX_VELOCITY)) / f64::from(MAX_VELOCITY)).powf(2.2);
    from_hsluv(h, s, l * scale)
}

/// Near-black test used by the tick's "non-black wins" composition.
pub fn is_almost_black(color: Srgb<f64>) -> bool {
    let (_, _, l) = to_hsluv(color);
    l <= NEAR_BLACK_LIGHTNESS
}

pub fn black() -> Srgb<f64> {
    Srgb::new(0.0, 0.0, 0.0)
}

/// Convert to an 8-bit triple, clamping out-of-range float components.
pub fn to_rgb255(color: Srgb<f64>) -> (u8, u8, u8) {
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    (channel(color.red), channel(color.green), channel(color.blue))
}
