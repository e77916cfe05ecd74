//! Graph sink display colour (§4.7): literal RGB, or HSV converted by an
//! integer-only routine for reproducibility across the GUI and any
//! embedded tooling that shares it.

use serde::{Deserialize, Serialize};

/// An RGB triple as the device/GUI would display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

/// A graph's declared colour: literal RGB, or HSV to be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColorSpec {
    /// Literal RGB triple.
    Rgb(Rgb),
    /// HSV triple: hue in `0..360`, saturation/value in `0..100`.
    Hsv {
        /// Hue in degrees, `0..=360`.
        h: u16,
        /// Saturation percentage, `0..=100`.
        s: u8,
        /// Value (brightness) percentage, `0..=100`.
        v: u8,
    },
}

impl ColorSpec {
    /// Resolve to a concrete RGB triple, converting HSV if needed.
    pub fn to_rgb(self) -> Rgb {
        match self {
            ColorSpec::Rgb(rgb) => rgb,
            ColorSpec::Hsv { h, s, v } => hsv_to_rgb(h, s, v),
        }
    }
}

/// Integer-only HSV to RGB conversion.
///
/// `h` is degrees in `0..=360`, `s` and `v` are percentages in `0..=100`.
/// All arithmetic uses `u8`/`u16` multiplies and right-shifts in place of
/// division by 255, matching the embedded routine this mirrors.
pub fn hsv_to_rgb(h: u16, s: u8, v: u8) -> Rgb {
    // Rescale value to 0..255.
    let v255 = ((v as u32 * 255 + 50) / 100) as u8;

    if s == 0 {
        return Rgb {
            r: v255,
            g: v255,
            b: v255,
        };
    }

    let s255: u32 = (s as u32 * 255 + 50) / 100;

    // Sector taken from hue degrees directly, not from hue rescaled to
    // 0..255 first. See DESIGN.md's dpp-pipeline section.
    let h = (h % 360) as u32;
    let sector = h / 60;
    let remainder_deg = h - sector * 60;
    let remainder = (remainder_deg * 255 + 30) / 60;

    let p = ((v255 as u32 * (255 - s255)) >> 8) as u8;
    let q = ((v255 as u32 * (255 - ((s255 * remainder) >> 8))) >> 8) as u8;
    let t = ((v255 as u32 * (255 - ((s255 * (255 - remainder)) >> 8))) >> 8) as u8;

    match sector {
        0 => Rgb {
            r: v255,
            g: t,
            b: p,
        },
        1 => Rgb {
            r: q,
            g: v255,
            b: p,
        },
        2 => Rgb {
            r: p,
            g: v255,
            b: t,
        },
        3 => Rgb {
            r: p,
            g: q,
            b: v255,
        },
        4 => Rgb {
            r: t,
            g: p,
            b: v255,
        },
        _ => Rgb {
            r: v255,
            g: p,
            b: q,
        },
    }
}
