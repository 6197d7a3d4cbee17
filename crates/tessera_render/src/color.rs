//! Packed ARGB helpers.
//!
//! Colors are `0xAARRGGBB` in a `u32`, the layout of the region pixel buffer.

/// Fully transparent black; what missing chunks render as.
pub const TRANSPARENT: u32 = 0;

/// Packs four channels.
#[inline]
#[must_use]
pub const fn pack(a: u8, r: u8, g: u8, b: u8) -> u32 {
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Splits a color into `[a, r, g, b]`.
#[inline]
#[must_use]
pub const fn unpack(argb: u32) -> [u8; 4] {
    [
        (argb >> 24) as u8,
        (argb >> 16) as u8,
        (argb >> 8) as u8,
        argb as u8,
    ]
}

/// Alpha channel.
#[inline]
#[must_use]
pub const fn alpha(argb: u32) -> u8 {
    (argb >> 24) as u8
}

/// Replaces the alpha channel.
#[inline]
#[must_use]
pub const fn with_alpha(argb: u32, a: u8) -> u32 {
    (argb & 0x00FF_FFFF) | ((a as u32) << 24)
}

/// Multiplies the color channels by `factor / 256`, saturating at 255.
/// Alpha is kept.
#[inline]
#[must_use]
pub fn scale_rgb(argb: u32, factor: u32) -> u32 {
    let [a, r, g, b] = unpack(argb);
    let scale = |c: u8| ((u32::from(c) * factor) >> 8).min(255) as u8;
    pack(a, scale(r), scale(g), scale(b))
}

/// Multiplies two colors channel-wise (tinting), alpha included.
#[inline]
#[must_use]
pub fn multiply(lhs: u32, rhs: u32) -> u32 {
    let l = unpack(lhs);
    let r = unpack(rhs);
    let mul = |i: usize| ((u32::from(l[i]) * u32::from(r[i]) + 127) / 255) as u8;
    pack(mul(0), mul(1), mul(2), mul(3))
}
