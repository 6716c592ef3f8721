use image::{Rgba, RgbaImage};

/// Blends `src` into `dst` using `mask` as coverage, on every channel
/// including alpha.
pub fn blend_masked(dst: [u8; 4], src: [u8; 4], mask: u8) -> [u8; 4] {
    if mask == 0 {
        return dst;
    }
    if mask == 255 {
        return src;
    }
    let m = u16::from(mask);
    let inv = 255u16 - m;
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = add_sat_u8(
            mul_div255(u16::from(src[i]), m),
            mul_div255(u16::from(dst[i]), inv),
        );
    }
    out
}

/// Paints a solid color over `dst` at the given coverage, keeping dst alpha.
pub fn paint(dst: [u8; 4], color: [u8; 3], coverage: u8) -> [u8; 4] {
    let [r, g, b] = color;
    let out = blend_masked(dst, [r, g, b, dst[3]], coverage);
    [out[0], out[1], out[2], dst[3]]
}

/// Pastes `src` onto `dst` with its top-left corner at (`x`, `y`), using the
/// source alpha channel as the paste mask. The destination keeps its own
/// alpha. Parts outside `dst` are clipped.
pub fn paste_with_alpha_mask(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64) {
    let (dw, dh) = (i64::from(dst.width()), i64::from(dst.height()));
    for (sx, sy, px) in src.enumerate_pixels() {
        let dx = x + i64::from(sx);
        let dy = y + i64::from(sy);
        if dx < 0 || dy < 0 || dx >= dw || dy >= dh {
            continue;
        }
        let d = dst.get_pixel_mut(dx as u32, dy as u32);
        let [r, g, b, a] = px.0;
        *d = Rgba(paint(d.0, [r, g, b], a));
    }
}

/// Replaces the alpha of every pixel.
pub fn set_alpha(img: &mut RgbaImage, alpha: u8) {
    for px in img.pixels_mut() {
        px.0[3] = alpha;
    }
}

/// Drops alpha by compositing straight-alpha pixels over an opaque background.
pub fn flatten_to_opaque(img: &RgbaImage, bg: [u8; 3]) -> RgbaImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let a = px.0[3];
        if a == 255 {
            continue;
        }
        let [r, g, b, _] = blend_masked([bg[0], bg[1], bg[2], 255], [px.0[0], px.0[1], px.0[2], 255], a);
        px.0 = [r, g, b, 255];
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}
