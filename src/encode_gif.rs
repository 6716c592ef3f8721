use image::{
    Delay, Frame, RgbaImage,
    codecs::gif::{GifEncoder, Repeat},
};

use crate::{
    compose::composite::flatten_to_opaque,
    config::AnimationSettings,
    foundation::error::{TickerError, TickerResult},
};

#[derive(Clone, Copy, Debug)]
pub struct GifConfig {
    pub frame_delay_ms: u32,
    /// NeuQuant sampling speed, 1 (best) to 30 (fastest).
    pub speed: i32,
    /// Color semi-transparent pixels are flattened onto.
    pub background: [u8; 3],
}

impl GifConfig {
    pub fn from_settings(s: &AnimationSettings) -> Self {
        Self {
            frame_delay_ms: s.frame_delay_ms,
            speed: s.quantize_speed,
            background: s.background,
        }
    }

    pub fn validate(&self) -> TickerResult<()> {
        if self.frame_delay_ms == 0 {
            return Err(TickerError::validation("gif frame delay must be non-zero"));
        }
        if !(1..=30).contains(&self.speed) {
            return Err(TickerError::validation(
                "gif quantize speed must be within 1..=30",
            ));
        }
        Ok(())
    }
}

/// Encodes frames as an infinitely looping GIF with a uniform frame delay.
///
/// Frames are flattened onto the configured background first, so the output
/// carries no transparency and identical input yields identical bytes.
pub fn encode_looping_gif(frames: &[RgbaImage], cfg: &GifConfig) -> TickerResult<Vec<u8>> {
    cfg.validate()?;
    let Some(first) = frames.first() else {
        return Err(TickerError::composition("no frames to encode"));
    };
    let dims = first.dimensions();
    if let Some(bad) = frames.iter().find(|f| f.dimensions() != dims) {
        return Err(TickerError::composition(format!(
            "frame is {}x{}, expected {}x{}",
            bad.width(),
            bad.height(),
            dims.0,
            dims.1
        )));
    }

    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut out, cfg.speed);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| TickerError::composition(format!("gif repeat: {e}")))?;
        for frame in frames {
            let opaque = flatten_to_opaque(frame, cfg.background);
            let delay = Delay::from_numer_denom_ms(cfg.frame_delay_ms, 1);
            encoder
                .encode_frame(Frame::from_parts(opaque, 0, 0, delay))
                .map_err(|e| TickerError::composition(format!("gif encode: {e}")))?;
        }
    }
    tracing::debug!(frames = frames.len(), bytes = out.len(), "encoded gif");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{AnimationDecoder, Rgba, codecs::gif::GifDecoder};

    use super::*;

    fn cfg() -> GifConfig {
        GifConfig {
            frame_delay_ms: 42,
            speed: 10,
            background: [0, 0, 0],
        }
    }

    fn frames(n: u8) -> Vec<RgbaImage> {
        (0..n)
            .map(|i| RgbaImage::from_pixel(12, 8, Rgba([i * 20, 255 - i * 20, 40, 255])))
            .collect()
    }

    #[test]
    fn output_is_a_gif_with_every_frame() {
        let bytes = encode_looping_gif(&frames(6), &cfg()).unwrap();
        assert!(bytes.starts_with(b"GIF89a"));

        let decoded = GifDecoder::new(Cursor::new(&bytes))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(decoded.len(), 6);
        for f in &decoded {
            assert_eq!(f.buffer().dimensions(), (12, 8));
            let (num, den) = f.delay().numer_denom_ms();
            assert_eq!(num / den, 42);
        }
    }

    #[test]
    fn output_loops_forever() {
        let bytes = encode_looping_gif(&frames(2), &cfg()).unwrap();
        // NETSCAPE2.0 application extension with a loop count of zero.
        let pos = bytes
            .windows(11)
            .position(|w| w == b"NETSCAPE2.0")
            .unwrap();
        assert_eq!(&bytes[pos + 11..pos + 15], &[3, 1, 0, 0]);
    }

    #[test]
    fn identical_input_gives_identical_bytes() {
        let a = encode_looping_gif(&frames(4), &cfg()).unwrap();
        let b = encode_looping_gif(&frames(4), &cfg()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_and_mixed_sizes() {
        assert!(encode_looping_gif(&[], &cfg()).is_err());
        let mixed = vec![RgbaImage::new(4, 4), RgbaImage::new(5, 4)];
        assert!(encode_looping_gif(&mixed, &cfg()).is_err());

        let bad = GifConfig {
            speed: 0,
            ..cfg()
        };
        assert!(encode_looping_gif(&frames(1), &bad).is_err());
    }
}
