use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::{
    assets::decode::{fit_to_canvas, read_image},
    config::FrameSourceSettings,
    foundation::{
        core::Canvas,
        error::{TickerError, TickerResult},
    },
};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp"];

/// Decodes a frame sequence at `canvas` size.
///
/// A directory is read as an image sequence sorted by file name; any other
/// path is decoded as a video with the system `ffmpeg`.
pub fn load_frame_sequence(
    source: &FrameSourceSettings,
    canvas: Canvas,
) -> TickerResult<Vec<RgbaImage>> {
    let frames = if source.path.is_dir() {
        load_image_sequence(&source.path, canvas)?
    } else {
        decode_video_frames_rgba8(&source.path, canvas)?
    };
    let total = frames.len();
    let frames: Vec<RgbaImage> = frames.into_iter().skip(source.skip_frames).collect();
    tracing::info!(
        source = %source.path.display(),
        decoded = total,
        kept = frames.len(),
        "loaded frame sequence"
    );
    Ok(frames)
}

pub fn load_image_sequence(dir: &Path, canvas: Canvas) -> TickerResult<Vec<RgbaImage>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| TickerError::asset(format!("read frame dir '{}': {e}", dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|p| read_image(p).map(|img| fit_to_canvas(img, canvas)))
        .collect()
}

pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(feature = "media-ffmpeg")]
pub fn decode_video_frames_rgba8(source: &Path, canvas: Canvas) -> TickerResult<Vec<RgbaImage>> {
    if !source.exists() {
        return Err(TickerError::asset(format!(
            "video '{}' does not exist",
            source.display()
        )));
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(source)
        .args([
            "-vf",
            &format!("scale={}:{}", canvas.width, canvas.height),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| TickerError::asset(format!("failed to run ffmpeg for video decode: {e}")))?;

    if !out.status.success() {
        return Err(TickerError::asset(format!(
            "ffmpeg video decode failed for '{}': {}",
            source.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    split_raw_frames(out.stdout, canvas)
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_video_frames_rgba8(source: &Path, _canvas: Canvas) -> TickerResult<Vec<RgbaImage>> {
    Err(TickerError::asset(format!(
        "decoding video '{}' requires the 'media-ffmpeg' feature; use a frame directory instead",
        source.display()
    )))
}

/// Splits a tightly packed rawvideo RGBA stream into frames.
pub(crate) fn split_raw_frames(raw: Vec<u8>, canvas: Canvas) -> TickerResult<Vec<RgbaImage>> {
    let frame_len = canvas.width as usize * canvas.height as usize * 4;
    if frame_len == 0 {
        return Err(TickerError::asset(
            "decoded video frame size is zero (invalid output dimensions)",
        ));
    }
    if !raw.len().is_multiple_of(frame_len) {
        return Err(TickerError::asset(format!(
            "decoded video has invalid size: got {} bytes, expected multiples of {frame_len}",
            raw.len()
        )));
    }

    raw.chunks_exact(frame_len)
        .map(|chunk| {
            RgbaImage::from_raw(canvas.width, canvas.height, chunk.to_vec())
                .ok_or_else(|| TickerError::asset("raw frame does not match output size"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "tickerloop_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn image_sequence_is_sorted_resized_and_skipped() {
        let dir = temp_dir("media_sequence");
        std::fs::create_dir_all(&dir).unwrap();
        for (i, name) in ["002.png", "000.png", "001.png"].iter().enumerate() {
            let shade = [20u8, 0, 10][i];
            RgbaImage::from_pixel(16, 16, image::Rgba([shade, shade, shade, 255]))
                .save(dir.join(name))
                .unwrap();
        }
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let canvas = Canvas {
            width: 8,
            height: 4,
        };
        let source = FrameSourceSettings {
            path: dir.clone(),
            skip_frames: 1,
        };
        let frames = load_frame_sequence(&source, canvas).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.dimensions() == (8, 4)));
        assert_eq!(frames[0].get_pixel(0, 0).0[0], 10);
        assert_eq!(frames[1].get_pixel(0, 0).0[0], 20);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn raw_stream_splits_into_frames() {
        let canvas = Canvas {
            width: 2,
            height: 1,
        };
        let raw: Vec<u8> = (0..24).collect();
        let frames = split_raw_frames(raw, canvas).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].get_pixel(1, 0).0, [20, 21, 22, 23]);

        assert!(split_raw_frames(vec![0; 7], canvas).is_err());
    }

    #[test]
    fn missing_video_is_an_asset_error() {
        let source = FrameSourceSettings {
            path: temp_dir("missing").join("nope.webm"),
            skip_frames: 0,
        };
        let err = load_frame_sequence(
            &source,
            Canvas {
                width: 4,
                height: 4,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("asset error"));
    }

    #[test]
    fn video_decode_produces_requested_size() {
        if !cfg!(feature = "media-ffmpeg") || !is_ffmpeg_on_path() {
            return;
        }
        let dir = temp_dir("media_video");
        std::fs::create_dir_all(&dir).unwrap();
        let video = dir.join("clip.mp4");
        let status = std::process::Command::new("ffmpeg")
            .args([
                "-v",
                "error",
                "-y",
                "-f",
                "lavfi",
                "-i",
                "testsrc=size=64x64:rate=10",
                "-t",
                "1",
                "-pix_fmt",
                "yuv420p",
            ])
            .arg(&video)
            .status()
            .unwrap();
        if !status.success() {
            return;
        }

        let source = FrameSourceSettings {
            path: video,
            skip_frames: 4,
        };
        let frames = load_frame_sequence(
            &source,
            Canvas {
                width: 32,
                height: 16,
            },
        )
        .unwrap();
        assert_eq!(frames.len(), 6);
        assert!(frames.iter().all(|f| f.dimensions() == (32, 16)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
