// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::io::Cursor;
use std::sync::Mutex;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use image::RgbaImage;
use tracing::debug;

use glimt_decision::coords;

use crate::error::ScreenError;
use crate::overlay;

/// One raw frame from a display, as tightly-packed RGBA bytes.
///
/// Keeping the boundary at raw bytes (rather than an `image` type) lets any
/// grabbing backend feed the capturer regardless of which image-crate
/// version it links.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Source of raw frames.  The production implementation grabs the primary
/// display; tests substitute fixed frames.
pub trait ScreenSource: Send + Sync {
    fn grab(&self) -> Result<Frame, ScreenError>;
}

/// Source of the current pointer position in physical pixels.
pub trait PointerProbe: Send + Sync {
    fn position(&self) -> Option<(i32, i32)>;
}

/// Grabs the primary display via the `screenshots` backend.
pub struct DisplayGrabber;

impl ScreenSource for DisplayGrabber {
    fn grab(&self) -> Result<Frame, ScreenError> {
        let screens = screenshots::Screen::all()
            .map_err(|e| ScreenError::UnavailableScreen(e.to_string()))?;
        let screen = screens
            .into_iter()
            .next()
            .ok_or_else(|| ScreenError::UnavailableScreen("no display found".into()))?;
        let img = screen
            .capture()
            .map_err(|e| ScreenError::UnavailableScreen(e.to_string()))?;
        Ok(Frame {
            width: img.width(),
            height: img.height(),
            rgba: img.into_raw(),
        })
    }
}

/// Physical frame dimensions plus the normalized↔pixel mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureMeta {
    pub width: u32,
    pub height: u32,
}

impl CaptureMeta {
    /// Normalized [0,1000] → physical pixels, clamped onto the screen.
    pub fn to_physical(&self, nx: i64, ny: i64) -> (u32, u32) {
        (
            coords::to_physical(nx, self.width),
            coords::to_physical(ny, self.height),
        )
    }

    /// Physical pixels → normalized [0,1000].
    pub fn to_normalized(&self, px: u32, py: u32) -> (i64, i64) {
        (
            coords::to_normalized(px, self.width),
            coords::to_normalized(py, self.height),
        )
    }
}

/// A captured, overlaid, JPEG-encoded frame.
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Base64 of the JPEG bytes (no data-URL prefix).
    pub base64: String,
    pub meta: CaptureMeta,
}

impl Screenshot {
    /// Return a data URL: `data:image/jpeg;base64,<b64>`.
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.base64)
    }
}

/// The screen capturer: grabs a frame, composes the pointer cross and the
/// last-click ring, and encodes the result for the model.
pub struct Capturer {
    source: Box<dyn ScreenSource>,
    pointer: Box<dyn PointerProbe>,
    jpeg_quality: u8,
    /// Most recent click in physical pixels, drawn as the green ring on the
    /// next frame.  Written by the executor after each click action.
    last_click: Mutex<Option<(u32, u32)>>,
    /// Size of the last grabbed frame, used to translate coordinates between
    /// captures.
    last_size: Mutex<Option<CaptureMeta>>,
}

impl Capturer {
    pub fn new(source: Box<dyn ScreenSource>, pointer: Box<dyn PointerProbe>) -> Self {
        Self {
            source,
            pointer,
            jpeg_quality: 80,
            last_click: Mutex::new(None),
            last_size: Mutex::new(None),
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Grab one frame, render the overlays, and encode it as base64 JPEG.
    pub fn capture(&self) -> Result<Screenshot, ScreenError> {
        let frame = self.source.grab()?;
        let meta = CaptureMeta {
            width: frame.width,
            height: frame.height,
        };
        *self.last_size.lock().unwrap() = Some(meta);

        let mut img = RgbaImage::from_raw(frame.width, frame.height, frame.rgba)
            .ok_or_else(|| ScreenError::Encode("frame buffer size mismatch".into()))?;

        if let Some((cx, cy)) = self.pointer.position() {
            let px = (cx.max(0) as u32).min(meta.width.saturating_sub(1));
            let py = (cy.max(0) as u32).min(meta.height.saturating_sub(1));
            let (nx, ny) = meta.to_normalized(px, py);
            overlay::draw_cross(
                &mut img,
                px as i32,
                py as i32,
                overlay::RED,
                &format!("({nx}, {ny})"),
            );
        }

        if let Some((px, py)) = *self.last_click.lock().unwrap() {
            overlay::draw_ring(&mut img, px as i32, py as i32, overlay::GREEN, "LAST CLICK");
        }

        let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
        let mut out = Cursor::new(Vec::new());
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| ScreenError::Encode(e.to_string()))?;

        let bytes = out.into_inner();
        debug!(
            width = meta.width,
            height = meta.height,
            jpeg_bytes = bytes.len(),
            "captured frame"
        );
        Ok(Screenshot {
            base64: B64.encode(&bytes),
            meta,
        })
    }

    /// Translate a normalized coordinate pair into physical pixels, clamped
    /// onto the last observed screen bounds.
    ///
    /// Falls back to grabbing the display size when no capture has happened
    /// yet in this process.
    pub fn to_physical_safe(&self, nx: i64, ny: i64) -> Result<(u32, u32), ScreenError> {
        let existing = *self.last_size.lock().unwrap();
        let meta = match existing {
            Some(m) => m,
            None => {
                let frame = self.source.grab()?;
                let m = CaptureMeta {
                    width: frame.width,
                    height: frame.height,
                };
                *self.last_size.lock().unwrap() = Some(m);
                m
            }
        };
        Ok(meta.to_physical(nx, ny))
    }

    /// Record a click position (physical pixels) for the next frame's ring.
    pub fn record_click(&self, px: u32, py: u32) {
        *self.last_click.lock().unwrap() = Some((px, py));
    }

    /// The last recorded click, if any.
    pub fn last_click(&self) -> Option<(u32, u32)> {
        *self.last_click.lock().unwrap()
    }
}

// ─── Test doubles ────────────────────────────────────────────────────────────

/// A source that always returns the same solid-color frame.  Public so the
/// core crate's loop tests can run without a display.
pub struct StaticFrameSource {
    pub width: u32,
    pub height: u32,
}

impl ScreenSource for StaticFrameSource {
    fn grab(&self) -> Result<Frame, ScreenError> {
        Ok(Frame {
            width: self.width,
            height: self.height,
            rgba: vec![40u8; (self.width * self.height * 4) as usize],
        })
    }
}

/// A source that always fails, for exercising the recoverable-capture path.
pub struct FailingSource;

impl ScreenSource for FailingSource {
    fn grab(&self) -> Result<Frame, ScreenError> {
        Err(ScreenError::UnavailableScreen("display locked".into()))
    }
}

/// A pointer probe pinned to a fixed position (or none).
pub struct FixedPointer(pub Option<(i32, i32)>);

impl PointerProbe for FixedPointer {
    fn position(&self) -> Option<(i32, i32)> {
        self.0
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn capturer(w: u32, h: u32) -> Capturer {
        Capturer::new(
            Box::new(StaticFrameSource {
                width: w,
                height: h,
            }),
            Box::new(FixedPointer(Some((w as i32 / 2, h as i32 / 2)))),
        )
    }

    #[test]
    fn capture_produces_base64_jpeg() {
        let shot = capturer(320, 200).capture().unwrap();
        assert_eq!(shot.meta, CaptureMeta { width: 320, height: 200 });
        let bytes = B64.decode(&shot.base64).unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert!(shot.to_data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn capture_without_pointer_still_works() {
        let c = Capturer::new(
            Box::new(StaticFrameSource {
                width: 64,
                height: 64,
            }),
            Box::new(FixedPointer(None)),
        );
        assert!(c.capture().is_ok());
    }

    #[test]
    fn capture_failure_surfaces_unavailable_screen() {
        let c = Capturer::new(Box::new(FailingSource), Box::new(FixedPointer(None)));
        match c.capture() {
            Err(ScreenError::UnavailableScreen(msg)) => assert!(msg.contains("display locked")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn to_physical_safe_uses_last_frame_size() {
        let c = capturer(1920, 1080);
        c.capture().unwrap();
        assert_eq!(c.to_physical_safe(500, 500).unwrap(), (960, 540));
        assert_eq!(c.to_physical_safe(0, 0).unwrap(), (0, 0));
        assert_eq!(c.to_physical_safe(1000, 1000).unwrap(), (1919, 1079));
    }

    #[test]
    fn to_physical_safe_clamps_out_of_range() {
        let c = capturer(800, 600);
        c.capture().unwrap();
        assert_eq!(c.to_physical_safe(-10, 2000).unwrap(), (0, 599));
    }

    #[test]
    fn to_physical_safe_without_prior_capture_grabs_size() {
        let c = capturer(640, 480);
        assert_eq!(c.to_physical_safe(1000, 0).unwrap(), (639, 0));
    }

    #[test]
    fn record_click_is_readable_back() {
        let c = capturer(100, 100);
        assert_eq!(c.last_click(), None);
        c.record_click(42, 24);
        assert_eq!(c.last_click(), Some((42, 24)));
    }

    #[test]
    fn capture_after_click_draws_green_ring() {
        let c = capturer(200, 200);
        c.record_click(100, 100);
        let shot = c.capture().unwrap();
        // The ring must survive JPEG encoding as green-ish pixels near the
        // click.  Decode and probe the ring radius.
        let bytes = B64.decode(&shot.base64).unwrap();
        let img = image::load_from_memory(&bytes).unwrap().to_rgb8();
        let p = img.get_pixel(100 + 16, 100);
        assert!(
            p[1] > p[0] + 40 && p[1] > p[2] + 40,
            "expected green ring pixel, got {p:?}"
        );
    }

    #[test]
    fn meta_round_trip_is_stable() {
        let meta = CaptureMeta {
            width: 1280,
            height: 720,
        };
        let (px, py) = meta.to_physical(250, 750);
        let (nx, ny) = meta.to_normalized(px, py);
        assert!((nx - 250).abs() <= 1);
        assert!((ny - 750).abs() <= 1);
    }
}
