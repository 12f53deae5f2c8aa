// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Frame overlay drawing: the pointer cross, the last-click ring, and their
//! text annotations.
//!
//! The overlays are the model's only feedback channel for closing the
//! coordinate loop, so they are drawn directly onto the frame before JPEG
//! encoding.  Text uses a built-in 5×7 pixel font — pulling in a font
//! rasterizer for a dozen glyphs is not worth the dependency.

use image::{Rgba, RgbaImage};

pub const RED: Rgba<u8> = Rgba([220, 38, 38, 255]);
pub const GREEN: Rgba<u8> = Rgba([22, 163, 74, 255]);

const CROSS_ARM: i32 = 14;
const RING_RADIUS: i32 = 16;

/// Draw a cross centered on `(x, y)` with a text label beside it.
pub fn draw_cross(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, label: &str) {
    for d in -CROSS_ARM..=CROSS_ARM {
        for t in -1..=1 {
            put(img, x + d, y + t, color);
            put(img, x + t, y + d, color);
        }
    }
    draw_label(img, x + CROSS_ARM + 6, y - 4, color, label);
}

/// Draw a two-pixel ring centered on `(x, y)` with a text label beside it.
pub fn draw_ring(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, label: &str) {
    for dy in -(RING_RADIUS + 1)..=(RING_RADIUS + 1) {
        for dx in -(RING_RADIUS + 1)..=(RING_RADIUS + 1) {
            let dist2 = dx * dx + dy * dy;
            let outer = (RING_RADIUS + 1) * (RING_RADIUS + 1);
            let inner = (RING_RADIUS - 1) * (RING_RADIUS - 1);
            if dist2 <= outer && dist2 >= inner {
                put(img, x + dx, y + dy, color);
            }
        }
    }
    draw_label(img, x + RING_RADIUS + 6, y - 4, color, label);
}

fn put(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

// ─── Pixel font ──────────────────────────────────────────────────────────────

const GLYPH_W: i32 = 5;
const GLYPH_H: i32 = 7;
const SCALE: i32 = 2;

/// Render `text` at `(x, y)` (top-left), doubling each font pixel.
/// Glyphs outside the small built-in set render as blanks.
pub fn draw_label(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, text: &str) {
    let mut cx = x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (ry, row) in rows.iter().enumerate() {
                for rx in 0..GLYPH_W {
                    if row & (0b10000 >> rx) != 0 {
                        for sy in 0..SCALE {
                            for sx in 0..SCALE {
                                put(
                                    img,
                                    cx + rx * SCALE + sx,
                                    y + ry as i32 * SCALE + sy,
                                    color,
                                );
                            }
                        }
                    }
                }
            }
        }
        cx += (GLYPH_W + 1) * SCALE;
    }
}

/// 5×7 bitmaps for the glyphs the overlays need: digits, punctuation for
/// coordinate labels, and the letters of "LAST CLICK".
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch.to_ascii_uppercase() {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b01110, 0b10001, 0b00001, 0b00110, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b01110, 0b10000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b01110],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00110, 0b00100, 0b01000],
        ' ' => [0; 7],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        _ => return None,
    };
    Some(rows)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
