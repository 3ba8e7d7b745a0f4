//! Snapshot encoding: packs the canvas into a 24-bit top-down BMP, base64s
//! it, and prefixes the data-URI tag the on-screen view expects.
//!
//! Both the header packing and the base64 alphabet/padding are produced by
//! hand — the output must stay bit-for-bit compatible with the existing
//! consumers, so no codec crate is involved on this path.

use rayon::prelude::*;

use crate::canvas::PixelCanvas;

/// Format tag prepended to every snapshot payload.
pub const DATA_URI_PREFIX: &str = "data:image/bmp;base64,";

/// BITMAPFILEHEADER (14) + BITMAPINFOHEADER (40).
const HEADER_SIZE: usize = 54;

/// ~72 DPI in pixels per meter, both axes.
const PIXELS_PER_METER: i32 = 2835;

/// Encode the canvas as a complete BMP file: 54-byte header followed by
/// 24-bit BGR rows, each padded to a multiple of 4 bytes.  Height is written
/// negative to signal top-down row order, which lets rows be emitted in
/// buffer order.
pub fn encode_bmp(canvas: &PixelCanvas) -> Vec<u8> {
    let width = canvas.width();
    let height = canvas.height();
    let row_size = ((width as usize * 24 + 31) / 32) * 4;
    let pixel_data_size = row_size * height as usize;
    let file_size = HEADER_SIZE + pixel_data_size;

    let mut out = Vec::with_capacity(file_size);

    // BITMAPFILEHEADER
    out.extend_from_slice(&0x4D42u16.to_le_bytes()); // "BM"
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // reserved1
    out.extend_from_slice(&0u16.to_le_bytes()); // reserved2
    out.extend_from_slice(&(HEADER_SIZE as u32).to_le_bytes()); // data offset

    // BITMAPINFOHEADER
    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(-(height as i32)).to_le_bytes()); // top-down
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&24u16.to_le_bytes()); // bits per pixel
    out.extend_from_slice(&0u32.to_le_bytes()); // no compression
    out.extend_from_slice(&(pixel_data_size as u32).to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // colors used
    out.extend_from_slice(&0u32.to_le_bytes()); // colors important
    debug_assert_eq!(out.len(), HEADER_SIZE);

    // Rows are independent — pack them in parallel, then append in order.
    let pixels = canvas.pixels();
    let rows: Vec<Vec<u8>> = (0..height as usize)
        .into_par_iter()
        .map(|y| {
            let mut row = vec![0u8; row_size];
            let base = y * width as usize;
            for x in 0..width as usize {
                let pixel = pixels[base + x];
                let pos = x * 3;
                row[pos] = (pixel & 0xFF) as u8; // blue
                row[pos + 1] = ((pixel >> 8) & 0xFF) as u8; // green
                row[pos + 2] = ((pixel >> 16) & 0xFF) as u8; // red
            }
            row
        })
        .collect();
    for row in rows {
        out.extend_from_slice(&row);
    }

    out
}

/// Full snapshot payload: format prefix + base64 of the BMP bytes.
pub fn data_uri(canvas: &PixelCanvas) -> String {
    let bmp = encode_bmp(canvas);
    let mut out = String::with_capacity(DATA_URI_PREFIX.len() + bmp.len().div_ceil(3) * 4);
    out.push_str(DATA_URI_PREFIX);
    base64_encode_into(&bmp, &mut out);
    out
}

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Standard-alphabet base64 with `=` padding to a multiple of 4 characters.
pub fn base64_encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(3) * 4);
    base64_encode_into(input, &mut out);
    out
}

fn base64_encode_into(input: &[u8], out: &mut String) {
    let mut chunks = input.chunks_exact(3);
    for chunk in &mut chunks {
        let n = (chunk[0] as u32) << 16 | (chunk[1] as u32) << 8 | chunk[2] as u32;
        out.push(BASE64_CHARS[(n >> 18 & 0x3F) as usize] as char);
        out.push(BASE64_CHARS[(n >> 12 & 0x3F) as usize] as char);
        out.push(BASE64_CHARS[(n >> 6 & 0x3F) as usize] as char);
        out.push(BASE64_CHARS[(n & 0x3F) as usize] as char);
    }
    match chunks.remainder() {
        [a] => {
            let n = (*a as u32) << 16;
            out.push(BASE64_CHARS[(n >> 18 & 0x3F) as usize] as char);
            out.push(BASE64_CHARS[(n >> 12 & 0x3F) as usize] as char);
            out.push('=');
            out.push('=');
        }
        [a, b] => {
            let n = (*a as u32) << 16 | (*b as u32) << 8;
            out.push(BASE64_CHARS[(n >> 18 & 0x3F) as usize] as char);
            out.push(BASE64_CHARS[(n >> 12 & 0x3F) as usize] as char);
            out.push(BASE64_CHARS[(n >> 6 & 0x3F) as usize] as char);
            out.push('=');
        }
        _ => {}
    }
}
