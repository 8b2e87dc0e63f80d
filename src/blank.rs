//! The embedded blank-JPEG asset served whenever the stream is offline.
//!
//! Hand-built the same way `prep::encode_placeholder` synthesizes a
//! stand-in JPEG for unsupported formats: a minimal SOI/APP0/SOF0/DHT/SOS
//! marker sequence, one stuffed scan byte, and EOI. Width/height are
//! baked into the SOF0 marker.

pub const BLANK_WIDTH: u32 = 640;
pub const BLANK_HEIGHT: u32 = 480;

#[rustfmt::skip]
pub const BLANK_JPEG: &[u8] = &[
    // SOI
    0xFF, 0xD8,
    // APP0 (JFIF)
    0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01, 0x00, 0x48, 0x00, 0x48, 0x00, 0x00,
    // SOF0: precision=8, height=480 (0x01E0), width=640 (0x0280), 3 components
    0xFF, 0xC0, 0x00, 0x11, 0x08, 0x01, 0xE0, 0x02, 0x80, 0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01,
    // DHT
    0xFF, 0xC4, 0x00, 0x1F, 0x00,
    0x00, 0x01, 0x05, 0x01, 0x01, 0x01, 0x01, 0x01,
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
    0x08, 0x09, 0x0A, 0x0B,
    // SOS
    0xFF, 0xDA, 0x00, 0x0C, 0x03, 0x01, 0x00, 0x02, 0x11, 0x03, 0x11, 0x00, 0x3F, 0x00,
    // one stuffed scan byte
    0xFF, 0x00,
    // EOI
    0xFF, 0xD9,
];
