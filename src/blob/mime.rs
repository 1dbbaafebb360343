//! MIME type sniffing from leading bytes

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_GIF: &str = "image/gif";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// Two-byte signatures, checked in order
const SIGNATURES: [([u8; 2], &str); 4] = [
    ([0xFF, 0xD8], MIME_JPEG),
    ([0x89, 0x50], MIME_PNG),
    ([0x47, 0x49], MIME_GIF),
    ([0x25, 0x50], MIME_PDF),
];

/// Sniff a MIME type; anything unrecognized is `application/octet-stream`
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    SIGNATURES
        .iter()
        .find(|(sig, _)| bytes.starts_with(sig))
        .map(|(_, mime)| *mime)
        .unwrap_or(MIME_OCTET_STREAM)
}
