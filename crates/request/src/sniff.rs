//! Best-effort content type detection for fetched bodies. Used for logs and
//! events only; never affects what is written to the sink.

const SNIFF_LEN: usize = 512;

const TEXT_UTF8: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML", b"<HTML", b"<HEAD", b"<SCRIPT", b"<IFRAME", b"<H1", b"<DIV", b"<FONT",
    b"<TABLE", b"<A", b"<STYLE", b"<TITLE", b"<B", b"<BODY", b"<BR", b"<P", b"<!--",
];

const MAGIC: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b\x08", "application/x-gzip"),
];

fn is_ws(b: u8) -> bool { matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' ') }

fn is_binary(b: u8) -> bool { matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f) }

fn html_match(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() + 1 {
        return false;
    }
    let head_matches = data.iter().zip(tag).all(|(d, t)| d.to_ascii_uppercase() == *t);
    // tag must be terminated by a space or '>'
    head_matches && matches!(data[tag.len()], b' ' | b'>')
}

/// MIME type of `body`, judged from at most its first 512 bytes.
pub fn content_type(body: &[u8]) -> &'static str {
    let data = &body[..body.len().min(SNIFF_LEN)];
    let start = data.iter().position(|b| !is_ws(*b)).unwrap_or(data.len());
    let trimmed = &data[start..];

    if HTML_TAGS.iter().any(|tag| html_match(trimmed, tag)) {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }
    if let Some(&(_, mime)) = MAGIC.iter().find(|(sig, _)| data.starts_with(sig)) {
        return mime;
    }
    if data.starts_with(b"\xef\xbb\xbf") {
        return TEXT_UTF8;
    }
    if data.iter().any(|b| is_binary(*b)) {
        return OCTET_STREAM;
    }
    TEXT_UTF8
}
