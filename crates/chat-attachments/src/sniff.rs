//! Mimetype Sniffing
//!
//! Classifies uploads by their leading bytes, independent of the file name.

use std::io::{self, SeekFrom};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Number of leading bytes considered when classifying
pub const SNIFF_LEN: usize = 512;

/// Sniff the mimetype of a seekable stream.
///
/// The stream is read from byte zero regardless of its current position and
/// is rewound to the start before returning, whether classification succeeded
/// or the read failed. An empty stream is an `UnexpectedEof` error.
pub async fn sniff_mimetype<R>(reader: &mut R) -> io::Result<String>
where
    R: AsyncRead + AsyncSeek + Unpin + ?Sized,
{
    reader.seek(SeekFrom::Start(0)).await?;

    let head = read_head(reader).await;
    let rewound = reader.seek(SeekFrom::Start(0)).await;

    let head = head?;
    rewound?;

    Ok(detect_content_type(&head))
}

async fn read_head<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; SNIFF_LEN];
    let mut filled = 0;

    while filled < SNIFF_LEN {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream is empty",
        ));
    }

    buf.truncate(filled);
    Ok(buf)
}

enum Signature {
    /// Case-insensitive HTML tag followed by a space or '>'
    Html(&'static [u8]),
    /// `data & mask == pattern`, optionally after leading whitespace
    Masked {
        mask: &'static [u8],
        pattern: &'static [u8],
        skip_ws: bool,
        mime: &'static str,
    },
    /// Plain prefix
    Prefix(&'static [u8], &'static str),
}

const HTML: &str = "text/html; charset=utf-8";

const SIGNATURES: &[Signature] = &[
    Signature::Html(b"<!DOCTYPE HTML"),
    Signature::Html(b"<HTML"),
    Signature::Html(b"<HEAD"),
    Signature::Html(b"<SCRIPT"),
    Signature::Html(b"<IFRAME"),
    Signature::Html(b"<H1"),
    Signature::Html(b"<DIV"),
    Signature::Html(b"<FONT"),
    Signature::Html(b"<TABLE"),
    Signature::Html(b"<A"),
    Signature::Html(b"<STYLE"),
    Signature::Html(b"<TITLE"),
    Signature::Html(b"<B"),
    Signature::Html(b"<BODY"),
    Signature::Html(b"<BR"),
    Signature::Html(b"<P"),
    Signature::Html(b"<!--"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF",
        pattern: b"<?xml",
        skip_ws: true,
        mime: "text/xml; charset=utf-8",
    },
    Signature::Prefix(b"%PDF-", "application/pdf"),
    Signature::Prefix(b"%!PS-Adobe-", "application/postscript"),
    // byte order marks
    Signature::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pattern: b"\xFE\xFF\x00\x00",
        skip_ws: false,
        mime: "text/plain; charset=utf-16be",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pattern: b"\xFF\xFE\x00\x00",
        skip_ws: false,
        mime: "text/plain; charset=utf-16le",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\x00",
        pattern: b"\xEF\xBB\xBF\x00",
        skip_ws: false,
        mime: "text/plain; charset=utf-8",
    },
    // images
    Signature::Prefix(b"\x00\x00\x01\x00", "image/x-icon"),
    Signature::Prefix(b"\x00\x00\x02\x00", "image/x-icon"),
    Signature::Prefix(b"BM", "image/bmp"),
    Signature::Prefix(b"GIF87a", "image/gif"),
    Signature::Prefix(b"GIF89a", "image/gif"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WEBPVP",
        skip_ws: false,
        mime: "image/webp",
    },
    Signature::Prefix(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    Signature::Prefix(b"\xFF\xD8\xFF", "image/jpeg"),
    Signature::Prefix(b"II\x2A\x00", "image/tiff"),
    Signature::Prefix(b"MM\x00\x2A", "image/tiff"),
    // audio and video
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"FORM\x00\x00\x00\x00AIFF",
        skip_ws: false,
        mime: "audio/aiff",
    },
    Signature::Prefix(b"ID3", "audio/mpeg"),
    Signature::Prefix(b"OggS\x00", "application/ogg"),
    Signature::Prefix(b"MThd\x00\x00\x00\x06", "audio/midi"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00AVI ",
        skip_ws: false,
        mime: "video/avi",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WAVE",
        skip_ws: false,
        mime: "audio/wave",
    },
    Signature::Prefix(b"\x1A\x45\xDF\xA3", "video/webm"),
    // fonts
    Signature::Prefix(b"\x00\x01\x00\x00", "font/ttf"),
    Signature::Prefix(b"OTTO", "font/otf"),
    Signature::Prefix(b"ttcf", "font/collection"),
    Signature::Prefix(b"wOFF", "font/woff"),
    Signature::Prefix(b"wOF2", "font/woff2"),
    // archives
    Signature::Prefix(b"\x1F\x8B\x08", "application/x-gzip"),
    Signature::Prefix(b"PK\x03\x04", "application/zip"),
    Signature::Prefix(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    Signature::Prefix(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    Signature::Prefix(b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    Signature::Prefix(b"\x00\x61\x73\x6D", "application/wasm"),
];

impl Signature {
    fn matches(&self, data: &[u8]) -> Option<&'static str> {
        match self {
            Signature::Html(tag) => {
                let data = skip_whitespace(data);
                if data.len() < tag.len() + 1 {
                    return None;
                }
                if !data[..tag.len()].eq_ignore_ascii_case(tag) {
                    return None;
                }
                matches!(data[tag.len()], b' ' | b'>').then_some(HTML)
            }
            Signature::Masked {
                mask,
                pattern,
                skip_ws,
                mime,
            } => {
                let data = if *skip_ws { skip_whitespace(data) } else { data };
                if data.len() < pattern.len() {
                    return None;
                }
                data.iter()
                    .zip(mask.iter())
                    .zip(pattern.iter())
                    .all(|((d, m), p)| d & m == *p)
                    .then_some(*mime)
            }
            Signature::Prefix(prefix, mime) => data.starts_with(prefix).then_some(*mime),
        }
    }
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Classify a byte prefix; only the first [`SNIFF_LEN`] bytes are considered
pub fn detect_content_type(data: &[u8]) -> String {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if let Some(mime) = SIGNATURES.iter().find_map(|sig| sig.matches(data)) {
        return mime.to_string();
    }

    if data.iter().copied().any(is_binary) {
        mime::APPLICATION_OCTET_STREAM.to_string()
    } else {
        mime::TEXT_PLAIN_UTF_8.to_string()
    }
}
