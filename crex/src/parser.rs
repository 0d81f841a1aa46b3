use crate::block::{Origin, RawMessage, ReportFile};
use crate::cursor::find;
use crate::errors::Result;
use crate::message::Encoding;
use flate2::read::GzDecoder;
use std::{fs::File, io::Read, path::Path};

pub const CREX_PATTERN: &[u8] = b"CREX++";
pub const BUFR_PATTERN: &[u8] = b"BUFR";
pub const END_PATTERN: &[u8] = b"7777";
const SECTION_END: &[u8] = b"++";
const SUPP_PATTERN: &[u8] = b"SUPP";
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Reads a file of concatenated CREX and/or BUFR messages, gunzipping it
/// first when it starts with the gzip magic.
pub fn read_messages<P: AsRef<Path>>(path: P) -> Result<ReportFile> {
    let path = path.as_ref();
    let mut bytes = vec![];
    File::open(path)?.read_to_end(&mut bytes)?;

    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoded = vec![];
        GzDecoder::new(&bytes[..]).read_to_end(&mut decoded)?;
        bytes = decoded;
    }

    Ok(split_messages(&path.display().to_string(), &bytes))
}

/// Locates every message in `bytes`.
///
/// BUFR messages are cut using their declared length, CREX messages at the
/// next end marker. A message with no end in sight runs to the end of the
/// buffer so that decoding reports it as truncated.
pub fn split_messages(source: &str, bytes: &[u8]) -> ReportFile {
    let mut file = ReportFile::new();
    let mut pos = 0;

    while let Some((start, encoding)) = next_start(&bytes[pos..]).map(|(s, e)| (pos + s, e)) {
        let end = match encoding {
            Encoding::Bufr => bufr_end(bytes, start),
            Encoding::Crex => crex_end(bytes, start),
        };

        tracing::debug!(source, offset = start, len = end - start, %encoding, "found message");
        file.push_message(RawMessage {
            encoding,
            origin: Origin::new(source, start),
            data: bytes[start..end].to_vec(),
        });
        pos = end;
    }

    file
}

fn next_start(bytes: &[u8]) -> Option<(usize, Encoding)> {
    let crex = find(bytes, CREX_PATTERN);
    let bufr = find(bytes, BUFR_PATTERN);
    match (crex, bufr) {
        (Some(c), Some(b)) if b < c => Some((b, Encoding::Bufr)),
        (Some(c), _) => Some((c, Encoding::Crex)),
        (None, Some(b)) => Some((b, Encoding::Bufr)),
        (None, None) => None,
    }
}

fn bufr_end(bytes: &[u8], start: usize) -> usize {
    let declared = bytes
        .get(start + 4..start + 7)
        .map(|l| u32::from_be_bytes([0, l[0], l[1], l[2]]) as usize)
        .unwrap_or(0);
    if declared < 8 {
        // not a usable length; skip the magic only
        return (start + BUFR_PATTERN.len()).min(bytes.len());
    }
    (start + declared).min(bytes.len())
}

fn crex_end(bytes: &[u8], start: usize) -> usize {
    let body = start + CREX_PATTERN.len();
    let limit = find(&bytes[body..], CREX_PATTERN).map_or(bytes.len(), |n| body + n);
    crex_trailer(&bytes[..limit], body)
        .map(|e| e + END_PATTERN.len())
        .unwrap_or(limit)
}

/// Position of the end marker, searched only past the description and data
/// terminators and any `SUPP` section, so data values spelt `7777` are kept.
fn crex_trailer(bytes: &[u8], body: usize) -> Option<usize> {
    let past = |pos: usize, token: &[u8]| {
        find(&bytes[pos..], token).map(|i| pos + i + token.len())
    };
    let data_end = past(past(body, SECTION_END)?, SECTION_END)?;

    let mut pos = data_end;
    while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    if bytes[pos..].starts_with(SUPP_PATTERN) {
        pos = past(pos, SECTION_END)?;
    }
    find(&bytes[pos..], END_PATTERN).map(|i| pos + i)
}
