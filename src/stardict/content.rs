//! Content blob access: decompression, positional reads, segment decoding

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use byteorder::{BigEndian, ByteOrder};
use flate2::read::GzDecoder;
use log::{debug, info};

use super::error::{DictError, Result};
use super::models::Segment;

/// Random-access store over one dictionary's content blob.
///
/// The blob is kept as an open file handle; reads are positional
/// (`pread`-style) and never mutate shared cursor state, so multiple
/// search workers can read the same store concurrently. The handle can be
/// released (`close`) and reacquired (`reopen`) without reparsing anything.
#[derive(Debug)]
pub struct ContentStore {
    path: PathBuf,
    file: RwLock<Option<File>>,
    type_sequence: Option<String>,
}

impl ContentStore {
    /// Open the content blob for a package.
    ///
    /// When only the compressed `<stem>.dict.dz` exists, it is gunzipped
    /// to `<stem>.dict` alongside the original, once; subsequent opens
    /// find the decompressed file and skip the work.
    pub fn open(
        dict_path: &Path,
        dz_path: &Path,
        type_sequence: Option<String>,
    ) -> Result<Self> {
        let path = ensure_decompressed(dict_path, dz_path)?;
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file: RwLock::new(Some(file)),
            type_sequence,
        })
    }

    /// Path of the (decompressed) blob backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file handle is currently held.
    pub fn is_open(&self) -> bool {
        self.file.read().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Release the file handle. Reads fail with [`DictError::Closed`]
    /// until [`ContentStore::reopen`] is called.
    pub fn close(&self) {
        if let Ok(mut guard) = self.file.write() {
            *guard = None;
        }
    }

    /// Reacquire the file handle after a `close`.
    pub fn reopen(&self) -> Result<()> {
        let mut guard = self.file.write().map_err(|_| DictError::LockPoisoned)?;
        if guard.is_none() {
            *guard = Some(File::open(&self.path)?);
        }
        Ok(())
    }

    /// Read `size` bytes at `offset` with a positional read.
    pub fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let guard = self.file.read().map_err(|_| DictError::LockPoisoned)?;
        let file = guard.as_ref().ok_or(DictError::Closed)?;
        let mut buf = vec![0u8; size as usize];
        read_exact_at(file, &mut buf, offset)?;
        Ok(buf)
    }

    /// Read and decode one definition into typed segments.
    pub fn read_segments(&self, offset: u64, size: u64) -> Result<Vec<Segment>> {
        let raw = self.read(offset, size)?;
        decode_segments(&raw, self.type_sequence.as_deref())
    }
}

/// Resolve the blob path, gunzipping the `.dz` variant once if needed.
fn ensure_decompressed(dict_path: &Path, dz_path: &Path) -> Result<PathBuf> {
    if dict_path.exists() {
        return Ok(dict_path.to_path_buf());
    }
    if !dz_path.exists() {
        return Err(DictError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("neither {:?} nor {:?} exists", dict_path, dz_path),
        )));
    }

    info!("Decompressing {:?} -> {:?}", dz_path, dict_path);
    let compressed = File::open(dz_path)?;
    let mut decoder = GzDecoder::new(compressed);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;

    let mut out = File::create(dict_path)?;
    out.write_all(&data)?;
    debug!("Decompressed {} bytes", data.len());
    Ok(dict_path.to_path_buf())
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut read = 0usize;
    while read < buf.len() {
        let n = file.seek_read(&mut buf[read..], offset + read as u64)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "content blob shorter than index claims",
            ));
        }
        read += n;
    }
    Ok(())
}

fn is_text_type(code: u8) -> bool {
    code.is_ascii_lowercase()
}

fn is_binary_type(code: u8) -> bool {
    code == b'W' || code == b'P'
}

/// Decode a raw definition buffer into typed segments.
///
/// With a fixed type sequence, the one-letter codes drive the cursor: text
/// types are NUL-terminated except the last in the sequence, which runs to
/// buffer end (some packages omit the trailing NUL); the binary types `W`
/// and `P` carry a 4-byte big-endian length prefix, again except in last
/// position. Without a sequence the buffer is self-describing: each
/// segment starts with its own type-tag byte. An unknown type byte is a
/// decode error local to this one definition.
pub fn decode_segments(buf: &[u8], type_sequence: Option<&str>) -> Result<Vec<Segment>> {
    match type_sequence {
        Some(seq) => decode_fixed_sequence(buf, seq),
        None => decode_tagged(buf),
    }
}

fn decode_fixed_sequence(buf: &[u8], seq: &str) -> Result<Vec<Segment>> {
    let codes: Vec<u8> = seq.bytes().collect();
    let mut segments = Vec::with_capacity(codes.len());
    let mut cursor = buf;

    for (i, &code) in codes.iter().enumerate() {
        let last = i + 1 == codes.len();
        segments.push(decode_one(&mut cursor, code, last)?);
    }
    Ok(segments)
}

fn decode_tagged(buf: &[u8]) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut cursor = buf;

    while !cursor.is_empty() {
        let code = cursor[0];
        cursor = &cursor[1..];
        // A tagged stream has no declared end: a text segment runs to its
        // NUL, or to buffer end when the package omits the trailing NUL.
        // Binary segments always carry their length prefix here.
        let segment = decode_one(&mut cursor, code, is_text_type(code))?;
        segments.push(segment);
    }
    Ok(segments)
}

fn decode_one(cursor: &mut &[u8], code: u8, last: bool) -> Result<Segment> {
    if is_text_type(code) {
        let text = match cursor.iter().position(|&b| b == 0) {
            Some(end) => {
                let text = String::from_utf8_lossy(&cursor[..end]).into_owned();
                *cursor = &cursor[end + 1..];
                text
            }
            None if last => {
                let text = String::from_utf8_lossy(cursor).into_owned();
                *cursor = &[];
                text
            }
            None => {
                return Err(DictError::Format(format!(
                    "unterminated text segment of type {:?}",
                    code as char
                )))
            }
        };
        Ok(Segment::Text { kind: code, text })
    } else if is_binary_type(code) {
        let data = if last {
            // Last field in a fixed sequence omits the length prefix.
            let data = cursor.to_vec();
            *cursor = &[];
            data
        } else {
            if cursor.len() < 4 {
                return Err(DictError::Format(format!(
                    "truncated length prefix for type {:?}",
                    code as char
                )));
            }
            let len = BigEndian::read_u32(&cursor[..4]) as usize;
            *cursor = &cursor[4..];
            if cursor.len() < len {
                return Err(DictError::Format(format!(
                    "binary segment of type {:?} claims {} bytes, {} remain",
                    code as char,
                    len,
                    cursor.len()
                )));
            }
            let data = cursor[..len].to_vec();
            *cursor = &cursor[len..];
            data
        };
        Ok(Segment::Blob { kind: code, data })
    } else {
        Err(DictError::Format(format!(
            "unknown definition type byte {:#04x}",
            code
        )))
    }
}
