//! Windowed file reads with gzip / Avro container decoding.

use anyhow::Context;
use apache_avro::Reader as AvroReader;
use flate2::read::MultiGzDecoder;
use serde::Serialize;
use std::cell::Cell;
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;
use std::str::FromStr;
use tracing::warn;

use hue_common::{ConsoleError, ConsoleResult};

use crate::fs::FileSystem;

pub const DEFAULT_CHUNK_SIZE_BYTES: u64 = 4 * 1024;
pub const MAX_CHUNK_SIZE_BYTES: u64 = 1024 * 1024;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const AVRO_MAGIC: &[u8] = b"Obj";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    None,
    Gzip,
    Avro,
}

impl FromStr for Codec {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "avro" => Ok(Self::Avro),
            other => Err(ConsoleError::invalid(format!(
                "Compression must be one of 'gzip', 'avro' or 'none', not '{other}'"
            ))),
        }
    }
}

/// A validated byte window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    /// Resolve the request's `offset`/`length`, or its 1-indexed
    /// `begin`/`end` pair when `end` is given.
    pub fn resolve(
        offset: Option<i64>,
        length: Option<i64>,
        begin: Option<i64>,
        end: Option<i64>,
    ) -> ConsoleResult<Self> {
        let (offset, length) = match end {
            Some(end) => {
                let begin = begin.unwrap_or(1);
                if begin < 1 {
                    return Err(ConsoleError::invalid("First byte to display must be at least 1."));
                }
                if begin >= end {
                    return Err(ConsoleError::invalid(
                        "First byte to display must be before last byte to display.",
                    ));
                }
                (begin - 1, end - begin)
            }
            None => (
                offset.unwrap_or(0),
                length.unwrap_or(DEFAULT_CHUNK_SIZE_BYTES as i64),
            ),
        };

        if offset < 0 {
            return Err(ConsoleError::invalid("Offset may not be less than zero."));
        }
        if length < 0 {
            return Err(ConsoleError::invalid("Length may not be less than zero."));
        }
        let length = length as u64;
        if length > MAX_CHUNK_SIZE_BYTES {
            return Err(ConsoleError::invalid(format!(
                "Cannot request chunks greater than {MAX_CHUNK_SIZE_BYTES} bytes"
            )));
        }

        Ok(Self {
            offset: offset as u64,
            length,
        })
    }
}

/// Result of [`read_contents`].
#[derive(Debug, Clone)]
pub struct Contents {
    pub codec: Codec,
    pub offset: u64,
    pub length: u64,
    pub data: Vec<u8>,
}

pub fn detect_gzip(head: &[u8]) -> bool {
    head.starts_with(GZIP_MAGIC)
}

pub fn detect_avro(head: &[u8]) -> bool {
    head.starts_with(AVRO_MAGIC)
}

fn read_head(fs: &dyn FileSystem, path: &str, n: u64) -> ConsoleResult<Vec<u8>> {
    let handle = fs.open(path)?;
    let mut head = Vec::with_capacity(n as usize);
    handle
        .take(n)
        .read_to_end(&mut head)
        .map_err(|e| read_failure(path, "Failed to read file.", e))?;
    Ok(head)
}

fn read_failure(path: &str, message: &str, err: impl std::fmt::Display) -> ConsoleError {
    warn!("Could not read file at {path}: {err}");
    ConsoleError::upstream(message, err)
}

/// Read `length` bytes at `offset` from `path`, decoding with `codec`.
///
/// With no codec, `.gz` files starting with the gzip magic are read as
/// gzip (offset forced to 0) and `.avro` files starting with `Obj` as Avro
/// containers; everything else is read raw.
pub fn read_contents(
    fs: &dyn FileSystem,
    path: &str,
    codec: Option<Codec>,
    offset: u64,
    length: u64,
) -> ConsoleResult<Contents> {
    let mut offset = offset;
    let codec = match codec {
        Some(codec) => codec,
        None => {
            if path.ends_with(".gz") && detect_gzip(&read_head(fs, path, 2)?) {
                offset = 0;
                Codec::Gzip
            } else if path.ends_with(".avro") && detect_avro(&read_head(fs, path, 3)?) {
                Codec::Avro
            } else {
                Codec::None
            }
        }
    };

    let data = match codec {
        Codec::Gzip => read_gzip(fs, path, offset, length)?,
        Codec::Avro => read_avro(fs, path, offset, length)?,
        Codec::None => read_simple(fs, path, offset, length)?,
    };

    Ok(Contents {
        codec,
        offset,
        length,
        data,
    })
}

fn read_simple(fs: &dyn FileSystem, path: &str, offset: u64, length: u64) -> ConsoleResult<Vec<u8>> {
    let mut handle = fs.open(path)?;
    let mut read = || -> io::Result<Vec<u8>> {
        handle.seek(SeekFrom::Start(offset))?;
        let mut data = Vec::new();
        (&mut handle).take(length).read_to_end(&mut data)?;
        Ok(data)
    };
    read().map_err(|e| read_failure(path, "Failed to read file.", e))
}

fn read_gzip(fs: &dyn FileSystem, path: &str, offset: u64, length: u64) -> ConsoleResult<Vec<u8>> {
    if offset != 0 {
        return Err(ConsoleError::invalid(
            "Offsets are not supported with Gzip compression.",
        ));
    }
    let handle = fs.open(path)?;
    let mut data = Vec::new();
    MultiGzDecoder::new(handle)
        .take(length)
        .read_to_end(&mut data)
        .map_err(|e| read_failure(path, "Failed to decompress file.", e))?;
    Ok(data)
}

/// Counts bytes pulled through the wrapped reader.
struct CountingReader<R> {
    inner: R,
    consumed: Rc<Cell<u64>>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.set(self.consumed.get() + n as u64);
        Ok(n)
    }
}

fn read_avro(fs: &dyn FileSystem, path: &str, offset: u64, length: u64) -> ConsoleResult<Vec<u8>> {
    let mut handle = fs.open(path)?;

    let mut read = || -> anyhow::Result<Vec<u8>> {
        handle.seek(SeekFrom::Start(offset))?;
        let consumed = Rc::new(Cell::new(0u64));
        let counting = CountingReader {
            inner: &mut handle,
            consumed: Rc::clone(&consumed),
        };
        let reader = AvroReader::new(counting).context("invalid Avro container header")?;
        let read_start = consumed.get();

        let mut contents = Vec::new();
        let mut records = 0usize;
        for datum in reader {
            let datum = datum.context("invalid Avro record")?;
            // A record crossing the window is kept only if it is the first.
            if consumed.get() - read_start > length && records > 0 {
                break;
            }
            let json = serde_json::Value::try_from(datum).context("unrenderable Avro record")?;
            contents.extend_from_slice(json.to_string().as_bytes());
            contents.push(b'\n');
            records += 1;
        }
        Ok(contents)
    };

    read().map_err(|e| read_failure(path, "Failed to read Avro file.", format!("{e:#}")))
}
