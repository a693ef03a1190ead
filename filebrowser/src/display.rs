//! File display: a byte window of one file, decoded as text or dumped as hex.

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use hue_common::{ConsoleError, ConsoleResult};

use crate::editor::MAX_FILEEDITOR_SIZE;
use crate::fs::FileSystem;
use crate::paths::{basename, dirname};
use crate::reader::{read_contents, ByteRange, Codec};
use crate::stats::{massage_stats, parse_breadcrumbs, Breadcrumb, DisplayRecord};
use crate::xxd::{xxd, XxdLine, BYTES_PER_LINE, BYTES_PER_SENTENCE};

/// Query parameters of the display view. Numbers arrive as strings so
/// that an empty value reads as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayQuery {
    pub offset: Option<String>,
    pub length: Option<String>,
    pub begin: Option<String>,
    pub end: Option<String>,
    pub mode: Option<String>,
    pub compression: Option<String>,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Binary,
    Text,
}

impl FromStr for DisplayMode {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(Self::Binary),
            "text" => Ok(Self::Text),
            _ => Err(ConsoleError::invalid("Mode must be one of 'binary' or 'text'.")),
        }
    }
}

/// One navigation link. `offset` and `length` are `None` for the block
/// already on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavBlock {
    pub label: &'static str,
    pub offset: Option<u64>,
    pub length: Option<u64>,
}

impl NavBlock {
    fn selected(label: &'static str) -> Self {
        Self {
            label,
            offset: None,
            length: None,
        }
    }

    fn at(label: &'static str, offset: u64, length: u64) -> Self {
        Self {
            label,
            offset: Some(offset),
            length: Some(length),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewData {
    pub offset: u64,
    pub length: u64,
    pub end: u64,
    pub dirname: String,
    pub mode: DisplayMode,
    pub compression: Codec,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xxd: Option<Vec<XxdLine>>,
    pub masked_binary_data: bool,
    pub navigation: Vec<NavBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDisplay {
    #[serde(flatten)]
    pub record: DisplayRecord,
    pub success: bool,
    pub view: ViewData,
    pub filename: String,
    pub editable: bool,
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// Look up an encoding by its WHATWG label.
pub fn resolve_encoding(label: &str) -> ConsoleResult<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ConsoleError::invalid(format!("Unknown encoding: {label}")))
}

pub(crate) fn parse_number(name: &str, value: Option<&str>) -> ConsoleResult<Option<i64>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConsoleError::invalid(format!("Invalid value for {name}: {v}"))),
    }
}

impl DisplayQuery {
    pub fn byte_range(&self) -> ConsoleResult<ByteRange> {
        ByteRange::resolve(
            parse_number("offset", self.offset.as_deref())?,
            parse_number("length", self.length.as_deref())?,
            parse_number("begin", self.begin.as_deref())?,
            parse_number("end", self.end.as_deref())?,
        )
    }

    pub fn mode(&self) -> ConsoleResult<Option<DisplayMode>> {
        self.mode
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(str::parse)
            .transpose()
    }

    pub fn compression(&self) -> ConsoleResult<Option<Codec>> {
        self.compression
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::parse)
            .transpose()
    }
}

/// First / previous / next / last block links for a window of `length`
/// bytes at `offset` in a file of `size` bytes.
pub fn calculate_navigation(offset: u64, length: u64, size: u64) -> Vec<NavBlock> {
    let (first, prev) = if offset == 0 {
        (NavBlock::selected("First Block"), NavBlock::selected("Previous Block"))
    } else {
        (
            NavBlock::at("First Block", 0, length),
            NavBlock::at("Previous Block", offset.saturating_sub(length), length),
        )
    };

    let (next, last) = if offset + length >= size {
        (NavBlock::selected("Next Block"), NavBlock::selected("Last Block"))
    } else {
        (
            NavBlock::at("Next Block", offset + length, length),
            NavBlock::at("Last Block", size.saturating_sub(length), length),
        )
    };

    vec![first, prev, next, last]
}

/// Render a window of the file at `path`.
pub fn display(
    fs: &dyn FileSystem,
    path: &str,
    query: &DisplayQuery,
    site_encoding: &str,
) -> ConsoleResult<FileDisplay> {
    if !fs.isfile(path) {
        return Err(ConsoleError::invalid(format!("Not a file: '{path}'")));
    }
    let stats = fs.stats(path)?;

    let encoding = resolve_encoding(
        query
            .encoding
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(site_encoding),
    )?;
    let range = query.byte_range()?;
    let mut mode = query.mode()?;

    // Binary viewing always shows the raw bytes.
    let codec = match mode {
        Some(DisplayMode::Binary) => Some(Codec::None),
        _ => query.compression()?,
    };

    let contents = read_contents(fs, path, codec, range.offset, range.length)?;

    let mut text = None;
    let mut is_binary = false;
    if mode != Some(DisplayMode::Binary) {
        let (decoded, _) = encoding.decode_without_bom_handling(&contents.data);
        is_binary = decoded.contains('\u{FFFD}');
        text = Some(decoded.into_owned());
        if mode.is_none() {
            mode = Some(if is_binary { DisplayMode::Binary } else { DisplayMode::Text });
        }
    }
    let mode = mode.unwrap_or(DisplayMode::Text);

    let (contents_view, xxd_view, masked_binary_data) = match mode {
        DisplayMode::Binary => {
            let lines = xxd(contents.offset, &contents.data, BYTES_PER_LINE, BYTES_PER_SENTENCE);
            debug!("xxd: {} lines at offset {}", lines.len(), contents.offset);
            (None, Some(lines), false)
        }
        DisplayMode::Text => (text, None, is_binary),
    };

    Ok(FileDisplay {
        record: massage_stats(&stats),
        success: true,
        view: ViewData {
            offset: contents.offset,
            length: contents.length,
            end: contents.offset + contents.data.len() as u64,
            dirname: dirname(path),
            mode,
            compression: contents.codec,
            size: stats.size,
            contents: contents_view,
            xxd: xxd_view,
            masked_binary_data,
            navigation: calculate_navigation(contents.offset, contents.length, stats.size),
        },
        filename: basename(path).to_string(),
        editable: stats.size < MAX_FILEEDITOR_SIZE,
        breadcrumbs: parse_breadcrumbs(path),
    })
}
