//! `xxd`-style hex dump of a byte window.

use serde::Serialize;

pub const BYTES_PER_LINE: usize = 16;
pub const BYTES_PER_SENTENCE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XxdLine {
    /// Absolute offset of the line's first byte in the file.
    pub offset: u64,
    /// Hex groups, `bytes_per_sentence` bytes each; the last may be short.
    pub groups: Vec<String>,
    /// Printable ASCII rendering, `.` for everything else.
    pub text: String,
}

pub fn xxd(base_offset: u64, data: &[u8], bytes_per_line: usize, bytes_per_sentence: usize) -> Vec<XxdLine> {
    let bytes_per_line = bytes_per_line.max(1);
    let bytes_per_sentence = bytes_per_sentence.max(1);

    data.chunks(bytes_per_line)
        .enumerate()
        .map(|(i, line)| XxdLine {
            offset: base_offset + (i * bytes_per_line) as u64,
            groups: line
                .chunks(bytes_per_sentence)
                .map(|group| group.iter().map(|b| format!("{b:02x}")).collect())
                .collect(),
            text: line
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect(),
        })
        .collect()
}
