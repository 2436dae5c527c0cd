use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Every tab in the file is rendered as this run of spaces.
pub const TAB_IN_SPACES: &str = "        ";

/// One display line. Decoded as ISO-8859-1 so each byte is one character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Line(String);

impl Line {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut text = String::with_capacity(bytes.len());
        for &byte in bytes {
            if byte == b'\t' {
                text.push_str(TAB_IN_SPACES);
            } else {
                text.push(char::from(byte));
            }
        }
        Line(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Line {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Snapshot of a file's bytes with an index of where each line sits.
///
/// The file handle is only held for the duration of `read`.
pub struct LoadedFile {
    data: Vec<u8>,
    // (start, end) of each line, terminator excluded
    line_spans: Vec<(usize, usize)>,
}

impl LoadedFile {
    pub fn read<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Self::from_bytes(data))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        let mut loaded = Self {
            data,
            line_spans: Vec::new(),
        };
        loaded.build_line_index();
        loaded
    }

    /// Splits on `\n`, `\r\n` and a lone `\r`. A trailing line without a
    /// terminator still counts as a line.
    fn build_line_index(&mut self) {
        let data = &self.data[..];
        let mut start = 0;
        let mut i = 0;

        while i < data.len() {
            match data[i] {
                b'\n' => {
                    self.line_spans.push((start, i));
                    start = i + 1;
                }
                b'\r' => {
                    self.line_spans.push((start, i));
                    if data.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    start = i + 1;
                }
                _ => {}
            }
            i += 1;
        }

        if start < data.len() {
            self.line_spans.push((start, data.len()));
        }
    }

    pub fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn line_count(&self) -> usize {
        self.line_spans.len()
    }

    pub fn get_line(&self, line_num: usize) -> Option<Line> {
        self.line_spans
            .get(line_num)
            .map(|&(start, end)| Line::from_bytes(&self.data[start..end]))
    }

    /// Lines after the first `skip`, in file order. Skipped lines are
    /// never decoded.
    pub fn lines_from(&self, skip: usize) -> impl Iterator<Item = Line> + '_ {
        self.line_spans
            .iter()
            .skip(skip)
            .map(|&(start, end)| Line::from_bytes(&self.data[start..end]))
    }
}
