//! Script text access.

/// Line-by-line access to a robot's script.
pub trait SourceProvider {
    /// Next line with comments removed, or `None` past the end of the script.
    /// Lines that are entirely comment are skipped.
    fn next_line(&mut self) -> Option<String>;

    /// One-based number of the line last returned (0 before the first read).
    fn line_number(&self) -> usize;

    /// Moves the cursor so that `line` is the current line.
    fn set_line_number(&mut self, line: usize);

    /// Rewinds to before the first line.
    fn restart(&mut self);
}

/// A script held in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Script {
    lines: Vec<String>,
    cursor: usize,
}

impl Script {
    pub fn new(text: &str) -> Self {
        Self::from_lines(text.lines())
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            cursor: 0,
        }
    }

    /// Swaps in new text and rewinds.
    pub fn replace(&mut self, text: &str) {
        *self = Self::new(text);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl SourceProvider for Script {
    fn next_line(&mut self) -> Option<String> {
        loop {
            let raw = self.lines.get(self.cursor)?;
            self.cursor += 1;
            if raw.trim_start().starts_with('#') {
                continue;
            }
            return Some(strip_comment(raw).trim_end().to_string());
        }
    }

    fn line_number(&self) -> usize {
        self.cursor
    }

    fn set_line_number(&mut self, line: usize) {
        self.cursor = line.min(self.lines.len());
    }

    fn restart(&mut self) {
        self.cursor = 0;
    }
}

/// Cuts a trailing `# ...` comment, leaving `#` inside quotes alone.
pub fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (idx, ch) in line.char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, '#') => return &line[..idx],
            _ => {}
        }
    }
    line
}
