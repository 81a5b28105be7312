//! Column-aligned text tables.
//!
//! Every column but the last is padded to its widest cell plus
//! [`PADDING`] spaces. The last column is written as-is, so lines carry
//! no trailing whitespace.

/// Spaces between the widest cell of a column and the next column.
pub const PADDING: usize = 2;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// A table with a header row.
#[derive(Debug, Clone, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    bold_header: bool,
}

impl Table {
    pub fn new<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            bold_header: false,
        }
    }

    /// Wrap the header line in ANSI bold.
    pub fn with_bold_header(mut self, enabled: bool) -> Self {
        self.bold_header = enabled;
        self
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = Vec::new();
        for line in std::iter::once(&self.header).chain(&self.rows) {
            for (i, cell) in line.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }
        widths
    }

    fn render_line(line: &[String], widths: &[usize], out: &mut String) {
        let last = line.len().saturating_sub(1);
        for (i, cell) in line.iter().enumerate() {
            out.push_str(cell);
            if i < last {
                let pad = widths[i] + PADDING - cell.chars().count();
                out.extend(std::iter::repeat(' ').take(pad));
            }
        }
    }

    /// Render the header and every row, one line each.
    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut out = String::new();

        if self.bold_header {
            out.push_str(BOLD);
        }
        Self::render_line(&self.header, &widths, &mut out);
        if self.bold_header {
            out.push_str(RESET);
        }
        out.push('\n');

        for row in &self.rows {
            Self::render_line(row, &widths, &mut out);
            out.push('\n');
        }

        out
    }
}
