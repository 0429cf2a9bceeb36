use std::collections::HashMap;

use crate::collector::CollectError;

/// One data row keyed by decoded header name.
pub type Row = HashMap<String, String>;

const SENTINEL_REPEAT: usize = 20;
const SENTINEL_OPEN: char = '{';
const SENTINEL_CLOSE: char = '}';

/// Wraps a field name so its heading is wide and easy to find in the header row.
pub fn encode_heading(name: &str) -> String {
    let open = SENTINEL_OPEN.to_string().repeat(SENTINEL_REPEAT);
    let close = SENTINEL_CLOSE.to_string().repeat(SENTINEL_REPEAT);
    format!("{open}{name}{close}")
}

fn decode_heading(cell: &str) -> String {
    let open = SENTINEL_OPEN.to_string().repeat(SENTINEL_REPEAT);
    let close = SENTINEL_CLOSE.to_string().repeat(SENTINEL_REPEAT);
    let cell = cell.trim();
    let cell = cell.strip_prefix(open.as_str()).unwrap_or(cell);
    let cell = cell.strip_suffix(close.as_str()).unwrap_or(cell);
    cell.to_string()
}

/// Splits fixed-width tabular output into rows keyed by the header.
///
/// A column boundary is any character offset where every line has whitespace.
/// The last column runs to the end of each line so a trailing command keeps its
/// inner spacing. Lines that happen to line up their spaces can still fool this.
pub fn split_columns(text: &str) -> Result<Vec<Row>, CollectError> {
    let lines: Vec<Vec<char>> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().collect())
        .collect();
    let Some((header_line, data_lines)) = lines.split_first() else {
        return Err(CollectError::Shape("no header row".to_string()));
    };

    let spans = column_spans(&lines);
    log::debug!("column spans: {spans:?}");

    let header: Vec<String> = spans
        .iter()
        .enumerate()
        .map(|(i, &(begin, end))| decode_heading(&cell(header_line, begin, end, i + 1 == spans.len())))
        .collect();
    if header.is_empty() || header.iter().any(|h| h.is_empty()) {
        return Err(CollectError::Shape(format!("unreadable header {header:?}")));
    }

    let rows = data_lines
        .iter()
        .map(|line| {
            spans
                .iter()
                .enumerate()
                .map(|(i, &(begin, end))| {
                    let value = cell(line, begin, end, i + 1 == spans.len());
                    (header[i].clone(), value.trim().to_string())
                })
                .collect()
        })
        .collect();
    Ok(rows)
}

fn column_spans(lines: &[Vec<char>]) -> Vec<(usize, usize)> {
    let width = lines.iter().map(|l| l.len()).max().unwrap_or_default();
    let is_separator = |offset: usize| {
        lines
            .iter()
            .all(|l| l.get(offset).is_some_and(|c| c.is_whitespace()))
    };

    let mut spans = vec![];
    let mut begin = 0;
    loop {
        while begin < width && is_separator(begin) {
            begin += 1;
        }
        if begin >= width {
            break;
        }
        let mut end = begin;
        while end < width && !is_separator(end) {
            end += 1;
        }
        spans.push((begin, end));
        begin = end;
    }
    spans
}

fn cell(line: &[char], begin: usize, end: usize, to_line_end: bool) -> String {
    let end = if to_line_end { line.len() } else { end.min(line.len()) };
    if begin >= end {
        return String::new();
    }
    line[begin..end].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ps_like(headers: &[&str], rows: &[&[&str]]) -> String {
        //right align everything but the last column, like ps does for numbers
        let encoded: Vec<String> = headers.iter().map(|h| encode_heading(h)).collect();
        let widths: Vec<usize> = encoded.iter().map(|h| h.len()).collect();
        let mut out = String::new();
        let all = std::iter::once(encoded.iter().map(|s| s.as_str()).collect::<Vec<_>>())
            .chain(rows.iter().map(|r| r.to_vec()));
        for line in all {
            let mut cells = vec![];
            for (i, value) in line.iter().enumerate() {
                if i + 1 == line.len() {
                    cells.push(value.to_string());
                } else {
                    cells.push(format!("{value:>w$}", w = widths[i]));
                }
            }
            out.push_str(&cells.join(" "));
            out.push('\n');
        }
        out
    }

    #[test]
    fn heading_is_wrapped_in_sentinels() {
        let h = encode_heading("pid");
        assert_eq!(h.len(), 43);
        assert!(h.starts_with("{{{{{{{{{{{{{{{{{{{{pid"));
        assert_eq!(decode_heading(&format!("  {h} ")), "pid");
    }

    #[test]
    fn splits_rows_and_keeps_command_spacing() {
        let text = ps_like(
            &["pid", "ppid", "user", "args"],
            &[
                &["1", "0", "root", "/sbin/init splash"],
                &["4242", "1", "alice", "vim  two  spaces.txt"],
            ],
        );
        let rows = split_columns(&text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["pid"], "1");
        assert_eq!(rows[0]["args"], "/sbin/init splash");
        assert_eq!(rows[1]["pid"], "4242");
        assert_eq!(rows[1]["user"], "alice");
        assert_eq!(rows[1]["args"], "vim  two  spaces.txt");
    }

    #[test]
    fn header_only_yields_no_rows() {
        let text = ps_like(&["pid", "args"], &[]);
        assert!(split_columns(&text).unwrap().is_empty());
    }

    #[test]
    fn empty_output_is_a_shape_error() {
        assert!(matches!(split_columns("\n \n"), Err(CollectError::Shape(_))));
    }
}
