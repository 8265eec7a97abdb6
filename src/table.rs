//! Plain-text table rendering for previews and audit listings.

use std::fmt::Write as _;

use crate::{data::render_cell, frame::Table};

/// Renders up to `limit` rows of `table`; a footer notes any rows left out.
pub fn render_frame(table: &Table, limit: usize) -> String {
    let rows = table
        .rows()
        .iter()
        .take(limit)
        .map(|row| row.iter().map(|cell| render_cell(cell.as_ref())).collect())
        .collect::<Vec<Vec<String>>>();
    let mut output = render_table(table.columns(), &rows);
    let hidden = table.row_count().saturating_sub(rows.len());
    if hidden > 0 {
        let _ = writeln!(output, "... {hidden} more row(s)");
    }
    output
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| h.chars().count().max(3)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(clean(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_line(headers.iter().map(String::as_str), &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_line(rule.iter().map(String::as_str), &widths));
    for row in rows {
        let cleaned = row.iter().map(|cell| clean(cell)).collect::<Vec<_>>();
        let _ = writeln!(output, "{}", format_line(cleaned.iter().map(String::as_str), &widths));
    }
    output
}

fn format_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn clean(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_cell;

    #[test]
    fn render_table_aligns_columns() {
        let headers = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec!["1".to_string(), "Alice".to_string()],
            vec!["2".to_string(), "Bob".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines, vec!["id   name", "---  -----", "1    Alice", "2    Bob"]);
    }

    #[test]
    fn render_frame_limits_rows_and_shows_nulls_blank() {
        let table = Table::from_rows(
            "items",
            vec!["item_id".into(), "item_status".into()],
            vec![
                vec![parse_cell("1"), None],
                vec![parse_cell("2"), parse_cell("active")],
            ],
        );
        let rendered = render_frame(&table, 1);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[2], "1");
        assert_eq!(lines[3], "... 1 more row(s)");
    }
}
