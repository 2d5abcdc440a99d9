//! Plain-text rendering of the result table.

use std::fmt::Write as _;

use buffer_search_presenter::{RenderModel, ResultRow, ResultStatus, TableView};

const FIXED_COLUMNS: [&str; 2] = ["ID", "COORDINATES"];

/// Renders the visible page of `model` as an aligned text table.
pub fn render_table(model: &RenderModel, view: &TableView) -> String {
    match &model.status {
        ResultStatus::Idle => return "No search yet.\n".to_string(),
        ResultStatus::Loading => return "Searching...\n".to_string(),
        ResultStatus::Failed(message) => return format!("Search failed: {message}\n"),
        ResultStatus::NoResults => return "No features found.\n".to_string(),
        ResultStatus::Results => {}
    }

    let rows = view.visible_rows(&model.rows);
    let headers: Vec<&str> = FIXED_COLUMNS
        .iter()
        .copied()
        .chain(model.columns.iter().map(String::as_str))
        .collect();
    let cells: Vec<Vec<&str>> = rows.iter().map(|row| row_cells(row, &model.columns)).collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let mut out = String::new();
    write_line(&mut out, &headers, &widths);
    let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    let _ = writeln!(out, "{}", "-".repeat(total));
    for row in &cells {
        write_line(&mut out, row, &widths);
    }
    let _ = writeln!(
        out,
        "\n{} feature(s), page {} of {}",
        model.rows.len(),
        view.page() + 1,
        view.page_count(model.rows.len())
    );
    out
}

fn row_cells<'a>(row: &'a ResultRow, columns: &[String]) -> Vec<&'a str> {
    let mut cells = vec![row.display_id.as_str(), row.coordinates.as_str()];
    cells.extend(columns.iter().map(|column| row.cell(column)));
    cells
}

fn write_line(out: &mut String, cells: &[&str], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(out, "{}", line.join("  ").trim_end());
}
