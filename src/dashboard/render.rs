//! Terminal renderers for a [`DashboardFrame`].

use std::fmt::Write;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::dashboard::{ChartPanel, DashboardFrame};
use crate::product::DashboardError;

const BAR: char = '█';

/// Default bar length, in characters, of the largest value in a chart
pub const DEFAULT_BAR_WIDTH: usize = 40;

/// One-line description of the active selection
pub fn selection_line(frame: &DashboardFrame) -> String {
    let categories = frame.selection.categories();
    if frame.select_all {
        format!("Categories: all ({})", categories.len())
    } else if categories.is_empty() {
        "Categories: none".to_string()
    } else {
        format!("Categories: {}", categories.join(", "))
    }
}

/// Horizontal bar charts, one per panel
pub fn render_text(frame: &DashboardFrame, bar_width: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", selection_line(frame));
    for panel in &frame.panels {
        out.push('\n');
        render_panel(&mut out, panel, bar_width);
    }
    out
}

fn render_panel(out: &mut String, panel: &ChartPanel, bar_width: usize) {
    let _ = writeln!(out, "== {} ==", panel.title);
    let _ = writeln!(out, "{} / {}", panel.y_label, panel.x_label);

    if panel.result.is_empty() {
        let _ = writeln!(out, "(no data)");
        return;
    }

    let label_width = panel
        .result
        .entries
        .iter()
        .map(|e| e.category.chars().count())
        .max()
        .unwrap_or(0);
    let max = panel.result.max_value().unwrap_or(0.0);

    for entry in &panel.result.entries {
        let len = bar_len(entry.value.as_f64(), max, bar_width);
        let _ = writeln!(
            out,
            "{:<label_width$} {} {}",
            entry.category,
            BAR.to_string().repeat(len),
            entry.value
        );
    }
}

/// Bar length scaled so `max` fills `width`; positive values get at least one cell
fn bar_len(value: f64, max: f64, width: usize) -> usize {
    if value <= 0.0 || max <= 0.0 || !value.is_finite() {
        return 0;
    }
    let scaled = (value / max * width as f64).round() as usize;
    scaled.clamp(1, width.max(1))
}

/// One table per panel
pub fn render_table(frame: &DashboardFrame) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", selection_line(frame));

    for panel in &frame.panels {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("#"),
            Cell::new(panel.y_label),
            Cell::new(panel.x_label),
        ]);

        for (rank, entry) in panel.result.entries.iter().enumerate() {
            table.add_row(vec![
                Cell::new(rank + 1),
                Cell::new(&entry.category),
                Cell::new(entry.value).set_alignment(CellAlignment::Right),
            ]);
        }

        let _ = writeln!(out, "\n{}", panel.title);
        if panel.result.is_empty() {
            let _ = writeln!(out, "(no data)");
        } else {
            let _ = writeln!(out, "{table}");
        }
    }
    out
}

pub fn render_json(frame: &DashboardFrame) -> Result<String, DashboardError> {
    Ok(serde_json::to_string_pretty(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::CHARTS;
    use crate::product::selection::CategorySelection;
    use crate::product::{AggregateEntry, AggregateResult, AggregateValue, Metric};

    fn frame(entries: Vec<(&str, AggregateValue)>, select_all: bool) -> DashboardFrame {
        let result = AggregateResult {
            metric: Metric::Count,
            entries: entries
                .into_iter()
                .map(|(category, value)| AggregateEntry {
                    category: category.to_string(),
                    value,
                })
                .collect(),
        };
        let categories = result.entries.iter().map(|e| e.category.clone()).collect();
        DashboardFrame {
            select_all,
            selection: CategorySelection::explicit(categories),
            panels: vec![ChartPanel {
                title: "Top 10 categories by product count".to_string(),
                x_label: CHARTS[0].2,
                y_label: "Product category",
                result,
            }],
        }
    }

    #[test]
    fn test_text_bars_scale_to_max() {
        let frame = frame(
            vec![("toys", AggregateValue::Int(4)), ("books", AggregateValue::Int(1))],
            true,
        );
        let text = render_text(&frame, 8);
        assert!(text.starts_with("Categories: all (2)\n"));
        assert!(text.contains("toys  ████████ 4\n"));
        assert!(text.contains("books ██ 1\n"));
    }

    #[test]
    fn test_empty_panel_says_no_data() {
        let frame = frame(vec![], false);
        let text = render_text(&frame, DEFAULT_BAR_WIDTH);
        assert!(text.starts_with("Categories: none\n"));
        assert!(text.contains("(no data)"));
        assert!(render_table(&frame).contains("(no data)"));
    }

    #[test]
    fn test_bar_len_edges() {
        assert_eq!(bar_len(0.0, 10.0, 20), 0);
        assert_eq!(bar_len(0.01, 10.0, 20), 1);
        assert_eq!(bar_len(10.0, 10.0, 20), 20);
        assert_eq!(bar_len(5.0, 0.0, 20), 0);
    }

    #[test]
    fn test_table_lists_ranks() {
        let frame = frame(vec![("toys", AggregateValue::Float(82.0))], false);
        let table = render_table(&frame);
        assert!(table.contains("Categories: toys"));
        assert!(table.contains("toys"));
        assert!(table.contains("82.00"));
    }

    #[test]
    fn test_json_document() {
        let frame = frame(vec![("toys", AggregateValue::Int(2))], true);
        let json: serde_json::Value = serde_json::from_str(&render_json(&frame).unwrap()).unwrap();
        assert_eq!(json["select_all"], true);
        assert_eq!(json["selection"]["categories"][0], "toys");
        assert_eq!(json["panels"][0]["result"]["metric"], "count");
        assert_eq!(json["panels"][0]["result"]["entries"][0]["value"], 2);
    }
}
