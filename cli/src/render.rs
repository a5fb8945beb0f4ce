use owo_colors::OwoColorize;
use perfsheriff_core::AlertRecord;
use perfsheriff_core::SectionState;
use perfsheriff_core::should_display_alert;
use perfsheriff_core::should_display_expand_group_button;
use std::fmt::Write;

const GAP: &str = "  ";

struct Row<'a> {
    alert: &'a AlertRecord,
    cells: Vec<String>,
}

/// Render the displayed rows of `state` as an aligned table followed by the
/// summary line.
pub fn render_table(state: &SectionState, color: bool) -> String {
    let table = &state.table;
    let mut headers = vec!["#", ""];
    if table.show_triaged_column {
        headers.push("triaged");
    }
    if table.show_bug_column {
        headers.push("bug");
    }
    headers.extend(["revisions", "suite", "measurement"]);
    if table.show_master_column {
        headers.push("master");
    }
    headers.push("bot");
    if table.show_test_case_column {
        headers.push("case");
    }
    headers.extend(["delta", "%"]);

    let mut rows = Vec::new();
    for (group_index, group) in table.groups().unwrap_or_default().iter().enumerate() {
        let mut first_row = true;
        for (index, alert) in group.alerts.iter().enumerate() {
            if !should_display_alert(
                table.are_placeholders,
                table.showing_triaged,
                group,
                index,
                group.triaged.is_expanded,
            ) {
                continue;
            }
            let mut cells = Vec::with_capacity(headers.len());
            cells.push(if first_row {
                (group_index + 1).to_string()
            } else {
                String::new()
            });
            cells.push(
                if should_display_expand_group_button(group, index, table.showing_triaged)
                    && !group.is_expanded
                {
                    "+".to_string()
                } else {
                    String::new()
                },
            );
            if table.show_triaged_column {
                cells.push(if first_row && group.triaged.count > 0 {
                    group.triaged.count.to_string()
                } else {
                    String::new()
                });
            }
            if table.show_bug_column {
                cells.push(alert.bug_id.to_string());
            }
            cells.push(alert.revision_range());
            cells.push(alert.test_suite.clone());
            cells.push(alert.measurement.clone());
            if table.show_master_column {
                cells.push(alert.master.clone());
            }
            cells.push(alert.bot.clone());
            if table.show_test_case_column {
                cells.push(alert.test_case.clone());
            }
            cells.push(format!("{:+.4} {}", alert.delta_value, alert.base_unit.base()));
            cells.push(format!("{:+.1}%", alert.percent_delta_value * 100.0));
            rows.push(Row { alert, cells });
            first_row = false;
        }
    }

    let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    if !rows.is_empty() {
        let header = pad(headers.iter().map(ToString::to_string), &widths);
        if color {
            let _ = writeln!(out, "{}", header.bold());
        } else {
            let _ = writeln!(out, "{header}");
        }
        for row in &rows {
            let line = pad(row.cells.iter().cloned(), &widths);
            if !color {
                let _ = writeln!(out, "{line}");
            } else if row.alert.is_triaged() {
                let _ = writeln!(out, "{}", line.dimmed());
            } else if row.alert.improvement {
                let _ = writeln!(out, "{}", line.green());
            } else {
                let _ = writeln!(out, "{}", line.red());
            }
        }
    }
    let _ = writeln!(out, "{}", state.summary());
    out
}

fn pad(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    let cells: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    cells.join(GAP).trim_end().to_string()
}
