//! Table formatting using comfy-table.

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use owo_colors::OwoColorize;
use weft_core::{BatchResult, BumpType, ExecutionResult, ExecutionStatus, PackageRelease};

use super::output::format_duration;
use super::status::Status;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Prints packages as rows of (name, version, path, workspace deps).
pub fn print_package_table(rows: &[(String, String, String, Vec<String>)]) {
    let mut table = new_table(&["Package", "Version", "Path", "Depends on"]);

    for (name, version, path, deps) in rows {
        let deps_str = if deps.is_empty() {
            "-".to_string()
        } else {
            deps.join(", ")
        };
        table.add_row(vec![
            Cell::new(name).fg(Color::White),
            Cell::new(version).fg(Color::Cyan),
            Cell::new(path).fg(Color::DarkGrey),
            Cell::new(deps_str),
        ]);
    }

    println!("{}", table);
}

/// Prints planned releases with their bump size and version change.
pub fn print_release_table(releases: &[PackageRelease]) {
    let mut table = new_table(&["Type", "Package", "Version", "Commits"]);

    for release in releases {
        let (label, color) = match release.bump {
            BumpType::Major => ("MAJOR", Color::Red),
            BumpType::Minor => ("MINOR", Color::Yellow),
            BumpType::Patch => ("PATCH", Color::Green),
            BumpType::None => ("NONE", Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(label).fg(color),
            Cell::new(&release.name).fg(Color::White),
            Cell::new(format!("{} → {}", release.old_version, release.new_version)).fg(Color::Cyan),
            Cell::new(release.commits.len()),
        ]);
    }

    println!("{}", table);
}

/// Prints one package per line.
pub fn print_package_list(packages: &[String]) {
    if packages.is_empty() {
        println!("  {} {}", "→".cyan(), "(none)".bright_black());
        return;
    }

    for pkg in packages {
        println!("  {} {}", "→".cyan(), pkg.bold().white());
    }
}

/// Prints changed packages with why each was selected.
pub fn print_changed_table(rows: &[(String, &str)]) {
    let mut table = new_table(&["Package", "Reason"]);
    for (name, reason) in rows {
        let color = if *reason == "changed" { Color::Yellow } else { Color::DarkGrey };
        table.add_row(vec![Cell::new(name).fg(Color::White), Cell::new(reason).fg(color)]);
    }
    println!("{}", table);
}

fn details(result: &ExecutionResult) -> String {
    if let Some(error) = &result.error {
        return error.clone();
    }
    match result.status {
        ExecutionStatus::Failure => {
            let last_line = result.stderr.trim().lines().last().unwrap_or_default();
            match (last_line.is_empty(), result.exit_code) {
                (false, _) => last_line.to_string(),
                (true, Some(code)) => format!("exited with code {}", code),
                (true, None) => "command failed".to_string(),
            }
        }
        _ => String::new(),
    }
}

/// Prints one row per package in dispatch order.
pub fn print_result_table(batch: &BatchResult) {
    let mut table = new_table(&["Status", "Package", "Duration", "Details"]);

    for result in batch.sorted_by_index() {
        let status = Status::from(result.status);
        let color = match result.status {
            ExecutionStatus::Success => Color::Green,
            ExecutionStatus::Failure => Color::Red,
            ExecutionStatus::Skipped => Color::Yellow,
            ExecutionStatus::Cancelled => Color::DarkGrey,
        };
        let duration = match result.status {
            ExecutionStatus::Success | ExecutionStatus::Failure => format_duration(result.duration),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(status.symbol()).fg(color),
            Cell::new(&result.package).fg(if result.is_failure() { Color::Red } else { Color::White }),
            Cell::new(duration).fg(Color::DarkGrey),
            Cell::new(details(result)).fg(color),
        ]);
    }

    println!("{}", table);
}
