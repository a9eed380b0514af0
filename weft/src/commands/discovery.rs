//! Discovery and inspection commands.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use weft_core::{changed_packages, ChangeSource, GitChangeSource, PackageFilter, StaticChangeSource};

use crate::formatting::{
    print_changed_table, print_key_value, print_package_table, print_section_header, print_warning, SectionStyle,
};

use super::{load_workspace, select_packages, FilterArgs};

pub fn cmd_list(config: Option<&Path>, filter: &FilterArgs, json: bool, graph: bool) -> Result<()> {
    let workspace = load_workspace(config)?;
    let packages = select_packages(&workspace, &filter.to_filter())?;

    if json {
        if graph {
            let subgraph = workspace.graph().subgraph(packages.iter().map(|p| p.name.as_str()));
            println!("{}", serde_json::to_string_pretty(&subgraph.to_adjacency())?);
        } else {
            let list: Vec<_> = packages.iter().map(|p| p.as_ref()).collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        return Ok(());
    }

    print_section_header(
        &format!("Packages in {}", workspace.config().display_name()),
        SectionStyle::Primary,
    );

    if packages.is_empty() {
        print_warning("No packages matched");
        println!();
        return Ok(());
    }

    if graph {
        let full = workspace.graph();
        for pkg in &packages {
            let deps: Vec<String> = full.dependencies(&pkg.name).iter().map(|d| d.name.clone()).collect();
            if deps.is_empty() {
                println!("  {}", pkg.name.bold().white());
            } else {
                println!(
                    "  {} {} {}",
                    pkg.name.bold().white(),
                    "→".cyan(),
                    deps.join(", ").bright_black()
                );
            }
        }
    } else {
        let rows: Vec<(String, String, String, Vec<String>)> = packages
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    p.version.clone(),
                    workspace.relative_path(p).display().to_string(),
                    p.workspace_dependencies.iter().cloned().collect(),
                )
            })
            .collect();
        print_package_table(&rows);
    }
    println!();
    print_key_value("Total", &packages.len().to_string());
    println!();

    Ok(())
}

pub fn cmd_graph(config: Option<&Path>, json: bool, dot: bool, batches: bool) -> Result<()> {
    let workspace = load_workspace(config)?;
    let graph = workspace.graph();

    if dot {
        println!("{}", graph.to_dot());
        return Ok(());
    }

    let levels = graph.parallel_batches()?;
    let order: Vec<&str> = levels.iter().flatten().map(|p| p.name.as_str()).collect();

    if json {
        let batch_names: Vec<Vec<&str>> = levels
            .iter()
            .map(|batch| batch.iter().map(|p| p.name.as_str()).collect())
            .collect();
        let graph_data = serde_json::json!({
            "order": order,
            "batches": batch_names,
            "dependencies": graph.to_adjacency(),
        });
        println!("{}", serde_json::to_string_pretty(&graph_data)?);
        return Ok(());
    }

    print_section_header("Dependency Graph", SectionStyle::Primary);

    if order.is_empty() {
        print_warning("No packages found");
    } else if batches {
        for (idx, batch) in levels.iter().enumerate() {
            let names: Vec<&str> = batch.iter().map(|p| p.name.as_str()).collect();
            println!(
                "  {} {}",
                format!("batch {:2}", idx + 1).bright_black(),
                names.join(", ").bold().white()
            );
        }
    } else {
        for (idx, name) in order.iter().enumerate() {
            println!("  {} {}", format!("{:2}", idx + 1).bright_black(), name.bold().white());
        }
    }
    println!();

    Ok(())
}

pub fn cmd_changed(config: Option<&Path>, since: &str, include_dependents: bool, json: bool) -> Result<()> {
    let workspace = load_workspace(config)?;
    let files = GitChangeSource::new(workspace.root()).changed_files(since)?;
    let filter = PackageFilter::new().with_since(since, include_dependents);
    let selected = workspace.filter_packages(&filter, Some(&StaticChangeSource::new(files.clone())))?;

    let direct: HashSet<String> = changed_packages(&workspace.packages(), workspace.root(), &files)
        .into_iter()
        .map(|p| p.name.clone())
        .collect();

    let rows: Vec<(String, &str)> = selected
        .iter()
        .map(|p| {
            let reason = if direct.contains(&p.name) { "changed" } else { "dependent" };
            (p.name.clone(), reason)
        })
        .collect();

    if json {
        let entries: Vec<_> = rows
            .iter()
            .map(|(name, reason)| serde_json::json!({ "name": name, "reason": reason }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    print_section_header(&format!("Changed since {}", since), SectionStyle::Primary);
    if rows.is_empty() {
        print_warning("No packages changed");
    } else {
        print_changed_table(&rows);
        println!();
        print_key_value("Changed", &direct.len().to_string());
        print_key_value("Selected", &rows.len().to_string());
    }
    println!();

    Ok(())
}
