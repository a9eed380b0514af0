//! Information and validation commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use weft_core::Package;

use crate::formatting::{
    print_error, print_key_value, print_package_list, print_section_header, print_separator_with_spacing,
    print_success, SectionStyle,
};

use super::load_workspace;

fn names(packages: &[Arc<Package>]) -> Vec<String> {
    packages.iter().map(|p| p.name.clone()).collect()
}

pub fn cmd_why(config: Option<&Path>, package: &str) -> Result<()> {
    let workspace = load_workspace(config)?;
    let pkg = workspace.get_package(package)?;
    let graph = workspace.graph();

    let deps = names(&graph.dependencies(&pkg.name));
    let all_deps = names(&graph.transitive_dependencies(&pkg.name));
    let dependents = names(&graph.dependents(&pkg.name));
    let all_dependents = names(&graph.transitive_dependents(&pkg.name));

    print_section_header("Package Dependencies", SectionStyle::Primary);
    print_key_value("Package", &pkg.name);
    print_key_value("Version", &pkg.version);
    print_key_value("Path", &workspace.relative_path(&pkg).display().to_string());
    print_separator_with_spacing();

    print_key_value("Depends on", &format!("{} packages", deps.len()));
    print_package_list(&deps);
    println!();

    print_key_value("Depends on (transitively)", &format!("{} packages", all_deps.len()));
    print_package_list(&all_deps);
    println!();

    print_key_value("Depended on by", &format!("{} packages", dependents.len()));
    print_package_list(&dependents);
    println!();

    print_key_value("Affects (transitively)", &format!("{} packages", all_dependents.len()));
    print_package_list(&all_dependents);
    println!();

    Ok(())
}

/// Discovery itself rejects duplicate names and malformed manifests, so a
/// workspace that loads only needs its graph and versions checked.
pub fn cmd_validate(config: Option<&Path>, json: bool) -> Result<()> {
    let workspace = load_workspace(config)?;
    let cycles = workspace.graph().cycles();

    let invalid_versions: Vec<(String, String, String)> = workspace
        .registry()
        .iter()
        .filter_map(|p| {
            semver::Version::parse(&p.version)
                .err()
                .map(|e| (p.name.clone(), p.version.clone(), e.to_string()))
        })
        .collect();

    let valid = cycles.is_empty() && invalid_versions.is_empty();

    if json {
        let versions: Vec<_> = invalid_versions
            .iter()
            .map(|(name, version, error)| serde_json::json!({ "package": name, "version": version, "error": error }))
            .collect();
        let report = serde_json::json!({
            "valid": valid,
            "packages": workspace.registry().len(),
            "cycles": cycles,
            "invalid_versions": versions,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let style = if valid { SectionStyle::Success } else { SectionStyle::Error };
        print_section_header("Validation", style);
        print_success(&format!("{} packages discovered, names are unique", workspace.registry().len()));

        if cycles.is_empty() {
            print_success("No circular dependencies detected");
        } else {
            for cycle in &cycles {
                print_error(&format!("Circular dependency between: {}", cycle.join(", ")));
            }
        }

        if invalid_versions.is_empty() {
            print_success("All versions are valid semver");
        } else {
            for (name, version, error) in &invalid_versions {
                print_error(&format!("{}: invalid version '{}' ({})", name, version, error));
            }
        }
        println!();
    }

    if !valid {
        std::process::exit(1);
    }

    Ok(())
}
