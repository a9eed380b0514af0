//! Command execution across packages.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use indicatif::ProgressBar;
use owo_colors::OwoColorize;
use weft_core::{
    BatchResult, CancelHandle, CommandSpec, ExecutionEngine, ExecutionMetrics, Package, RunOptions,
};

use crate::formatting::{
    create_progress_bar, format_duration, print_key_value, print_result_table, print_section_header,
    print_separator_with_spacing, print_success, print_summary_box, print_warning, SectionStyle,
};

use super::{load_workspace, select_packages, select_script_packages, FilterArgs, RunArgs};

pub fn cmd_run(config: Option<&Path>, script_name: &str, filter: &FilterArgs, args: &RunArgs) -> Result<()> {
    let workspace = load_workspace(config)?;
    let script = workspace.script(script_name)?.clone();

    let packages = select_script_packages(&workspace, &filter.to_filter(), &script)?;

    let options = workspace.config().run_options(Some(&script), &args.overrides());
    let env = workspace.config().environment(Some(&script), &args.env_map());
    let spec = CommandSpec::new(script.run.clone()).with_env(env);

    let title = match &script.description {
        Some(description) => format!("Running {} ({})", script_name, description),
        None => format!("Running {}", script_name),
    };
    execute(&title, packages, &spec, options, args.json)
}

pub fn cmd_exec(config: Option<&Path>, command: &[String], filter: &FilterArgs, args: &RunArgs) -> Result<()> {
    let workspace = load_workspace(config)?;
    let packages = select_packages(&workspace, &filter.to_filter())?;

    let options = workspace.config().run_options(None, &args.overrides());
    let env = workspace.config().environment(None, &args.env_map());
    let spec = CommandSpec::new(command.join(" ")).with_env(env);

    execute(&format!("Running `{}`", spec.command), packages, &spec, options, args.json)
}

fn execute(title: &str, packages: Vec<Arc<Package>>, spec: &CommandSpec, options: RunOptions, json: bool) -> Result<()> {
    if packages.is_empty() {
        if json {
            println!("{}", serde_json::to_string_pretty(&BatchResult::new())?);
        } else {
            print_warning("No packages matched");
        }
        return Ok(());
    }

    let cancel = CancelHandle::new();
    let handle = cancel.clone();
    ctrlc::set_handler(move || {
        handle.cancel();
    })
    .map_err(|e| anyhow::anyhow!("Failed to set signal handler: {}", e))?;

    if !json {
        print_section_header(title, SectionStyle::Primary);
        print_key_value("Packages", &packages.len().to_string());
        print_key_value("Concurrency", &options.concurrency.to_string());
        print_key_value("Order", if options.topological { "topological" } else { "parallel" });
        println!();
    }

    let pb = if json {
        ProgressBar::hidden()
    } else {
        create_progress_bar(packages.len() as u64)
    };
    let progress = pb.clone();

    let engine = ExecutionEngine::new(options.concurrency)?
        .with_fail_fast(options.fail_fast)
        .with_cancel_handle(cancel)
        .on_result(move |result| {
            progress.inc(1);
            progress.set_message(result.package.clone());
        });

    let rt = tokio::runtime::Runtime::new().map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;
    let batch = rt.block_on(engine.run(&packages, spec, options.topological))?;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
    } else {
        print_output(&batch);
        print_report(&batch);
    }

    let code = batch.exit_code();
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}

fn print_output(batch: &BatchResult) {
    for result in batch.sorted_by_index() {
        let prefix = format!("[{}]", result.package);
        for line in result.stdout.lines() {
            println!("  {} {}", prefix.bright_black().bold(), line);
        }
        for line in result.stderr.lines() {
            eprintln!("  {} {}", prefix.bright_black().bold(), line.bright_red());
        }
    }
}

fn print_report(batch: &BatchResult) {
    print_separator_with_spacing();
    print_section_header("Results", SectionStyle::Primary);
    print_result_table(batch);
    println!();

    if batch.any_failure() || batch.cancelled_count() > 0 {
        print_warning(&format!(
            "{} succeeded, {} failed, {} skipped, {} cancelled",
            batch.success_count(),
            batch.failure_count(),
            batch.skipped_count(),
            batch.cancelled_count()
        ));
    } else {
        print_success(&format!("All {} packages succeeded", batch.success_count()));
    }
    println!();

    let metrics = ExecutionMetrics::from_batch(batch);
    let duration = format_duration(metrics.total_duration);
    let average = format_duration(metrics.average_package_duration());
    let rate = format!("{:.0}%", metrics.success_rate() * 100.0);
    let slowest = metrics
        .slowest_package()
        .map(|(name, d)| format!("{} ({})", name, format_duration(d)))
        .unwrap_or_else(|| "-".to_string());
    print_summary_box(
        "Summary",
        &[
            ("Duration", &duration),
            ("Average", &average),
            ("Slowest", &slowest),
            ("Success Rate", &rate),
        ],
    );
    println!();
}
