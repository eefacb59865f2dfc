//! refdoc - render collapsible, sortable reference pages
//!
//! A CLI tool that turns JSON section specs, formatting rules and table
//! definitions into a single HTML page.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, InputArgs};
use refdoc::config::CONFIG_FILE;
use refdoc::section::check_document;
use refdoc::text_format::FormattingDocument;
use refdoc::toc::NoLayout;
use refdoc::{load_roots, NavOutcome, Page, SiteConfig, TableDefinitions, TextFormatter, Viewer};
use std::path::{Path, PathBuf};

/// Main entry point for the refdoc CLI application
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Run the CLI application
fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            anchor,
            no_auto_format,
        } => {
            init_logging(input.verbose);
            handle_build_command(&input, &output, anchor.as_deref(), no_auto_format)?;
        }

        Commands::Outline { input } => {
            init_logging(input.verbose);
            handle_outline_command(&input)?;
        }

        Commands::Validate { input } => {
            init_logging(input.verbose);
            handle_validate_command(&input)?;
        }
    }

    Ok(())
}

/// Verbose output logs at Info; otherwise `RUST_LOG` decides, defaulting to warnings
fn init_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }
}

/// Load the site configuration, or build a single-root one from --sections
fn load_config(input: &InputArgs) -> Result<SiteConfig> {
    if let Some(sections) = &input.sections {
        let config = SiteConfig::single_root(
            sections.clone(),
            input.formatting.clone(),
            input.tables.clone(),
        );
        config
            .validate()
            .with_context(|| format!("Invalid input {}", sections.display()))?;
        return Ok(config);
    }

    let path = input
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    SiteConfig::load(&path).with_context(|| {
        format!(
            "Failed to load {}. Pass --sections to render a single spec without one",
            path.display()
        )
    })
}

/// Load every root and render it into a page
fn render_page(config: &SiteConfig) -> Page {
    let mut page = Page::new(config.title.clone());
    for loaded in load_roots(&config.root_sources()) {
        let auto_format = config.auto_format_for(&loaded.source.id);
        page.add_root(loaded, auto_format);
    }
    page
}

/// Handle the build command
fn handle_build_command(
    input: &InputArgs,
    output: &Path,
    anchor: Option<&str>,
    no_auto_format: bool,
) -> Result<()> {
    let mut config = load_config(input)?;
    if no_auto_format {
        config.auto_format = false;
    }

    println!("Building reference page...");
    println!("Roots: {}", config.roots.len());
    println!("Output: {}", output.display());

    println!("\n[Stage 1/3] Loading and rendering documents...");
    let page = render_page(&config);
    let table_count: usize = page.roots().iter().map(|root| root.tables.len()).sum();
    println!(
        "✓ Rendered {} roots with {} tables",
        page.roots().len(),
        table_count
    );

    println!("\n[Stage 2/3] Building table of contents...");
    let mut viewer = Viewer::new(page).with_threshold(config.scroll_threshold);
    match anchor {
        Some(anchor) => {
            if viewer.navigate_hash(anchor) == NavOutcome::Unknown {
                anyhow::bail!("Anchor '{}' does not match any heading", anchor);
            }
        }
        None => {
            // Without a layout the page sits at the top: first entry active
            viewer.scroll(0.0);
            viewer.frame(&NoLayout);
        }
    }
    println!("✓ {} outline entries", viewer.toc().len());

    println!("\n[Stage 3/3] Writing HTML...");
    let (page, toc) = viewer.into_parts();
    page.write(&toc, output)
        .with_context(|| format!("Failed to write HTML to {}", output.display()))?;
    println!("✓ Successfully wrote: {}", output.display());

    println!("\n✓ Build completed successfully!");

    Ok(())
}

/// Handle the outline command
fn handle_outline_command(input: &InputArgs) -> Result<()> {
    let config = load_config(input)?;
    let viewer = Viewer::new(render_page(&config));

    if viewer.toc().is_empty() {
        println!("(no headings)");
    } else {
        print!("{}", viewer.toc().outline());
    }

    Ok(())
}

/// Handle the validate command
fn handle_validate_command(input: &InputArgs) -> Result<()> {
    let config = load_config(input)?;
    let mut problems = 0;

    for root in config.root_sources() {
        println!("Root '{}':", root.id);
        problems += validate_sections(&root.sections)?;
        if let Some(path) = &root.formatting {
            problems += validate_formatting(path);
        }
        if let Some(path) = &root.tables {
            problems += validate_tables(path);
        }
    }

    for loaded in load_roots(&config.root_sources()) {
        for (reference, message) in loaded.resources.failures() {
            println!("  ✗ {} ({}): {}", reference, loaded.source.id, message);
            problems += 1;
        }
    }

    if problems > 0 {
        anyhow::bail!("Validation found {} problem(s)", problems);
    }
    println!("\n✓ No problems found");
    Ok(())
}

fn report(problems: &[String]) -> usize {
    for problem in problems {
        println!("  ✗ {}", problem);
    }
    problems.len()
}

fn validate_sections(path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read section spec {}", path.display()))?;
    let problems = check_document(&content)
        .with_context(|| format!("Failed to parse section spec {}", path.display()))?;
    if problems.is_empty() {
        println!("  ✓ sections: {}", path.display());
    }
    Ok(report(
        &problems
            .iter()
            .map(|e| format!("{}: {}", path.display(), e))
            .collect::<Vec<_>>(),
    ))
}

fn validate_formatting(path: &Path) -> usize {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            let document: FormattingDocument =
                serde_json::from_str(&content).map_err(|e| e.to_string())?;
            let formatter = TextFormatter::from_json(&content).map_err(|e| e.to_string())?;
            Ok((document.rules.len(), formatter.rule_count()))
        });

    match parsed {
        Ok((total, usable)) if total == usable => {
            println!("  ✓ formatting: {} rules", usable);
            0
        }
        Ok((total, usable)) => report(&[format!(
            "{}: {} of {} rules are unusable",
            path.display(),
            total - usable,
            total
        )]),
        Err(message) => report(&[format!("{}: {}", path.display(), message)]),
    }
}

fn validate_tables(path: &Path) -> usize {
    let definitions = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| TableDefinitions::from_json(&content).map_err(|e| e.to_string()));

    match definitions {
        Ok(definitions) => {
            let problems: Vec<String> = definitions
                .diagnostics()
                .iter()
                .map(|e| format!("{}: {}", path.display(), e))
                .collect();
            if problems.is_empty() {
                println!("  ✓ tables: {} definitions", definitions.len());
            }
            report(&problems)
        }
        Err(message) => report(&[format!("{}: {}", path.display(), message)]),
    }
}
