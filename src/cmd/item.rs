//! Read-only work item commands: metadata, library, status, suggestions, exports.

use anyhow::{Context, Result};
use console::style;

use clipflow::ui::icons::{FILM, SCISSORS};
use clipflow::ui::{flags_column, format_clock, suggestion_line};

use super::super::Cli;
use super::connect;

pub async fn cmd_info(cli: &Cli, url: &str) -> Result<()> {
    let (_, orchestrator) = connect(cli)?;
    let (session, resolution) = orchestrator
        .resolve(url)
        .await
        .context("Failed to resolve video metadata")?;
    let meta = &resolution.metadata;

    println!();
    println!("{}{}", FILM, style(&meta.title).bold());
    println!("  id:       {}", resolution.id);
    if let Some(author) = &meta.author {
        println!("  author:   {}", author);
    }
    if let Some(duration) = meta.duration_seconds {
        println!("  duration: {}", format_clock(duration));
    }
    if let Some(views) = meta.view_count {
        println!("  views:    {}", views);
    }
    if resolution.cached {
        println!(
            "  {} {}",
            style("cached").dim(),
            style(format!("(phase: {})", session.phase())).dim()
        );
    }
    println!();
    Ok(())
}

pub async fn cmd_library(cli: &Cli) -> Result<()> {
    let (_, orchestrator) = connect(cli)?;
    let items = orchestrator
        .library()
        .await
        .context("Failed to list processed videos")?;

    println!();
    if items.is_empty() {
        println!("No videos processed yet. Run 'clipflow process <url>' to start.");
        println!();
        return Ok(());
    }
    println!("{:<14} {:<6} {:<20} Title", "Id", "Flags", "Updated");
    println!("{:<14} {:<6} {:<20} -----", "--------------", "-----", "-------");
    for item in &items {
        let flags = item
            .stage_state
            .as_ref()
            .map(flags_column)
            .unwrap_or_else(|| "?????".to_string());
        println!(
            "{:<14} {:<6} {:<20} {}",
            item.id,
            flags,
            item.last_updated.as_deref().unwrap_or("-"),
            item.title
        );
    }
    println!();
    println!("{}", style("Flags: I=info A=audio T=transcript S=suggestions E=exports").dim());
    println!();
    Ok(())
}

pub async fn cmd_status(cli: &Cli, id: &str) -> Result<()> {
    let (_, orchestrator) = connect(cli)?;
    let session = orchestrator
        .open(id)
        .await
        .with_context(|| format!("Failed to load work item {}", id))?;
    let state = session.stage_state();
    let item = session.work_item();

    let mark = |done: bool| {
        if done {
            style("done").green().to_string()
        } else {
            style("pending").yellow().to_string()
        }
    };

    println!();
    println!("{}{}", FILM, style(item.title().unwrap_or(&item.id)).bold());
    println!("  url:           {}", item.url);
    println!("  phase:         {}", session.phase());
    println!("  info:          {}", mark(state.info_fetched));
    println!("  audio:         {}", mark(state.audio_ready));
    println!("  transcript:    {}", mark(state.transcript_ready));
    println!("  analysis:      {}", mark(state.analyzed));
    println!("  exports:       {}", mark(state.has_exports));
    println!("  suggestions:   {}", session.suggestions().len());
    println!();
    Ok(())
}

pub async fn cmd_suggestions(cli: &Cli, id: &str) -> Result<()> {
    let (_, orchestrator) = connect(cli)?;
    let session = orchestrator
        .open(id)
        .await
        .with_context(|| format!("Failed to load work item {}", id))?;
    let suggestions = session.suggestions();

    println!();
    if suggestions.is_empty() {
        println!("No suggestions yet. Run 'clipflow run {}' first.", id);
        println!();
        return Ok(());
    }
    for (index, suggestion) in suggestions.iter().enumerate() {
        println!("{}", suggestion_line(index, suggestion, None));
        if cli.verbose && !suggestion.description.is_empty() {
            println!("       {}", style(&suggestion.description).dim());
        }
    }
    println!();
    Ok(())
}

pub async fn cmd_exports(cli: &Cli, id: &str) -> Result<()> {
    let (_, orchestrator) = connect(cli)?;
    let session = orchestrator
        .open(id)
        .await
        .with_context(|| format!("Failed to load work item {}", id))?;
    let clips = session
        .list_exports()
        .await
        .context("Failed to list exported clips")?;

    println!();
    if clips.is_empty() {
        println!("No clips exported for {}.", id);
    }
    for clip in &clips {
        println!(
            "{}{}-{}  {}",
            SCISSORS,
            format_clock(clip.start),
            format_clock(clip.end),
            clip.title.as_deref().unwrap_or(&clip.file_ref)
        );
        println!("     {}", style(&clip.file_ref).dim());
    }
    println!();
    Ok(())
}
