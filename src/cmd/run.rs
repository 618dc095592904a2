//! Pipeline commands: `run`, `process`, `reanalyze`.

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;

use clipflow::WorkflowSession;
use clipflow::ui::icons::{CHECK, SPARKLE, WARN};
use clipflow::ui::{StageProgress, suggestion_line};

use super::super::Cli;
use super::connect;

fn print_suggestions(session: &WorkflowSession) {
    let suggestions = session.suggestions();
    println!();
    println!("{}{} suggestion(s)", SPARKLE, suggestions.len());
    for (index, suggestion) in suggestions.iter().enumerate() {
        println!("{}", suggestion_line(index, suggestion, None));
    }
    println!();
}

pub async fn cmd_run(cli: &Cli, id: &str) -> Result<()> {
    let (_, orchestrator) = connect(cli)?;
    let session = orchestrator
        .open(id)
        .await
        .with_context(|| format!("Failed to load work item {}", id))?;

    if session.stage_state().pending().is_empty() {
        println!("{}All stages already complete for {}", CHECK, id);
        print_suggestions(&session);
        return Ok(());
    }

    let progress = StageProgress::new(cli.verbose);
    session
        .run_with(&progress)
        .await
        .with_context(|| format!("Pipeline stopped for {}; run again to resume", id))?;
    print_suggestions(&session);
    Ok(())
}

pub async fn cmd_process(cli: &Cli, url: &str) -> Result<()> {
    let (_, orchestrator) = connect(cli)?;
    let (session, resolution) = orchestrator
        .resolve(url)
        .await
        .context("Failed to resolve video metadata")?;
    println!(
        "{}{} {}",
        CHECK,
        style(&resolution.metadata.title).bold(),
        style(format!("({})", resolution.id)).dim()
    );

    let progress = StageProgress::new(cli.verbose);
    session.run_with(&progress).await.with_context(|| {
        format!(
            "Pipeline stopped for {}; resume with 'clipflow run {}'",
            resolution.id, resolution.id
        )
    })?;
    print_suggestions(&session);
    Ok(())
}

pub async fn cmd_reanalyze(cli: &Cli, id: &str) -> Result<()> {
    let (config, orchestrator) = connect(cli)?;
    let session = orchestrator
        .open(id)
        .await
        .with_context(|| format!("Failed to load work item {}", id))?;

    let current = session.suggestions().len();
    if current > 0 && !config.yes {
        println!(
            "{}This replaces all {} suggestion(s) and drops any unsaved edits.",
            WARN, current
        );
        let proceed = Confirm::new()
            .with_prompt("Re-analyze?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !proceed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    session
        .reanalyze()
        .await
        .with_context(|| format!("Re-analysis failed for {}", id))?;
    print_suggestions(&session);
    Ok(())
}
