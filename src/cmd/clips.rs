//! Per-suggestion commands: `adjust` and `export`.

use anyhow::{Context, Result, bail};
use console::style;
use futures::future::join_all;

use clipflow::models::IntervalField;
use clipflow::ui::icons::{CHECK, CROSS, SCISSORS};
use clipflow::ui::{format_clock, suggestion_line};

use super::super::Cli;
use super::connect;

pub async fn cmd_adjust(
    cli: &Cli,
    id: &str,
    index: usize,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<()> {
    if start.is_none() && end.is_none() {
        bail!("Nothing to adjust: pass --start and/or --end");
    }
    let (_, orchestrator) = connect(cli)?;
    let session = orchestrator
        .open(id)
        .await
        .with_context(|| format!("Failed to load work item {}", id))?;

    for (field, raw) in [(IntervalField::Start, start), (IntervalField::End, end)] {
        if let Some(raw) = raw {
            session.set_pending(index, field, raw)?;
        }
    }
    let effective = session.effective(index)?;
    println!(
        "{}Committing {}-{} for suggestion {}",
        SCISSORS,
        format_clock(effective.start),
        format_clock(effective.end),
        index
    );

    let updated = session
        .commit_interval(index)
        .await
        .with_context(|| format!("Could not update suggestion {}", index))?;
    println!("{}{}", CHECK, suggestion_line(index, &updated, None));
    Ok(())
}

pub async fn cmd_export(cli: &Cli, id: &str, indices: &[usize]) -> Result<()> {
    let (_, orchestrator) = connect(cli)?;
    let session = orchestrator
        .open(id)
        .await
        .with_context(|| format!("Failed to load work item {}", id))?;

    println!(
        "{}Exporting {} clip(s) from {}",
        SCISSORS,
        indices.len(),
        id
    );
    let outcomes = join_all(indices.iter().map(|&index| {
        let session = session.clone();
        async move { (index, session.export(index).await) }
    }))
    .await;

    let mut failed = 0;
    for (index, outcome) in outcomes {
        match outcome {
            Ok(file_ref) => println!("{}{:>3}  {}", CHECK, index, style(file_ref).dim()),
            Err(e) => {
                failed += 1;
                println!("{}{:>3}  {}", CROSS, index, style(e).red());
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} export(s) failed", failed, indices.len());
    }
    Ok(())
}
