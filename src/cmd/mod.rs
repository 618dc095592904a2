//! CLI command implementations.
//!
//! | Module    | Commands handled                                  |
//! |-----------|---------------------------------------------------|
//! | `item`    | `Info`, `Library`, `Status`, `Suggestions`, `Exports` |
//! | `run`     | `Run`, `Process`, `Reanalyze`                     |
//! | `clips`   | `Adjust`, `Export`                                |
//! | `config`  | `Config`                                          |

pub mod clips;
pub mod config;
pub mod item;
pub mod run;

pub use clips::{cmd_adjust, cmd_export};
pub use config::cmd_config;
pub use item::{cmd_exports, cmd_info, cmd_library, cmd_status, cmd_suggestions};
pub use run::{cmd_process, cmd_reanalyze, cmd_run};

use anyhow::Result;
use std::sync::Arc;

use clipflow::backend::HttpBackend;
use clipflow::config::Config;
use clipflow::workflow::Orchestrator;

use super::Cli;

/// Resolve configuration and build an orchestrator against the configured backend.
pub(crate) fn connect(cli: &Cli) -> Result<(Config, Orchestrator)> {
    let config = Config::load(
        cli.config.clone(),
        cli.backend_url.clone(),
        cli.verbose,
        cli.yes,
    )?;
    config.ensure_usable()?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    let backend = HttpBackend::new(config.backend())?;
    tracing::debug!(backend = %backend.base_url(), "Using backend");
    let orchestrator = Orchestrator::new(Arc::new(backend)).with_bounds(config.clip_bounds());
    Ok((config, orchestrator))
}
