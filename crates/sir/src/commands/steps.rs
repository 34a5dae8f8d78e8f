//! Workflow step handlers (`key`, `cert`, …, `full`).

use sir_core::{PemFileLoader, Step, SystemRunner, Workflow};
use tracing::debug;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(step: Step, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let graph = config::load_graph(&resolved.document)?;
    debug!(
        %step,
        certs = graph.certs.len(),
        records = graph.record_count(),
        "document loaded"
    );

    let runner = SystemRunner;
    let loader = PemFileLoader;
    let mut workflow = Workflow::new(graph, resolved.settings.tools(), &runner, &loader);

    for text in workflow.run(step)? {
        output::print_output(&text, global.quiet);
    }

    if !global.quiet {
        let color = output::should_color(&global.color);
        eprintln!(
            "{}",
            output::success_line(&format!("{step}: {}", step.description()), color)
        );
    }
    Ok(())
}
