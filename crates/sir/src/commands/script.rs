//! `script`: print the nsupdate scripts without running them.

use serde::Serialize;
use sir_core::{PemFileLoader, UpdateMode, UpdateScript, nsupdate};

use crate::cli::{GlobalOpts, ScriptArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Serializable view of one key-file group.
#[derive(Serialize)]
struct ScriptView<'a> {
    key_file: Option<String>,
    script: &'a str,
}

impl<'a> From<&'a UpdateScript> for ScriptView<'a> {
    fn from(s: &'a UpdateScript) -> Self {
        Self {
            key_file: s.key_file.as_ref().map(|p| p.display().to_string()),
            script: &s.body,
        }
    }
}

pub fn handle(args: &ScriptArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let mut graph = config::load_graph(&resolved.document)?;

    let mode = if args.update {
        UpdateMode::Replace
    } else {
        UpdateMode::Add
    };
    let scripts = nsupdate::generate(&mut graph, mode, &PemFileLoader)?;

    let views: Vec<ScriptView<'_>> = scripts.iter().map(ScriptView::from).collect();
    let out = output::render_single(&global.output, &views, |_| {
        nsupdate::render_all(&scripts).trim_end().to_owned()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
