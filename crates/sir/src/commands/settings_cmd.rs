//! Settings subcommand handlers.

use crate::cli::{GlobalOpts, SettingsArgs, SettingsCommand};
use crate::config::{self, Settings};
use crate::error::CliError;
use crate::output;

pub fn handle(args: SettingsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SettingsCommand::Show => {
            let settings = config::load_settings()?;
            let out = output::render_single(&global.output, &settings, format_settings)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SettingsCommand::Path => {
            output::print_output(&config::settings_path().display().to_string(), global.quiet);
            Ok(())
        }

        SettingsCommand::Init { force } => {
            let path = config::settings_path();
            if path.exists() && !force {
                return Err(CliError::SettingsExist {
                    path: path.display().to_string(),
                });
            }
            let written = config::save_settings(&Settings::default())?;
            if !global.quiet {
                let color = output::should_color(&global.color);
                eprintln!(
                    "{}",
                    output::success_line(&format!("Settings written to {}", written.display()), color)
                );
            }
            Ok(())
        }
    }
}

/// `key = value` lines in TOML syntax.
fn format_settings(s: &Settings) -> String {
    toml::to_string_pretty(s)
        .unwrap_or_default()
        .trim_end()
        .to_owned()
}
