//! `config` subcommands. These never contact the backend.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(fleetsync_config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let format = global.output.unwrap_or(OutputFormat::Table);
            let out = match format {
                OutputFormat::Table | OutputFormat::Plain => cfg.to_toml()?,
                structured => output::render_single(structured, &cfg, |_| String::new(), |_| {
                    String::new()
                })?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }
    }
}
