//! CLI-side configuration: the loaded file with global flag overrides.

use clap::ValueEnum;

use fleetsync_config::Config;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Load the config file named by `--config` (which must exist), or the
/// platform default (which may not), then apply flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut config = match &global.config {
        Some(path) => fleetsync_config::load_config_file(path)?,
        None => fleetsync_config::load_config()?,
    };

    if let Some(url) = &global.api_url {
        config.api_url.clone_from(url);
    }
    if let Some(timeout) = global.timeout {
        config.timeout = timeout;
    }
    config.validate()?;
    Ok(config)
}

/// `--output`, else the configured default.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&config.output, true).unwrap_or(OutputFormat::Table)
    })
}
