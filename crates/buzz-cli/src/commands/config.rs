use crate::cli::ConfigCommands;
use crate::config_profiles::{default_config_path, normalize_text_option, CliConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            token,
            api_base_url,
            poll_interval,
            request_timeout,
        } => run_config_init(token, api_base_url, poll_interval, request_timeout),
        ConfigCommands::Show => run_config_show(),
        ConfigCommands::Logout => run_config_logout(),
    }
}

pub fn run_config_init(
    token: Option<String>,
    api_base_url: Option<String>,
    poll_interval: Option<u64>,
    request_timeout: Option<u64>,
) -> Result<(), CliError> {
    let existing = CliConfig::load().map_err(CliError::Config)?;
    let config = merge_config(existing, token, api_base_url, poll_interval, request_timeout)?;
    let path = config.save().map_err(CliError::Config)?;
    println!("Saved config to {}", path.display());
    if config.token.is_none() {
        println!("No token stored; set GITHUB_TOKEN or rerun with --token.");
    }
    Ok(())
}

/// Apply explicit values over the stored config and validate the result.
pub fn merge_config(
    mut config: CliConfig,
    token: Option<String>,
    api_base_url: Option<String>,
    poll_interval: Option<u64>,
    request_timeout: Option<u64>,
) -> Result<CliConfig, CliError> {
    if let Some(token) = normalize_text_option(token) {
        config.token = Some(token);
    }
    if let Some(url) = normalize_text_option(api_base_url) {
        config.sync.api_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(seconds) = poll_interval {
        config.sync.poll_interval_secs = seconds;
    }
    if let Some(seconds) = request_timeout {
        config.sync.request_timeout_secs = seconds;
    }
    config.sync.validate()?;
    Ok(config)
}

fn run_config_show() -> Result<(), CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    let sync = config.effective_sync().map_err(CliError::Config)?;
    println!("Config file: {}", default_config_path().display());
    println!(
        "Token: {}",
        if config.credential().is_some() {
            "configured"
        } else {
            "missing"
        }
    );
    println!("{}", serde_json::to_string_pretty(&sync)?);
    Ok(())
}

fn run_config_logout() -> Result<(), CliError> {
    let mut config = CliConfig::load().map_err(CliError::Config)?;
    if config.token.take().is_none() {
        println!("No stored token.");
        return Ok(());
    }
    let path = config.save().map_err(CliError::Config)?;
    println!("Removed stored token from {}", path.display());
    Ok(())
}
