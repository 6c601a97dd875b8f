//! Config command - View and validate Nimbus configuration
//!
//! Provides the `nimbus config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports every error found

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use nimbus_core::config::{Config, ValidationError};
use tracing::info;

use crate::output::{get_formatter, OutputFormatter};
use crate::Invocation;

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, invocation: &Invocation) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(invocation),
            ConfigCommand::Validate => execute_validate(invocation),
        }
    }
}

fn execute_show(invocation: &Invocation) -> Result<()> {
    let formatter = get_formatter(invocation.format);
    let config_path = &invocation.config_path;

    info!(config_path = %config_path.display(), "Showing configuration");

    if invocation.format.is_json() {
        let json = serde_json::to_value(&invocation.config)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");

        let yaml = serde_yaml::to_string(&invocation.config)
            .context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

/// Outcome of validating the file at one path
#[derive(Debug)]
enum Validation {
    Missing,
    Unparseable(String),
    Checked(Vec<ValidationError>),
}

fn validate_file(path: &Path) -> Validation {
    if !path.exists() {
        return Validation::Missing;
    }
    match Config::load(path) {
        Ok(config) => Validation::Checked(config.validate()),
        Err(e) => Validation::Unparseable(format!("{e:#}")),
    }
}

fn execute_validate(invocation: &Invocation) -> Result<()> {
    let formatter = get_formatter(invocation.format);
    let config_path = &invocation.config_path;

    info!(config_path = %config_path.display(), "Validating configuration");

    let validation = validate_file(config_path);

    if invocation.format.is_json() {
        let errors: Vec<String> = match &validation {
            Validation::Missing => vec!["Configuration file not found. Using defaults.".into()],
            Validation::Unparseable(e) => vec![format!("Failed to parse configuration: {e}")],
            Validation::Checked(errors) => errors.iter().map(ToString::to_string).collect(),
        };
        formatter.print_json(&serde_json::json!({
            "valid": matches!(&validation, Validation::Checked(errors) if errors.is_empty()),
            "config_path": config_path.display().to_string(),
            "errors": errors,
        }));
        return Ok(());
    }

    print_validation(&*formatter, config_path, &validation);
    Ok(())
}

fn print_validation(formatter: &dyn OutputFormatter, config_path: &Path, validation: &Validation) {
    match validation {
        Validation::Missing => {
            formatter.info(&format!(
                "Configuration file not found at {}",
                config_path.display()
            ));
            formatter.info("Using default configuration.");
        }
        Validation::Unparseable(e) => {
            formatter.error(&format!("Failed to parse configuration: {}", e));
            formatter.info(&format!("File: {}", config_path.display()));
        }
        Validation::Checked(errors) if errors.is_empty() => {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        }
        Validation::Checked(errors) => {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }
    }
}
