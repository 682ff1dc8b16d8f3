use crate::config_file;
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use intake_core::config::WarnLevel;
use intake_core::Config;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration as YAML
    Show,

    /// Check the configuration for unsafe or contradictory settings
    Validate,

    /// Write the default configuration to the config path (or ./intake.yaml)
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(explicit: Option<&Path>, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(explicit, json),
        ConfigSubcommand::Validate => validate(explicit, json),
        ConfigSubcommand::Init { force } => init(explicit, force),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(explicit: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = config_file::load(explicit)?;
    if json {
        return print_json(&config);
    }
    print!("{}", config.to_yaml()?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(explicit: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = config_file::load(explicit)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if config.has_errors() {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(explicit: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config_file::DEFAULT_FILE.into());
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Config::default()
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
