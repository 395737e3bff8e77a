//! hybrank config - Show the effective configuration

use clap::Args;

use crate::cli::{Cli, OutputFormat, output::emit_json};
use crate::config::Config;
use crate::error::{HybrankError, Result};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Dotted key to print (e.g. search.alpha); whole config when omitted
    pub key: Option<String>,
}

pub fn run(cli: &Cli, config: &Config, args: &ConfigArgs) -> Result<()> {
    let value = match &args.key {
        Some(key) => config_value_at(config, key)?,
        None => config_document(config)?,
    };

    match cli.output_format {
        OutputFormat::Json => emit_json(&value),
        OutputFormat::Human | OutputFormat::Tsv => {
            match value {
                toml::Value::Table(_) => {
                    let rendered = toml::to_string_pretty(&value)
                        .map_err(|err| HybrankError::Config(format!("render config: {err}")))?;
                    print!("{rendered}");
                }
                toml::Value::String(s) => println!("{s}"),
                other => println!("{other}"),
            }
            Ok(())
        }
    }
}

fn config_document(config: &Config) -> Result<toml::Value> {
    toml::Value::try_from(config)
        .map_err(|err| HybrankError::Config(format!("serialize config: {err}")))
}

fn config_value_at(config: &Config, key: &str) -> Result<toml::Value> {
    let doc = config_document(config)?;
    get_path(&doc, key)
}

fn get_path(doc: &toml::Value, key: &str) -> Result<toml::Value> {
    let mut current = doc;
    for part in key.split('.') {
        current = current
            .get(part)
            .ok_or_else(|| HybrankError::Config(format!("unknown key: {key}")))?;
    }
    Ok(current.clone())
}
