use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    Human,
    #[default]
    Json,
    Yaml,
}

/// Print a serializable value as JSON or YAML. Human output is left to the
/// caller; here it falls back to pretty JSON.
pub fn emit<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Json | OutputFormat::Human => {
            println!("{}", serde_json::to_string_pretty(value)?)
        }
    }
    Ok(())
}
