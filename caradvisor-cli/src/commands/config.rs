use anyhow::{Context, Result, bail};
use shared::config::Config;
use std::{fs, path::Path};

/// Writes a configuration file holding the default values.
///
/// # Errors
/// Returns an error if the format is unsupported or if writing the file fails.
pub fn generate_config(format: &str, output: Option<&Path>) -> Result<()> {
    let config = Config::with_defaults();
    let (serialized, default_name) = match format {
        "yaml" | "yml" => (serde_yml::to_string(&config)?, "config.yaml"),
        "json" => (serde_json::to_string_pretty(&config)?, "config.json"),
        other => bail!("Unsupported format '{other}'. Use 'yaml' or 'json'."),
    };

    let path = output.unwrap_or_else(|| Path::new(default_name));
    fs::write(path, serialized.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!(
        "Configuration file '{}' generated successfully.",
        path.display()
    );
    Ok(())
}
