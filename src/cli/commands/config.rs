use serde_json::{Value, json};

use crate::config::audit_config::AuditConfig;
use crate::core::errors::Result;

/// Execute the `nuaa-audit config` command.
///
/// Prints the effective configuration, after the config file and
/// environment have been applied, as JSON.
pub fn execute(config: &AuditConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&describe(config)?)?);
    Ok(())
}

/// The configuration plus the paths derived from it.
fn describe(config: &AuditConfig) -> Result<Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(map) = value.as_object_mut() {
        let rotated: Vec<String> = config
            .existing_rotated_paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        map.insert(
            "paths".to_string(),
            json!({
                "log": config.log_path().display().to_string(),
                "rotated": rotated,
                "retention_policy": config.retention_policy_path().display().to_string(),
            }),
        );
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn describes_paths_and_settings() {
        let tmp = TempDir::new().unwrap();
        let config = AuditConfig::in_dir(tmp.path());
        let value = describe(&config).unwrap();

        assert_eq!(value["log_file"], "audit.log");
        assert_eq!(value["enabled"], true);
        assert!(
            value["paths"]["log"]
                .as_str()
                .unwrap()
                .ends_with("audit.log")
        );
        assert_eq!(value["paths"]["rotated"].as_array().unwrap().len(), 0);
    }
}
