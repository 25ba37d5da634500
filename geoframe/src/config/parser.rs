//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Non-empty trimmed value, or an error naming the key.
fn required_name(section: &str, key: &str, value: &str) -> Result<String, ConfigFileError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(section, key, value, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [terrain] section
    if let Some(section) = ini.section(Some("terrain")) {
        if let Some(v) = section.get("viewport_group") {
            config.terrain.viewport_group = required_name("terrain", "viewport_group", v)?;
        }
        if let Some(v) = section.get("source_group") {
            config.terrain.source_group = required_name("terrain", "source_group", v)?;
        }
        if let Some(v) = section.get("operation_name") {
            config.terrain.operation_name = required_name("terrain", "operation_name", v)?;
        }
        if config.terrain.viewport_group == config.terrain.source_group {
            return Err(invalid(
                "terrain",
                "source_group",
                &config.terrain.source_group,
                "must differ from viewport_group",
            ));
        }
    }

    // [tolerance] section
    if let Some(section) = ini.section(Some("tolerance")) {
        if let Some(v) = section.get("length") {
            let length: f64 = v.trim().parse().map_err(|_| {
                invalid("tolerance", "length", v, "must be a number (host length units)")
            })?;
            if !(length > 0.0 && length.is_finite()) {
                return Err(invalid("tolerance", "length", v, "must be greater than zero"));
            }
            config.tolerance.length = length;
        }
    }

    // [geo] section
    if let Some(section) = ini.section(Some("geo")) {
        if let Some(v) = section.get("north_compensation") {
            config.geo.north_compensation = v
                .parse()
                .map_err(|_| invalid("geo", "north_compensation", v, "must be 'double_angle' or 'none'"))?;
        }
    }

    // [tracking] section
    if let Some(section) = ini.section(Some("tracking")) {
        if let Some(v) = section.get("namespace") {
            config.tracking.namespace = required_name("tracking", "namespace", v)?;
        }
        if let Some(v) = section.get("key") {
            config.tracking.key = required_name("tracking", "key", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("level") {
            let level = v.trim().to_lowercase();
            let valid_levels = ["error", "warn", "info", "debug", "trace"];
            if !valid_levels.contains(&level.as_str()) {
                return Err(invalid(
                    "logging",
                    "level",
                    v,
                    "must be one of: error, warn, info, debug, trace",
                ));
            }
            config.logging.level = level;
        }
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            config.logging.file = required_name("logging", "file", v)?;
        }
    }

    Ok(config)
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::NorthCompensation;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_overlays_only_given_keys() {
        let config = parse("[terrain]\nviewport_group = Window\n").unwrap();

        assert_eq!(config.terrain.viewport_group, "Window");
        assert_eq!(config.terrain.source_group, "Terrain Data");
    }

    #[test]
    fn test_parses_north_compensation() {
        let config = parse("[geo]\nnorth_compensation = none\n").unwrap();
        assert_eq!(config.geo.north_compensation, NorthCompensation::None);

        assert!(parse("[geo]\nnorth_compensation = sideways\n").is_err());
    }

    #[test]
    fn test_rejects_non_positive_tolerance() {
        let err = parse("[tolerance]\nlength = 0\n").unwrap_err();
        assert!(err.to_string().contains("tolerance.length"));
    }

    #[test]
    fn test_rejects_same_group_names() {
        let result = parse("[terrain]\nviewport_group = A\nsource_group = A\n");
        assert!(matches!(result, Err(ConfigFileError::InvalidValue { .. })));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        assert!(parse("[logging]\nlevel = loud\n").is_err());
        assert_eq!(
            parse("[logging]\nlevel = DEBUG\n").unwrap().logging.level,
            "debug"
        );
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/logs");
        assert!(!expanded.starts_with("~"));
        assert_eq!(expand_tilde("/var/log"), PathBuf::from("/var/log"));
    }
}
