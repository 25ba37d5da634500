//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[terrain]
; Name of the top-level group the user moves, rotates and resizes
viewport_group = {}
; Name of the hidden group holding the full terrain dataset
source_group = {}
; Undo name shown for synchronization edits
operation_name = {}

[tolerance]
; Length in model units below which a transform change counts as none
; (default: 0.001)
length = {}

[geo]
; How to correct the host projection's north handling:
;   double_angle - host rotates by +north instead of -north (default)
;   none         - host projection is correct
north_compensation = {}

[tracking]
; Attribute dictionary and key storing the last seen viewport transform
namespace = {}
key = {}

[logging]
; Default log level when RUST_LOG is not set: error, warn, info, debug, trace
level = {}
; Directory for the log file (default: ~/.geoframe/logs)
directory = {}
; Log file name, cleared at the start of each session
file = {}
"#,
        config.terrain.viewport_group,
        config.terrain.source_group,
        config.terrain.operation_name,
        config.tolerance.length,
        config.geo.north_compensation,
        config.tracking.namespace,
        config.tracking.key,
        config.logging.level,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_every_section() {
        let content = to_config_string(&ConfigFile::default());

        for section in ["[terrain]", "[tolerance]", "[geo]", "[tracking]", "[logging]"] {
            assert!(content.contains(section), "missing {}", section);
        }
        assert!(content.contains("north_compensation = double_angle"));
        assert!(content.contains("source_group = Terrain Data"));
    }
}
