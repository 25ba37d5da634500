//! Named group lookup.

use tracing::debug;

use crate::host::{GroupId, SceneHost};
use crate::sync::SyncError;

/// Which of the two terrain groups a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainRole {
    /// The small, user-edited group.
    Viewport,
    /// The large, hidden group supplying content.
    Source,
}

impl std::fmt::Display for TerrainRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerrainRole::Viewport => write!(f, "viewport"),
            TerrainRole::Source => write!(f, "source"),
        }
    }
}

/// Resolved viewport and source groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainPair {
    /// The viewport group.
    pub viewport: GroupId,
    /// The source data group.
    pub source: GroupId,
}

/// Finds the terrain groups by name and re-finds them when they go stale.
#[derive(Debug, Clone)]
pub struct TerrainHandles {
    viewport_name: String,
    source_name: String,
    cached: Option<TerrainPair>,
}

impl TerrainHandles {
    /// Look groups up under these names.
    pub fn new(viewport_name: &str, source_name: &str) -> Self {
        Self {
            viewport_name: viewport_name.to_string(),
            source_name: source_name.to_string(),
            cached: None,
        }
    }

    /// Name of the viewport group.
    pub fn viewport_name(&self) -> &str {
        &self.viewport_name
    }

    /// Name of the source group.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Resolve both groups, failing with the first one that is missing.
    pub fn resolve<H: SceneHost + ?Sized>(&mut self, host: &H) -> Result<TerrainPair, SyncError> {
        let viewport = host
            .find_group(&self.viewport_name)
            .ok_or_else(|| SyncError::NotConfigured {
                role: TerrainRole::Viewport,
                name: self.viewport_name.clone(),
            })?;
        let source = host
            .find_group(&self.source_name)
            .ok_or_else(|| SyncError::NotConfigured {
                role: TerrainRole::Source,
                name: self.source_name.clone(),
            })?;

        let pair = TerrainPair { viewport, source };
        self.cached = Some(pair);
        Ok(pair)
    }

    /// The cached pair if both handles are still live, otherwise a fresh
    /// lookup. `None` when either group cannot be found.
    pub fn refresh<H: SceneHost + ?Sized>(&mut self, host: &H) -> Option<TerrainPair> {
        if let Some(pair) = self.cached {
            if host.is_valid(pair.viewport) && host.is_valid(pair.source) {
                return Some(pair);
            }
            debug!("Cached terrain handles went stale, looking them up again");
        }

        match self.resolve(host) {
            Ok(pair) => Some(pair),
            Err(e) => {
                debug!(error = %e, "Terrain handles unavailable");
                self.cached = None;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;

    #[test]
    fn test_refresh_finds_replacement_group() {
        let mut host = MemoryHost::new();
        let viewport = host.add_top_level_group("Terrain");
        host.add_top_level_group("Terrain Data");
        let mut handles = TerrainHandles::new("Terrain", "Terrain Data");
        handles.resolve(&host).unwrap();

        host.erase(viewport).unwrap();
        let replacement = host.add_top_level_group("Terrain");

        let pair = handles.refresh(&host).unwrap();
        assert_eq!(pair.viewport, replacement);
        assert_ne!(pair.viewport, viewport);
    }

    #[test]
    fn test_refresh_without_groups_is_none() {
        let host = MemoryHost::new();
        let mut handles = TerrainHandles::new("Terrain", "Terrain Data");

        assert!(handles.refresh(&host).is_none());
    }

    #[test]
    fn test_resolve_reports_missing_role() {
        let mut host = MemoryHost::new();
        host.add_top_level_group("Terrain Data");
        let mut handles = TerrainHandles::new("Terrain", "Terrain Data");

        let err = handles.resolve(&host).unwrap_err();
        assert!(matches!(
            err,
            SyncError::NotConfigured {
                role: TerrainRole::Viewport,
                ..
            }
        ));
        assert_eq!(err.to_string(), "viewport group 'Terrain' not found in the model");
    }
}
