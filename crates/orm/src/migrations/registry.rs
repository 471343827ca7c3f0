//! Migration Registry - Ordered set of migration units built at process start
//!
//! The registry is the loader: it validates every definition each time it is
//! listed and never touches the store.

use std::collections::HashSet;

use super::definitions::MigrationUnit;
use crate::error::{OrmError, OrmResult};

/// In-process source of migration units
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    units: Vec<MigrationUnit>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit (builder style)
    pub fn with(mut self, unit: MigrationUnit) -> Self {
        self.units.push(unit);
        self
    }

    /// Register a unit
    pub fn register(&mut self, unit: MigrationUnit) -> &mut Self {
        self.units.push(unit);
        self
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Look up a unit by identifier
    pub fn find(&self, id: &str) -> Option<&MigrationUnit> {
        self.units.iter().find(|unit| unit.id == id)
    }

    /// All units sorted ascending by identifier, after validation
    pub fn list_all(&self) -> OrmResult<Vec<MigrationUnit>> {
        let mut seen = HashSet::new();
        for unit in &self.units {
            validate_unit(unit)?;
            if !seen.insert(unit.id.as_str()) {
                return Err(OrmError::DuplicateIdentifier(unit.id.clone()));
            }
        }

        let mut units = self.units.clone();
        units.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(units)
    }
}

fn validate_unit(unit: &MigrationUnit) -> OrmResult<()> {
    if unit.id.is_empty() {
        return Err(OrmError::Discovery(format!(
            "Migration '{}' has an empty identifier",
            unit.description
        )));
    }
    if unit.id.chars().any(char::is_whitespace) {
        return Err(OrmError::Discovery(format!(
            "Migration identifier '{}' contains whitespace",
            unit.id
        )));
    }
    if unit.up.is_none() {
        return Err(OrmError::Discovery(format!(
            "Migration {} has no up operation",
            unit.id
        )));
    }
    if unit.down.is_none() {
        return Err(OrmError::Discovery(format!(
            "Migration {} has no down operation",
            unit.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::Operation;

    fn unit(id: &str) -> MigrationUnit {
        MigrationUnit::new(id, format!("migration {}", id))
            .up(Operation::Noop)
            .down(Operation::Noop)
    }

    #[test]
    fn test_list_all_sorts_by_identifier() {
        let registry = MigrationRegistry::new()
            .with(unit("20240301000000_b"))
            .with(unit("20240101000000_a"))
            .with(unit("20240201000000_c"));

        let ids: Vec<_> = registry.list_all().unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(
            ids,
            vec!["20240101000000_a", "20240201000000_c", "20240301000000_b"]
        );
        assert_eq!(registry.len(), 3);
        assert!(registry.find("20240201000000_c").is_some());
        assert!(registry.find("nope").is_none());
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let registry = MigrationRegistry::new().with(unit("001")).with(unit("001"));
        assert!(matches!(
            registry.list_all(),
            Err(OrmError::DuplicateIdentifier(id)) if id == "001"
        ));
    }

    #[test]
    fn test_malformed_definitions_rejected() {
        let missing_down = MigrationRegistry::new()
            .with(MigrationUnit::new("001", "no down").up(Operation::Noop));
        assert!(matches!(missing_down.list_all(), Err(OrmError::Discovery(_))));

        let missing_up = MigrationRegistry::new()
            .with(MigrationUnit::new("001", "no up").down(Operation::Noop));
        assert!(matches!(missing_up.list_all(), Err(OrmError::Discovery(_))));

        let empty = MigrationRegistry::new().with(unit(""));
        assert!(matches!(empty.list_all(), Err(OrmError::Discovery(_))));

        let spaced = MigrationRegistry::new().with(unit("001 create users"));
        assert!(matches!(spaced.list_all(), Err(OrmError::Discovery(_))));
    }

    #[test]
    fn test_register_in_place() {
        let mut registry = MigrationRegistry::new();
        assert!(registry.is_empty());
        registry.register(unit("001")).register(unit("002"));
        assert_eq!(registry.list_all().unwrap().len(), 2);
    }
}
