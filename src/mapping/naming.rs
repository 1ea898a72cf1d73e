use serde::{Deserialize, Serialize};

use crate::core::{DbError, Result};

use super::descriptor::{EntityDescriptor, PropertyDescriptor};

/// Mapping configuration
///
/// Controls how table and column names are derived and how the bundled
/// in-memory store validates writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Schema prepended to every table name (`schema.table`)
    pub schema: Option<String>,

    /// Render all derived identifiers in upper case
    pub uppercase: bool,

    /// Suffix appended to the back-reference name to form qualifier columns
    pub key_column_suffix: String,

    /// Whether the in-memory store checks back-references against parent rows
    pub enforce_foreign_keys: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            schema: None,
            uppercase: false,
            key_column_suffix: "_key".to_string(),
            enforce_foreign_keys: true,
        }
    }
}

impl MappingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schema
    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    /// Render identifiers in upper case
    pub fn uppercase(mut self, uppercase: bool) -> Self {
        self.uppercase = uppercase;
        self
    }

    /// Set the qualifier column suffix
    pub fn key_column_suffix(mut self, suffix: &str) -> Self {
        self.key_column_suffix = suffix.to_string();
        self
    }

    /// Enable or disable foreign-key checks in the in-memory store
    pub fn enforce_foreign_keys(mut self, enforce: bool) -> Self {
        self.enforce_foreign_keys = enforce;
        self
    }

    /// Parse from a JSON document
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DbError::MappingError(format!("Invalid mapping config: {}", e)))
    }
}

/// Converts a Rust-style name (`LegoSet`, `wrappedPk`, `max-age`) to snake case.
///
/// Non-alphanumeric characters become underscores.
fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in input.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else if ch.is_ascii_alphanumeric() {
            out.push(ch);
            prev_lower_or_digit = true;
        } else {
            out.push('_');
            prev_lower_or_digit = false;
        }
    }
    out
}

/// Derives table and column names from entity and property descriptors.
#[derive(Debug, Clone)]
pub struct NamingStrategy {
    config: MappingConfig,
}

impl NamingStrategy {
    pub fn new(config: MappingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    fn apply_case(&self, name: String) -> String {
        if self.config.uppercase {
            name.to_ascii_uppercase()
        } else {
            name
        }
    }

    /// Unqualified table name of an entity.
    pub fn table_name(&self, entity: &EntityDescriptor) -> String {
        match &entity.table {
            Some(table) => table.clone(),
            None => self.apply_case(to_snake_case(&entity.name)),
        }
    }

    /// Table name including the configured schema.
    pub fn qualified_table_name(&self, entity: &EntityDescriptor) -> String {
        let table = self.table_name(entity);
        match &self.config.schema {
            Some(schema) => format!("{}.{}", schema, table),
            None => table,
        }
    }

    pub fn column_name(&self, property: &PropertyDescriptor) -> String {
        match &property.column {
            Some(column) => column.clone(),
            None => self.apply_case(to_snake_case(&property.name)),
        }
    }

    /// Back-reference column: the table name of the entity holding the referenced id,
    /// unless the property overrides it.
    pub fn reverse_column_name(
        &self,
        property: &PropertyDescriptor,
        id_defining_entity: &EntityDescriptor,
    ) -> String {
        match &property.id_column {
            Some(column) => column.clone(),
            None => self.table_name(id_defining_entity),
        }
    }

    /// Qualifier column: the owning entity's table name plus the key suffix,
    /// unless the property overrides it.
    pub fn key_column_name(&self, property: &PropertyDescriptor, owner: &EntityDescriptor) -> String {
        match &property.key_column {
            Some(column) => column.clone(),
            None => {
                let suffix = self.apply_case(self.config.key_column_suffix.clone());
                format!("{}{}", self.table_name(owner), suffix)
            }
        }
    }

    pub fn embedded_prefix(&self, prefix: &str) -> String {
        self.apply_case(prefix.to_string())
    }
}

impl Default for NamingStrategy {
    fn default() -> Self {
        Self::new(MappingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlType;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("LegoSet"), "lego_set");
        assert_eq!(to_snake_case("wrappedPk"), "wrapped_pk");
        assert_eq!(to_snake_case("SingleEmbeddedIdEntity"), "single_embedded_id_entity");
        assert_eq!(to_snake_case("max-age"), "max_age");
        assert_eq!(to_snake_case("item2Name"), "item2_name");
    }

    #[test]
    fn test_default_names() {
        let naming = NamingStrategy::default();
        let owner = EntityDescriptor::new("LegoSet");
        let manuals = PropertyDescriptor::list("manuals", "Manual");

        assert_eq!(naming.table_name(&owner), "lego_set");
        assert_eq!(naming.reverse_column_name(&manuals, &owner), "lego_set");
        assert_eq!(naming.key_column_name(&manuals, &owner), "lego_set_key");
    }

    #[test]
    fn test_overrides_win() {
        let naming = NamingStrategy::new(MappingConfig::new().schema("app").uppercase(true));
        let owner = EntityDescriptor::new("LegoSet").table("sets");
        let manuals = PropertyDescriptor::list("manuals", "Manual")
            .id_column("set_id")
            .key_column("position");
        let name = PropertyDescriptor::simple("displayName", SqlType::Text);

        assert_eq!(naming.qualified_table_name(&owner), "app.sets");
        assert_eq!(naming.reverse_column_name(&manuals, &owner), "set_id");
        assert_eq!(naming.key_column_name(&manuals, &owner), "position");
        assert_eq!(naming.column_name(&name), "DISPLAY_NAME");
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = MappingConfig::from_json(r#"{ "uppercase": true }"#).unwrap();
        assert!(config.uppercase);
        assert_eq!(config.key_column_suffix, "_key");
        assert!(config.enforce_foreign_keys);
    }
}
