//! Index mappings and the per-query metadata built from them
//!
//! The store hands back a nested mapping (properties, multi-fields, nested
//! objects). `IndexMetadata::from_mapping` flattens it into dotted field
//! names so lookups during optimization are a single map probe:
//!
//! ```text
//! title                 text
//! title.raw             keyword        (multi-field pulled up)
//! comments              nested
//! comments.body         text, nested_path = "comments"
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::errors::{MetadataError, MetadataResult};
use super::link::IndexLink;

/// Mapping document returned by the store for one index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMapping {
    /// Primary-key field name
    pub primary_key: String,
    /// Declared links (`left=<index>right`) into other indexes
    #[serde(default)]
    pub links: Vec<String>,
    /// Logical field name -> physical fields
    #[serde(default)]
    pub field_lists: BTreeMap<String, Vec<String>>,
    /// Joins into this index are always materialized positively
    #[serde(default)]
    pub always_resolve_joins: bool,
    /// Field properties
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyMapping>,
}

/// One property in a mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyMapping {
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub analyzer: Option<String>,
    #[serde(default)]
    pub include_in_all: Option<bool>,
    /// Multi-field variants
    #[serde(default)]
    pub fields: BTreeMap<String, PropertyMapping>,
    /// Sub-properties of object and nested fields
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyMapping>,
}

/// Declared field type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Keyword,
    Integer,
    Long,
    Short,
    Byte,
    Float,
    Double,
    Boolean,
    Date,
    Object,
    Nested,
    Other(String),
}

impl FieldType {
    /// Maps a store type name
    pub fn from_name(name: &str) -> Self {
        match name {
            "text" | "string" => FieldType::Text,
            "keyword" => FieldType::Keyword,
            "integer" => FieldType::Integer,
            "long" => FieldType::Long,
            "short" => FieldType::Short,
            "byte" => FieldType::Byte,
            "float" | "half_float" => FieldType::Float,
            "double" | "scaled_float" => FieldType::Double,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "object" => FieldType::Object,
            "nested" => FieldType::Nested,
            other => FieldType::Other(other.to_string()),
        }
    }

    /// True for types searched as text by default
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Keyword)
    }
}

/// Flattened properties of one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldProperties {
    pub field_type: FieldType,
    pub analyzer: Option<String>,
    /// Path of the enclosing nested object, if any
    pub nested_path: Option<String>,
    /// Participates in the default full-text ("all fields") view
    pub include_in_all: bool,
}

/// Schema snapshot for one index, built once per query
#[derive(Debug, Clone)]
pub struct IndexMetadata {
    name: String,
    primary_key: String,
    always_resolve_joins: bool,
    fields: BTreeMap<String, FieldProperties>,
    field_lists: HashMap<String, Vec<String>>,
    links: Vec<IndexLink>,
}

impl IndexMetadata {
    /// Flattens a store mapping into metadata
    pub fn from_mapping(name: impl Into<String>, mapping: &IndexMapping) -> MetadataResult<Self> {
        let name = name.into();

        if mapping.primary_key.trim().is_empty() {
            return Err(MetadataError::invalid_mapping(&name, "primary_key is required"));
        }

        let mut fields = BTreeMap::new();
        flatten_properties(&mapping.properties, "", None, &mut fields);

        let links = mapping
            .links
            .iter()
            .map(|text| IndexLink::parse(text))
            .collect::<MetadataResult<Vec<_>>>()?;

        for (logical, physical) in &mapping.field_lists {
            if physical.is_empty() {
                return Err(MetadataError::invalid_mapping(
                    &name,
                    format!("field list '{}' is empty", logical),
                ));
            }
        }

        Ok(Self {
            name,
            primary_key: mapping.primary_key.clone(),
            always_resolve_joins: mapping.always_resolve_joins,
            fields,
            field_lists: mapping
                .field_lists
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            links,
        })
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary-key field name
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Whether joins into this index must never be inverted
    pub fn always_resolve_joins(&self) -> bool {
        self.always_resolve_joins
    }

    /// Properties of a field, if the index defines it
    pub fn field(&self, name: &str) -> Option<&FieldProperties> {
        self.fields.get(name)
    }

    /// True if the index defines `name` (the primary key always counts)
    pub fn has_field(&self, name: &str) -> bool {
        name == self.primary_key || self.fields.contains_key(name)
    }

    /// All flattened fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldProperties)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields participating in the default full-text view, in name order
    pub fn all_view_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, p)| p.include_in_all)
            .map(|(k, _)| k.as_str())
    }

    /// Physical fields for a logical field-list name
    pub fn field_list(&self, name: &str) -> Option<&[String]> {
        self.field_lists.get(name).map(Vec::as_slice)
    }

    /// Links declared by this index
    pub fn links(&self) -> &[IndexLink] {
        &self.links
    }
}

fn flatten_properties(
    properties: &BTreeMap<String, PropertyMapping>,
    prefix: &str,
    nested_path: Option<&str>,
    out: &mut BTreeMap<String, FieldProperties>,
) {
    for (name, property) in properties {
        let full_name = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        let field_type = match &property.field_type {
            Some(t) => FieldType::from_name(t),
            None if !property.properties.is_empty() => FieldType::Object,
            None => FieldType::Other("unknown".to_string()),
        };

        let include_in_all = property
            .include_in_all
            .unwrap_or_else(|| field_type.is_textual());

        out.insert(
            full_name.clone(),
            FieldProperties {
                field_type: field_type.clone(),
                analyzer: property.analyzer.clone(),
                nested_path: nested_path.map(str::to_string),
                include_in_all,
            },
        );

        for (variant, sub) in &property.fields {
            let sub_type = sub
                .field_type
                .as_deref()
                .map(FieldType::from_name)
                .unwrap_or_else(|| field_type.clone());
            out.insert(
                format!("{}.{}", full_name, variant),
                FieldProperties {
                    include_in_all: false,
                    field_type: sub_type,
                    analyzer: sub.analyzer.clone(),
                    nested_path: nested_path.map(str::to_string),
                },
            );
        }

        if !property.properties.is_empty() {
            let child_nested = if field_type == FieldType::Nested {
                Some(full_name.as_str())
            } else {
                nested_path
            };
            flatten_properties(&property.properties, &full_name, child_nested, out);
        }
    }
}
