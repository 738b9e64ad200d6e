// Ent Schema Framework - declarative field definitions and validation
// Field kinds are tagged at definition time: a reference is never inferred from a value

use chrono::SecondsFormat;
use serde_json::Value;
use std::collections::HashMap;

use crate::core::document::value_id;
use crate::core::strong_types::now;
use crate::core::Document;
use crate::entities::{EmbeddedType, EntityType};
use crate::error::{ValidationError, ValidationErrors, ValidationReason};
use crate::infrastructure::query::Update;
use crate::schemas::embedded_fields;

/// Schema definition for a top-level entity
pub trait EntSchema: Send + Sync {
    /// Entity type this schema defines
    fn entity_type() -> EntityType
    where
        Self: Sized;

    /// Persisted fields of this entity
    fn fields() -> Vec<FieldDefinition>
    where
        Self: Sized;

    /// Computed, never persisted fields
    fn virtuals() -> Vec<VirtualDefinition>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Schema definition for a value embedded inside an entity
pub trait EmbeddedSchema: Send + Sync {
    fn embedded_type() -> EmbeddedType
    where
        Self: Sized;

    fn fields() -> Vec<FieldDefinition>
    where
        Self: Sized;
}

/// Scalar field types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Boolean => "Boolean",
            FieldType::Date => "Date",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Date => value
                .as_str()
                .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
        }
    }
}

/// What a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(FieldType),
    /// Identifier of a single entity of the given type
    Reference(EntityType),
    /// Ordered identifiers of entities of the given type
    ReferenceList(EntityType),
    Embedded(EmbeddedType),
    EmbeddedList(EmbeddedType),
}

impl FieldKind {
    fn describe(&self) -> String {
        match self {
            FieldKind::Scalar(t) => t.as_str().to_string(),
            FieldKind::Reference(_) => "ObjectId".to_string(),
            FieldKind::ReferenceList(_) => "[ObjectId]".to_string(),
            FieldKind::Embedded(t) => t.as_str().to_string(),
            FieldKind::EmbeddedList(t) => format!("[{}]", t.as_str()),
        }
    }
}

/// Field validators with their user-facing messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValidator {
    /// Value must be present; an empty string counts as missing
    Required(String),
    /// String value must have at least `n` characters
    MinLength(usize, String),
}

/// Value written into a field when a write leaves it empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// Time of the write
    Now,
}

impl FieldDefault {
    fn value(&self) -> Value {
        match self {
            FieldDefault::Now => Value::String(now().to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

/// Edge constraints on reference fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeConstraint {
    /// Removing the owner instance removes every referenced target first
    DeleteCascade,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    pub validators: Vec<FieldValidator>,
    pub constraints: Vec<EdgeConstraint>,
    pub default: Option<FieldDefault>,
}

impl FieldDefinition {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            validators: Vec::new(),
            constraints: Vec::new(),
            default: None,
        }
    }

    pub fn scalar(name: &str, field_type: FieldType) -> Self {
        Self::new(name, FieldKind::Scalar(field_type))
    }

    pub fn reference(name: &str, target: EntityType) -> Self {
        Self::new(name, FieldKind::Reference(target))
    }

    pub fn reference_list(name: &str, target: EntityType) -> Self {
        Self::new(name, FieldKind::ReferenceList(target))
    }

    pub fn embedded_list(name: &str, embedded: EmbeddedType) -> Self {
        Self::new(name, FieldKind::EmbeddedList(embedded))
    }

    /// Add field validator
    pub fn validate(mut self, validator: FieldValidator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn constraint(mut self, constraint: EdgeConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn default_to(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Entity type this field points at, for reference fields
    pub fn reference_target(&self) -> Option<EntityType> {
        match self.kind {
            FieldKind::Reference(target) | FieldKind::ReferenceList(target) => Some(target),
            _ => None,
        }
    }

    pub fn cascades_on_delete(&self) -> bool {
        self.constraints.contains(&EdgeConstraint::DeleteCascade)
    }

    fn is_required(&self) -> Option<&str> {
        self.validators.iter().find_map(|v| match v {
            FieldValidator::Required(msg) => Some(msg.as_str()),
            _ => None,
        })
    }
}

/// A computed field derived from a persisted one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDefinition {
    pub name: String,
    pub source: String,
}

impl VirtualDefinition {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
        }
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn cast_error(field: &FieldDefinition, path: &str, value: &Value) -> ValidationError {
    ValidationError::new(
        path,
        ValidationReason::Cast,
        format!(
            "Cast to {} failed for value \"{}\" at path \"{}\"",
            field.kind.describe(),
            value,
            path
        ),
    )
}

fn validate_field(
    field: &FieldDefinition,
    value: Option<&Value>,
    path: &str,
    errors: &mut ValidationErrors,
) {
    for validator in &field.validators {
        match validator {
            FieldValidator::Required(msg) => {
                if is_missing(value) {
                    errors.push(ValidationError::new(path, ValidationReason::Required, msg.clone()));
                }
            }
            FieldValidator::MinLength(min, msg) => {
                if let Some(Value::String(s)) = value {
                    if !s.is_empty() && s.chars().count() < *min {
                        errors.push(ValidationError::new(path, ValidationReason::TooShort, msg.clone()));
                    }
                }
            }
        }
    }

    let value = match value {
        Some(Value::Null) | None => return,
        Some(value) => value,
    };

    match field.kind {
        FieldKind::Scalar(field_type) => {
            if !field_type.accepts(value) {
                errors.push(cast_error(field, path, value));
            }
        }
        FieldKind::Reference(_) => {
            if value_id(value).is_none() {
                errors.push(cast_error(field, path, value));
            }
        }
        FieldKind::ReferenceList(_) => match value {
            Value::Array(items) => {
                let bad = items
                    .iter()
                    .any(|item| !item.is_null() && value_id(item).is_none());
                if bad {
                    errors.push(cast_error(field, path, value));
                }
            }
            _ => errors.push(cast_error(field, path, value)),
        },
        FieldKind::Embedded(embedded) => match value {
            Value::Object(doc) => validate_nested(embedded, doc, path, errors),
            _ => errors.push(cast_error(field, path, value)),
        },
        FieldKind::EmbeddedList(embedded) => match value {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    validate_element(field, item, &format!("{}.{}", path, index), errors);
                }
            }
            _ => errors.push(cast_error(field, path, value)),
        },
    }
}

/// Validate one element of a list field
fn validate_element(
    field: &FieldDefinition,
    value: &Value,
    path: &str,
    errors: &mut ValidationErrors,
) {
    match field.kind {
        FieldKind::EmbeddedList(embedded) => match value {
            Value::Object(doc) => validate_nested(embedded, doc, path, errors),
            other => errors.push(cast_error(field, path, other)),
        },
        FieldKind::ReferenceList(_) => {
            if !value.is_null() && value_id(value).is_none() {
                errors.push(cast_error(field, path, value));
            }
        }
        _ => errors.push(cast_error(field, path, value)),
    }
}

fn validate_nested(
    embedded: EmbeddedType,
    doc: &Document,
    prefix: &str,
    errors: &mut ValidationErrors,
) {
    for field in embedded_fields(embedded) {
        let path = format!("{}.{}", prefix, field.name);
        validate_field(&field, doc.get(&field.name), &path, errors);
    }
}

/// Validate a whole document against its field definitions
pub fn validate_document(fields: &[FieldDefinition], doc: &Document) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for field in fields {
        validate_field(field, doc.get(&field.name), &field.name, &mut errors);
    }
    errors
}

/// Where a dotted update path lands
enum PathTarget {
    /// A declared field, top-level or inside an embedded value
    Field(FieldDefinition),
    /// One indexed element of a list field
    Element(FieldDefinition),
    /// The first segment names no declared field
    Undeclared,
}

/// Resolve `path` against the schema; `None` when it starts at a declared
/// field but cannot be followed (unknown embedded field, missing index,
/// descent into a scalar)
fn resolve_path(fields: &[FieldDefinition], path: &str) -> Option<PathTarget> {
    let mut segments = path.split('.');
    let head = segments.next()?;
    let mut field = match fields.iter().find(|f| f.name == head) {
        Some(field) => field.clone(),
        None => return Some(PathTarget::Undeclared),
    };
    let mut at_element = false;

    for segment in segments {
        let embedded = match (field.kind, at_element) {
            (FieldKind::EmbeddedList(_) | FieldKind::ReferenceList(_), false)
                if segment.parse::<usize>().is_ok() =>
            {
                at_element = true;
                continue;
            }
            (FieldKind::EmbeddedList(embedded), true) | (FieldKind::Embedded(embedded), false) => {
                embedded
            }
            _ => return None,
        };
        field = embedded_fields(embedded)
            .into_iter()
            .find(|f| f.name == segment)?;
        at_element = false;
    }

    Some(if at_element {
        PathTarget::Element(field)
    } else {
        PathTarget::Field(field)
    })
}

fn unresolved_path_error(path: &str) -> ValidationError {
    ValidationError::new(
        path,
        ValidationReason::Cast,
        format!("Path \"{}\" does not resolve to a declared field", path),
    )
}

/// Fill write-time defaults, such as an embedded post's `createdAt`, into a
/// document about to be built or stored
pub fn apply_defaults(fields: &[FieldDefinition], doc: &mut Document) {
    for field in fields {
        let present = doc.get(&field.name).is_some_and(|v| !v.is_null());
        if present {
            if let Some(value) = doc.get_mut(&field.name) {
                fill_value_defaults(field.kind, value);
            }
        } else if let Some(default) = field.default {
            doc.insert(field.name.clone(), default.value());
        }
    }
}

fn fill_value_defaults(kind: FieldKind, value: &mut Value) {
    match (kind, value) {
        (FieldKind::Embedded(embedded), Value::Object(doc)) => {
            apply_defaults(&embedded_fields(embedded), doc)
        }
        (FieldKind::EmbeddedList(embedded), Value::Array(items)) => {
            let fields = embedded_fields(embedded);
            for item in items {
                if let Value::Object(doc) = item {
                    apply_defaults(&fields, doc);
                }
            }
        }
        _ => {}
    }
}

fn fill_element_defaults(kind: FieldKind, value: &mut Value) {
    if let (FieldKind::EmbeddedList(embedded), Value::Object(doc)) = (kind, value) {
        apply_defaults(&embedded_fields(embedded), doc);
    }
}

/// Fill write-time defaults into every value an update assigns or appends.
/// Assigning null to a defaulted field writes the default instead.
pub fn apply_update_defaults(fields: &[FieldDefinition], update: &mut Update) {
    for (path, value) in update.set_fields_mut() {
        match resolve_path(fields, path) {
            Some(PathTarget::Field(field)) => match field.default {
                Some(default) if value.is_null() => *value = default.value(),
                _ => fill_value_defaults(field.kind, value),
            },
            Some(PathTarget::Element(field)) => fill_element_defaults(field.kind, value),
            _ => {}
        }
    }

    for (path, value) in update.push_fields_mut() {
        if let Some(PathTarget::Field(field)) = resolve_path(fields, path) {
            fill_element_defaults(field.kind, value);
        }
    }
}

/// Validate only the fields an update assigns, clears, increments or
/// appends to.
///
/// Dotted paths are resolved through embedded values; a path that starts at
/// a declared field but cannot be resolved is rejected.
pub fn validate_changes(fields: &[FieldDefinition], update: &Update) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for (path, value) in update.set_fields() {
        match resolve_path(fields, path) {
            Some(PathTarget::Field(def)) => validate_field(&def, Some(value), path, &mut errors),
            Some(PathTarget::Element(def)) => validate_element(&def, value, path, &mut errors),
            Some(PathTarget::Undeclared) => {}
            None => errors.push(unresolved_path_error(path)),
        }
    }

    for path in update.unset_fields() {
        match resolve_path(fields, path) {
            Some(PathTarget::Field(def)) => {
                if let Some(msg) = def.is_required() {
                    errors.push(ValidationError::new(path, ValidationReason::Required, msg));
                } else if def.default.is_some() {
                    errors.push(ValidationError::new(
                        path,
                        ValidationReason::Required,
                        format!("Path \"{}\" is set on write and cannot be cleared", path),
                    ));
                }
            }
            Some(PathTarget::Element(_)) | Some(PathTarget::Undeclared) => {}
            None => errors.push(unresolved_path_error(path)),
        }
    }

    for (path, delta) in update.inc_fields() {
        match resolve_path(fields, path) {
            Some(PathTarget::Field(def)) | Some(PathTarget::Element(def)) => {
                if def.kind != FieldKind::Scalar(FieldType::Number) {
                    errors.push(cast_error(&def, path, delta));
                }
            }
            Some(PathTarget::Undeclared) => {}
            None => errors.push(unresolved_path_error(path)),
        }
    }

    for (path, value) in update.push_fields() {
        match resolve_path(fields, path) {
            Some(PathTarget::Field(def)) => validate_element(&def, value, path, &mut errors),
            Some(PathTarget::Element(def)) => errors.push(cast_error(&def, path, value)),
            Some(PathTarget::Undeclared) => {}
            None => errors.push(unresolved_path_error(path)),
        }
    }

    errors
}

/// Schema registry - holds all defined entity schemas
#[derive(Default)]
pub struct SchemaRegistry {
    field_definitions: HashMap<EntityType, Vec<FieldDefinition>>,
    virtual_definitions: HashMap<EntityType, Vec<VirtualDefinition>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema
    pub fn register<T: EntSchema + 'static>(&mut self) {
        let entity_type = T::entity_type();
        self.field_definitions.insert(entity_type, T::fields());
        self.virtual_definitions.insert(entity_type, T::virtuals());
    }

    pub fn get_fields(&self, entity_type: EntityType) -> Option<&[FieldDefinition]> {
        self.field_definitions.get(&entity_type).map(Vec::as_slice)
    }

    pub fn field(&self, entity_type: EntityType, name: &str) -> Option<&FieldDefinition> {
        self.get_fields(entity_type)?
            .iter()
            .find(|f| f.name == name)
    }

    pub fn get_virtuals(&self, entity_type: EntityType) -> &[VirtualDefinition] {
        self.virtual_definitions
            .get(&entity_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entity types in a stable order
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.field_definitions.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }

    /// Validate schema consistency
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (entity_type, fields) in &self.field_definitions {
            for field in fields {
                if let Some(target) = field.reference_target() {
                    if !self.field_definitions.contains_key(&target) {
                        errors.push(format!(
                            "Entity {} has reference '{}' pointing to undefined entity {}",
                            entity_type, field.name, target
                        ));
                    }
                } else if field.cascades_on_delete() {
                    errors.push(format!(
                        "Entity {} declares a delete cascade on non-reference field '{}'",
                        entity_type, field.name
                    ));
                }
            }
        }

        for (entity_type, virtuals) in &self.virtual_definitions {
            let fields = self.get_fields(*entity_type).unwrap_or(&[]);
            for virt in virtuals {
                if !fields.iter().any(|f| f.name == virt.source) {
                    errors.push(format!(
                        "Virtual '{}' on {} reads missing field '{}'",
                        virt.name, entity_type, virt.source
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort();
            Err(errors)
        }
    }
}
