//! In-memory GTS-style type system.

use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};

use super::builtin::builtin_schemas;
use super::schema::validate_value;
use super::{
    AttributeResult, CompatibilityResult, TypeIdParts, TypeSystemPlugin, ValidationResult,
};
use crate::error::{MfeError, Result};
use crate::type_system::ValidationError;

const GTS_PREFIX: &str = "gts.";

/// One `vendor.package.namespace.type.vMAJOR[.MINOR]` segment of a type id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    vendor: String,
    package: String,
    namespace: String,
    type_name: String,
    major: u32,
    minor: Option<u32>,
}

impl Segment {
    fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 5 && parts.len() != 6 {
            return None;
        }
        if !parts[..4].iter().all(|p| is_name(p)) {
            return None;
        }
        let major = parts[4].strip_prefix('v')?.parse().ok()?;
        let minor = match parts.get(5) {
            Some(m) => Some(m.parse().ok()?),
            None => None,
        };
        Some(Self {
            vendor: parts[0].to_string(),
            package: parts[1].to_string(),
            namespace: parts[2].to_string(),
            type_name: parts[3].to_string(),
            major,
            minor,
        })
    }

    fn family(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.vendor, self.package, self.namespace, self.type_name
        )
    }

    fn to_json(&self) -> Value {
        json!({
            "vendor": self.vendor,
            "package": self.package,
            "namespace": self.namespace,
            "type": self.type_name,
            "verMajor": self.major,
            "verMinor": self.minor,
        })
    }
}

fn is_name(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn parse_segments(type_id: &str) -> Option<Vec<Segment>> {
    let body = type_id.strip_prefix(GTS_PREFIX)?;
    let body = body.strip_suffix('~').unwrap_or(body);
    if body.is_empty() {
        return None;
    }
    body.split('~').map(Segment::parse).collect()
}

fn matches_pattern(pattern: &str, candidate: &str) -> bool {
    let pieces: Vec<&str> = pattern.split('*').collect();
    if pieces.len() == 1 {
        return pattern == candidate;
    }
    let first = pieces[0];
    let last = pieces[pieces.len() - 1];
    if !candidate.starts_with(first) || candidate.len() < first.len() + last.len() {
        return false;
    }
    let mut rest = &candidate[first.len()..];
    for piece in &pieces[1..pieces.len() - 1] {
        match rest.find(piece) {
            Some(idx) => rest = &rest[idx + piece.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

fn required_set(schema: &Value) -> BTreeSet<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| {
            r.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// GTS-style type system keeping schemas and instances in memory.
///
/// Type ids look like `gts.hai3.mfes.ext.domain.v1~`; a derived type appends
/// further segments after `~`, so derivation is a prefix relation.
pub struct InMemoryTypeSystem {
    schemas: RwLock<HashMap<String, Value>>,
    instances: RwLock<HashMap<String, Value>>,
}

impl InMemoryTypeSystem {
    /// Create a type system preloaded with the HAI3 first-class schemas.
    pub fn new() -> Self {
        let system = Self::empty();
        {
            let mut schemas = system.schemas.write();
            for (type_id, schema) in builtin_schemas() {
                schemas.insert(type_id.to_string(), schema);
            }
        }
        system
    }

    /// Create a type system with no schemas at all.
    pub fn empty() -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.read().len()
    }
}

impl Default for InMemoryTypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSystemPlugin for InMemoryTypeSystem {
    fn name(&self) -> &str {
        "in-memory-gts"
    }

    fn is_valid_type_id(&self, type_id: &str) -> bool {
        parse_segments(type_id).is_some()
    }

    fn build_type_id(&self, parts: &TypeIdParts) -> Result<String> {
        let names = [&parts.vendor, &parts.package, &parts.namespace, &parts.type_name];
        if let Some(bad) = names.iter().find(|n| !is_name(n)) {
            return Err(MfeError::SchemaValidation {
                type_id: String::new(),
                errors: vec![ValidationError::new(
                    "",
                    format!("'{}' is not a valid type id component", bad),
                )],
            });
        }
        let version = match parts.ver_minor {
            Some(minor) => format!("v{}.{}", parts.ver_major, minor),
            None => format!("v{}", parts.ver_major),
        };
        Ok(format!(
            "{}{}.{}.{}.{}.{}~",
            GTS_PREFIX, parts.vendor, parts.package, parts.namespace, parts.type_name, version
        ))
    }

    fn parse_type_id(&self, type_id: &str) -> Result<Value> {
        let segments = parse_segments(type_id).ok_or_else(|| MfeError::SchemaValidation {
            type_id: type_id.to_string(),
            errors: vec![ValidationError::new("", "not a valid type id")],
        })?;
        Ok(json!({
            "isType": type_id.ends_with('~'),
            "segments": segments.iter().map(Segment::to_json).collect::<Vec<_>>(),
        }))
    }

    fn register_schema(&self, type_id: &str, schema: Value) -> Result<()> {
        if !self.is_valid_type_id(type_id) {
            return Err(MfeError::SchemaValidation {
                type_id: type_id.to_string(),
                errors: vec![ValidationError::new("", "not a valid type id")],
            });
        }
        self.schemas.write().insert(type_id.to_string(), schema);
        Ok(())
    }

    fn get_schema(&self, type_id: &str) -> Option<Value> {
        self.schemas.read().get(type_id).cloned()
    }

    fn register_instance(&self, instance: Value) -> Result<()> {
        let id = instance
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| MfeError::SchemaValidation {
                type_id: String::new(),
                errors: vec![ValidationError::new("id", "instance has no string id")],
            })?;
        self.instances.write().insert(id, instance);
        Ok(())
    }

    fn unregister_instance(&self, id: &str) {
        self.instances.write().remove(id);
    }

    fn validate_instance(&self, type_id: &str, instance: &Value) -> ValidationResult {
        match self.schemas.read().get(type_id) {
            Some(schema) => validate_value(schema, instance),
            None => ValidationResult::failure(
                "",
                format!("no schema registered for '{}'", type_id),
            ),
        }
    }

    fn validate_against_schema(&self, schema: &Value, instance: &Value) -> ValidationResult {
        validate_value(schema, instance)
    }

    fn query(&self, pattern: &str, limit: Option<usize>) -> Vec<String> {
        let mut ids: BTreeSet<String> = BTreeSet::new();
        ids.extend(self.schemas.read().keys().cloned());
        ids.extend(self.instances.read().keys().cloned());
        ids.into_iter()
            .filter(|id| matches_pattern(pattern, id))
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    fn is_type_of(&self, type_id: &str, base_type_id: &str) -> bool {
        if type_id == base_type_id {
            return true;
        }
        base_type_id.ends_with('~')
            && type_id.starts_with(base_type_id)
            && self.is_valid_type_id(type_id)
    }

    fn check_compatibility(&self, old_type_id: &str, new_type_id: &str) -> CompatibilityResult {
        let (Some(old), Some(new)) = (parse_segments(old_type_id), parse_segments(new_type_id))
        else {
            return CompatibilityResult {
                compatible: false,
                breaking: true,
                changes: vec!["unparseable type id".to_string()],
            };
        };

        let old_families: Vec<String> = old.iter().map(Segment::family).collect();
        let new_families: Vec<String> = new.iter().map(Segment::family).collect();
        if old_families != new_families {
            return CompatibilityResult {
                compatible: false,
                breaking: true,
                changes: vec!["type family differs".to_string()],
            };
        }

        let mut changes = Vec::new();
        let mut breaking = false;
        for (o, n) in old.iter().zip(new.iter()) {
            if o.major != n.major {
                breaking = true;
                changes.push(format!(
                    "{}: major version {} -> {}",
                    o.family(),
                    o.major,
                    n.major
                ));
            } else if o.minor != n.minor {
                changes.push(format!(
                    "{}: minor version {:?} -> {:?}",
                    o.family(),
                    o.minor,
                    n.minor
                ));
            }
        }

        let schemas = self.schemas.read();
        if let (Some(old_schema), Some(new_schema)) =
            (schemas.get(old_type_id), schemas.get(new_type_id))
        {
            let old_required = required_set(old_schema);
            for added in required_set(new_schema).difference(&old_required) {
                breaking = true;
                changes.push(format!("new required property '{}'", added));
            }
        }

        CompatibilityResult {
            compatible: !breaking,
            breaking,
            changes,
        }
    }

    fn get_attribute(&self, type_id: &str, path: &str) -> AttributeResult {
        let root = self
            .instances
            .read()
            .get(type_id)
            .cloned()
            .or_else(|| self.schemas.read().get(type_id).cloned());
        let Some(root) = root else {
            return AttributeResult::unresolved(format!("'{}' is not registered", type_id));
        };

        let mut current = &root;
        for key in path.split('.').filter(|k| !k.is_empty()) {
            match current.get(key) {
                Some(next) => current = next,
                None => {
                    return AttributeResult::unresolved(format!(
                        "attribute '{}' not found on '{}'",
                        path, type_id
                    ))
                }
            }
        }
        AttributeResult::resolved(current.clone())
    }
}
