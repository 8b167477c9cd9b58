//! Structural compatibility between an entry and a domain.

use serde::{Deserialize, Serialize};

use crate::types::{Domain, Entry};

/// Which subset rule a contract error violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractErrorKind {
    /// `entry.requiredProperties ⊄ domain.sharedProperties`
    MissingProperty,
    /// `entry.actions ⊄ domain.extensionsActions`
    UnsupportedAction,
    /// `domain.actions ⊄ entry.domainActions`
    UnhandledDomainAction,
}

/// One violated subset rule, naming the offending type id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub type_id: String,
    pub details: String,
}

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.details)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractValidationResult {
    pub valid: bool,
    pub errors: Vec<ContractError>,
}

/// Check the three subset rules.
///
/// Errors are ordered: missing required properties, then unsupported entry
/// actions, then unhandled domain actions; within a group, declaration order.
pub fn validate_contract(entry: &Entry, domain: &Domain) -> ContractValidationResult {
    let mut errors = Vec::new();

    for property in &entry.required_properties {
        if !domain.offers_property(property) {
            errors.push(ContractError {
                kind: ContractErrorKind::MissingProperty,
                type_id: property.clone(),
                details: format!(
                    "entry requires property '{}' which domain '{}' does not provide",
                    property, domain.id
                ),
            });
        }
    }

    for action in &entry.actions {
        if !domain.extensions_actions.iter().any(|a| a == action) {
            errors.push(ContractError {
                kind: ContractErrorKind::UnsupportedAction,
                type_id: action.clone(),
                details: format!(
                    "entry emits action '{}' which domain '{}' does not accept",
                    action, domain.id
                ),
            });
        }
    }

    for action in &domain.actions {
        if !entry.handles_domain_action(action) {
            errors.push(ContractError {
                kind: ContractErrorKind::UnhandledDomainAction,
                type_id: action.clone(),
                details: format!(
                    "domain action '{}' is not handled by entry '{}'",
                    action, entry.id
                ),
            });
        }
    }

    ContractValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Domain {
        Domain::new("d", 30_000)
            .with_shared_properties(["theme", "language"])
            .with_actions(["load"])
            .with_extensions_actions(["navigate"])
    }

    fn entry() -> Entry {
        Entry::new("e")
            .with_required_properties(["theme"])
            .with_optional_properties(["density"])
            .with_actions(["navigate"])
            .with_domain_actions(["load", "refresh"])
    }

    #[test]
    fn test_compatible_contract() {
        let result = validate_contract(&entry(), &domain());
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_missing_required_property() {
        let entry = entry().with_required_properties(["theme", "user"]);
        let result = validate_contract(&entry, &domain());
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ContractErrorKind::MissingProperty);
        assert_eq!(result.errors[0].type_id, "user");
    }

    #[test]
    fn test_unsupported_entry_action() {
        let entry = entry().with_actions(["navigate", "popup"]);
        let result = validate_contract(&entry, &domain());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ContractErrorKind::UnsupportedAction);
        assert_eq!(result.errors[0].type_id, "popup");
    }

    #[test]
    fn test_unhandled_domain_action() {
        let entry = entry().with_domain_actions(["refresh"]);
        let result = validate_contract(&entry, &domain());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ContractErrorKind::UnhandledDomainAction);
        assert_eq!(result.errors[0].type_id, "load");
    }

    #[test]
    fn test_optional_properties_are_not_checked() {
        let entry = entry().with_optional_properties(["anything"]);
        assert!(validate_contract(&entry, &domain()).valid);
    }

    #[test]
    fn test_error_order_is_deterministic() {
        let entry = Entry::new("e")
            .with_domain_actions(Vec::<String>::new())
            .with_actions(["popup"])
            .with_required_properties(["user"]);
        let result = validate_contract(&entry, &domain());
        let kinds: Vec<_> = result.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ContractErrorKind::MissingProperty,
                ContractErrorKind::UnsupportedAction,
                ContractErrorKind::UnhandledDomainAction,
            ]
        );
    }
}
