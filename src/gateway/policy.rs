//! Security policy evaluation.
//!
//! A [`PolicyDecision`] is a pure function of the statement class, the
//! requested schema, and the frozen [`crate::config::PolicyConfig`]. The
//! schema gate runs first and is independent of the statement class; the
//! mode gate then applies the permission table. Evaluation never touches
//! the database and never mutates anything, so repeated calls with the same
//! inputs always agree.

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::PolicyConfig;
use crate::gateway::classifier::StatementClass;

/// Operating mode of the gateway, fixed at startup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Only read statements pass.
    #[default]
    #[value(name = "readonly")]
    Readonly,
    /// Read and write statements pass; destructive statements do not.
    #[value(name = "limited_write")]
    LimitedWrite,
    /// Everything passes; unclassifiable statements are flagged for audit.
    #[value(name = "full_access")]
    FullAccess,
}

impl SecurityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::LimitedWrite => "limited_write",
            Self::FullAccess => "full_access",
        }
    }

    /// The permission table for classified statements. `Unknown` is handled
    /// separately because its denial carries a different reason.
    fn permits(&self, class: StatementClass) -> bool {
        match self {
            Self::Readonly => matches!(class, StatementClass::Read),
            Self::LimitedWrite => {
                matches!(class, StatementClass::Read | StatementClass::Write)
            }
            Self::FullAccess => true,
        }
    }
}

impl std::fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which schemas the gateway will touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaAllowList {
    /// `*`: every schema is allowed, including requests with no schema.
    Any,
    /// Uppercased schema names; a request without a schema is rejected.
    Named(BTreeSet<String>),
}

impl SchemaAllowList {
    /// Parse a comma-separated list; `*` anywhere means every schema.
    /// An empty string yields an empty named set, which denies everything.
    pub fn parse(raw: &str) -> Self {
        let mut names = BTreeSet::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part == "*" {
                return Self::Any;
            }
            if !part.is_empty() {
                names.insert(part.to_uppercase());
            }
        }
        Self::Named(names)
    }

    pub fn allows(&self, schema: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Named(names) => match schema {
                Some(s) => names.contains(&s.to_uppercase()),
                None => false,
            },
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl std::fmt::Display for SchemaAllowList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Named(names) => {
                let joined = names.iter().cloned().collect::<Vec<_>>().join(",");
                f.write_str(&joined)
            }
        }
    }
}

/// Why a request was denied. The three reasons are deliberately distinct so
/// callers can tell a mode problem from a schema problem from input the
/// classifier could not place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The statement class is not permitted under the current mode.
    ModeForbidden,
    /// The target schema is not on the allow-list.
    SchemaForbidden,
    /// The statement could not be classified and the mode does not admit
    /// unknown statements.
    Unclassifiable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModeForbidden => "mode_forbidden",
            Self::SchemaForbidden => "schema_forbidden",
            Self::Unclassifiable => "unclassifiable",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow {
        /// Set for unclassifiable statements admitted under full access.
        audit_flagged: bool,
    },
    Deny {
        reason: DenyReason,
        detail: String,
    },
}

impl PolicyDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Evaluate a classified statement against the policy.
///
/// `schema` is the schema named on the request, if any; the configured
/// default schema fills in when it is absent.
pub fn evaluate(
    class: StatementClass,
    schema: Option<&str>,
    policy: &PolicyConfig,
) -> PolicyDecision {
    let effective_schema = schema.or(policy.default_schema.as_deref());

    if !policy.allowed_schemas.allows(effective_schema) {
        let detail = match effective_schema {
            Some(s) => format!(
                "schema '{}' is not on the allow-list ({})",
                s, policy.allowed_schemas
            ),
            None => format!(
                "no schema given and the allow-list ({}) requires one",
                policy.allowed_schemas
            ),
        };
        return PolicyDecision::Deny {
            reason: DenyReason::SchemaForbidden,
            detail,
        };
    }

    match class {
        StatementClass::Unknown => {
            if policy.security_mode == SecurityMode::FullAccess {
                PolicyDecision::Allow {
                    audit_flagged: true,
                }
            } else {
                PolicyDecision::Deny {
                    reason: DenyReason::Unclassifiable,
                    detail: format!(
                        "statement could not be classified; mode '{}' does not admit unknown statements",
                        policy.security_mode
                    ),
                }
            }
        }
        _ => {
            if policy.security_mode.permits(class) {
                PolicyDecision::Allow {
                    audit_flagged: false,
                }
            } else {
                PolicyDecision::Deny {
                    reason: DenyReason::ModeForbidden,
                    detail: format!(
                        "{} statements are not permitted in mode '{}'",
                        class, policy.security_mode
                    ),
                }
            }
        }
    }
}
