//! Identity claims and role authorization.
//!
//! Authentication happens upstream (the gateway verifies the token); handlers only see the
//! resulting claims. These helpers resolve individual claims and enforce the role gate each
//! handler starts with.

use clinic_types::Role;
use std::collections::BTreeMap;

/// Claim holding the caller's subject identifier.
pub const SUB_CLAIM: &str = "sub";
/// Claim holding the caller's account role.
pub const ROLE_CLAIM: &str = "custom:role";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No usable identity was presented (401).
    #[error("unauthorized")]
    Unauthenticated,
    /// The identity is valid but its role is not allowed here (403).
    #[error("forbidden")]
    Forbidden,
}

/// Verified identity claims for a single request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Claims {
    values: BTreeMap<String, String>,
}

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims for a caller with the given subject and role.
    pub fn for_subject(sub: impl Into<String>, role: Role) -> Self {
        Self::new()
            .with(SUB_CLAIM, sub)
            .with(ROLE_CLAIM, role.as_str())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn subject(&self) -> Option<&str> {
        resolve_claim(self, SUB_CLAIM)
    }

    /// The caller's role, if the role claim is present and names a known role.
    pub fn role(&self) -> Option<Role> {
        resolve_claim(self, ROLE_CLAIM).and_then(|r| r.parse().ok())
    }
}

/// Returns the named claim, treating blank values as absent.
pub fn resolve_claim<'a>(claims: &'a Claims, name: &str) -> Option<&'a str> {
    claims
        .values
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Ensures the caller holds one of `allowed` roles.
///
/// A missing role claim is an authentication failure; a present but disallowed (or unknown)
/// role is a permission failure.
pub fn require_role(claims: &Claims, allowed: &[Role]) -> Result<Role, AuthError> {
    let raw = resolve_claim(claims, ROLE_CLAIM).ok_or(AuthError::Unauthenticated)?;
    match raw.parse::<Role>() {
        Ok(role) if allowed.contains(&role) => Ok(role),
        _ => Err(AuthError::Forbidden),
    }
}

/// Validates a gateway API key when one is configured.
///
/// With no expected key configured every request passes.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> Result<(), AuthError> {
    match expected {
        None => Ok(()),
        Some(expected) if provided == Some(expected) => Ok(()),
        Some(_) => Err(AuthError::Unauthenticated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_role_accepts_allowed_role() {
        let claims = Claims::for_subject("p-1", Role::Patient);
        assert_eq!(require_role(&claims, &[Role::Patient]), Ok(Role::Patient));
    }

    #[test]
    fn require_role_rejects_other_role() {
        let claims = Claims::for_subject("d-1", Role::Doctor);
        assert_eq!(
            require_role(&claims, &[Role::Patient]),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn require_role_without_role_claim_is_unauthenticated() {
        let claims = Claims::new().with(SUB_CLAIM, "p-1");
        assert_eq!(
            require_role(&claims, &[Role::Patient]),
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn unknown_role_is_forbidden() {
        let claims = Claims::new().with(ROLE_CLAIM, "ADMIN");
        assert_eq!(
            require_role(&claims, &[Role::Patient, Role::Doctor]),
            Err(AuthError::Forbidden)
        );
        assert_eq!(claims.role(), None);
    }

    #[test]
    fn blank_subject_resolves_to_none() {
        let claims = Claims::new().with(SUB_CLAIM, "  ");
        assert_eq!(claims.subject(), None);
    }

    #[test]
    fn api_key_only_checked_when_configured() {
        assert!(validate_api_key(None, None).is_ok());
        assert!(validate_api_key(Some("k"), Some("k")).is_ok());
        assert_eq!(
            validate_api_key(Some("x"), Some("k")),
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(
            validate_api_key(None, Some("k")),
            Err(AuthError::Unauthenticated)
        );
    }
}
