//! Space-delimited OAuth scope sets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered set of scope tokens.
///
/// Parsed from and serialized to the space-delimited wire form
/// (`"profile email"`). Duplicates are dropped while keeping the first
/// occurrence, so the order a client asked for is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    /// Parses a space-delimited scope string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut scopes: Vec<String> = Vec::new();
        for scope in raw.split_whitespace() {
            if !scopes.iter().any(|s| s == scope) {
                scopes.push(scope.to_string());
            }
        }
        Self(scopes)
    }

    /// Builds a set from individual scope tokens.
    #[must_use]
    pub fn from_scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = scopes
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self::parse(&joined)
    }

    /// Returns `true` if no scope was granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the set contains `scope`.
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|s| s == scope)
    }

    /// Returns the scopes of `self` that are not in `allowed`.
    #[must_use]
    pub fn not_in(&self, allowed: &[String]) -> Vec<&str> {
        self.0
            .iter()
            .filter(|s| !allowed.iter().any(|a| a == *s))
            .map(String::as_str)
            .collect()
    }

    /// Iterates over the scope tokens.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the scope tokens as a list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }

    /// Returns the space-delimited wire form.
    #[must_use]
    pub fn as_string(&self) -> String {
        self.0.join(" ")
    }
}

impl From<String> for ScopeSet {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for ScopeSet {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<ScopeSet> for String {
    fn from(scopes: ScopeSet) -> Self {
        scopes.as_string()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_order_and_drops_duplicates() {
        let scopes = ScopeSet::parse("profile  email profile");
        assert_eq!(scopes.to_vec(), vec!["profile", "email"]);
        assert_eq!(scopes.to_string(), "profile email");
    }

    #[test]
    fn test_empty() {
        assert!(ScopeSet::parse("   ").is_empty());
    }

    #[test]
    fn test_not_in() {
        let scopes = ScopeSet::parse("profile email admin");
        let allowed = vec!["profile".to_string(), "email".to_string()];
        assert_eq!(scopes.not_in(&allowed), vec!["admin"]);
    }

    #[test]
    fn test_serde_uses_wire_form() {
        let scopes = ScopeSet::from_scopes(["profile", "email"]);
        let json = serde_json::to_string(&scopes).unwrap();
        assert_eq!(json, "\"profile email\"");

        let parsed: ScopeSet = serde_json::from_str("\"email profile\"").unwrap();
        assert!(parsed.contains("profile"));
        assert!(parsed.contains("email"));
    }
}
