//! Scope definitions
//!
//! A scope is an immutable snapshot of the targets a run may touch:
//! exact domains, wildcard domain patterns and IP/CIDR ranges. CIDR strings
//! are parsed when the scope is built, so a malformed range fails the run
//! before any task exists.
//!
//! Domain matching is a literal string-suffix test, not DNS-label aware:
//! `notexample.com` is admitted by a configured `example.com`.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building a scope
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("Invalid CIDR range '{range}': {reason}")]
    InvalidCidr { range: String, reason: String },
}

/// A proposal target that failed admission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Target '{target}' is out of scope")]
pub struct ScopeViolation {
    pub target: String,
}

/// Raw scope input as collected from config files or the command line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub domains: Vec<String>,
    pub ip_ranges: Vec<String>,
    pub wildcards: Vec<String>,
}

impl ScopeConfig {
    /// Validate and freeze into a [`ScopeDefinition`]
    pub fn build(&self) -> Result<ScopeDefinition, ScopeError> {
        ScopeDefinition::new(&self.domains, &self.ip_ranges, &self.wildcards)
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.ip_ranges.is_empty() && self.wildcards.is_empty()
    }
}

/// Immutable set of admissible targets
#[derive(Debug, Clone)]
pub struct ScopeDefinition {
    domains: Vec<String>,
    networks: Vec<IpNetwork>,
    wildcard_suffixes: Vec<String>,
}

impl ScopeDefinition {
    /// Build a scope, rejecting malformed CIDR ranges.
    ///
    /// Blank entries are skipped. A range without a prefix length is a
    /// single-host network.
    pub fn new<D, R, W>(domains: D, ip_ranges: R, wildcards: W) -> Result<Self, ScopeError>
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
        W: IntoIterator,
        W::Item: AsRef<str>,
    {
        let domains = non_blank(domains);

        let networks = non_blank(ip_ranges)
            .into_iter()
            .map(|range| {
                IpNetwork::from_str(&range).map_err(|e| ScopeError::InvalidCidr {
                    range: range.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let wildcard_suffixes = non_blank(wildcards)
            .into_iter()
            .map(|w| strip_wildcard(&w).to_string())
            .collect();

        Ok(Self {
            domains,
            networks,
            wildcard_suffixes,
        })
    }

    /// Decide whether `target` may be acted upon
    pub fn is_in_scope(&self, target: &str) -> bool {
        if target.is_empty() {
            return false;
        }

        match IpAddr::from_str(target) {
            Ok(ip) => self.networks.iter().any(|net| net.contains(ip)),
            Err(_) => {
                self.domains.iter().any(|d| target.ends_with(d.as_str()))
                    || self
                        .wildcard_suffixes
                        .iter()
                        .any(|s| target.ends_with(s.as_str()))
            }
        }
    }

    /// Admission check returning a typed violation
    pub fn admit(&self, target: &str) -> Result<(), ScopeViolation> {
        if self.is_in_scope(target) {
            Ok(())
        } else {
            Err(ScopeViolation {
                target: target.to_string(),
            })
        }
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn networks(&self) -> &[IpNetwork] {
        &self.networks
    }

    /// Wildcard patterns with their `*.` marker stripped
    pub fn wildcard_suffixes(&self) -> &[String] {
        &self.wildcard_suffixes
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.networks.is_empty() && self.wildcard_suffixes.is_empty()
    }
}

/// Drop every leading `*` and `.` (so `*.example.com` -> `example.com`, `*` -> ``)
fn strip_wildcard(pattern: &str) -> &str {
    pattern.trim_start_matches(['*', '.'])
}

fn non_blank<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ScopeDefinition {
        ScopeDefinition::new(["example.com"], ["192.168.1.0/24"], ["*.example.com"]).unwrap()
    }

    #[test]
    fn test_ip_targets() {
        let scope = scope();
        assert!(scope.is_in_scope("192.168.1.100"));
        assert!(scope.is_in_scope("192.168.1.0"));
        assert!(scope.is_in_scope("192.168.1.255"));
        assert!(!scope.is_in_scope("10.0.0.1"));
        assert!(!scope.is_in_scope("192.168.2.1"));
    }

    #[test]
    fn test_domain_targets() {
        let scope = scope();
        assert!(scope.is_in_scope("example.com"));
        assert!(scope.is_in_scope("test.example.com"));
        assert!(!scope.is_in_scope("malicious.com"));
    }

    #[test]
    fn test_suffix_match_is_not_label_aware() {
        let scope = ScopeDefinition::new(["example.com"], Vec::<String>::new(), Vec::<String>::new())
            .unwrap();
        assert!(scope.is_in_scope("notexample.com"));
    }

    #[test]
    fn test_wildcard_only() {
        let scope = ScopeDefinition::new(Vec::<String>::new(), Vec::<String>::new(), ["*.corp.test"])
            .unwrap();
        assert!(scope.is_in_scope("api.corp.test"));
        assert!(scope.is_in_scope("corp.test"));
        assert!(!scope.is_in_scope("corp.example"));
        assert_eq!(scope.wildcard_suffixes(), ["corp.test".to_string()]);
    }

    #[test]
    fn test_bare_star_admits_every_hostname() {
        let scope = ScopeDefinition::new(Vec::<String>::new(), Vec::<String>::new(), ["*"]).unwrap();
        assert!(scope.is_in_scope("anything.at.all"));
        assert!(!scope.is_in_scope("10.0.0.1"));
        assert!(!scope.is_in_scope(""));
    }

    #[test]
    fn test_empty_target_rejected() {
        assert!(!scope().is_in_scope(""));
    }

    #[test]
    fn test_malformed_ip_falls_through_to_domains() {
        let scope = ScopeDefinition::new(["1.1"], ["192.168.1.0/24"], Vec::<String>::new()).unwrap();
        assert!(scope.is_in_scope("192.168.1.300.1.1"));
        assert!(!scope.is_in_scope("192.168.1.300"));
    }

    #[test]
    fn test_invalid_cidr_fails_fast() {
        let err = ScopeDefinition::new(["example.com"], ["192.168.1.0/33"], Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(err, ScopeError::InvalidCidr { ref range, .. } if range == "192.168.1.0/33"));

        assert!(ScopeDefinition::new(Vec::<String>::new(), ["not-a-range"], Vec::<String>::new())
            .is_err());
    }

    #[test]
    fn test_blank_entries_skipped() {
        let scope = ScopeDefinition::new(["example.com", ""], ["", "  "], ["\n"]).unwrap();
        assert_eq!(scope.domains().len(), 1);
        assert!(scope.networks().is_empty());
        assert!(scope.wildcard_suffixes().is_empty());
        assert!(!scope.is_in_scope("other.org"));
    }

    #[test]
    fn test_single_host_and_ipv6_ranges() {
        let scope = ScopeDefinition::new(
            Vec::<String>::new(),
            ["10.0.0.5", "2001:db8::/32"],
            Vec::<String>::new(),
        )
        .unwrap();
        assert!(scope.is_in_scope("10.0.0.5"));
        assert!(!scope.is_in_scope("10.0.0.6"));
        assert!(scope.is_in_scope("2001:db8::1"));
        assert!(!scope.is_in_scope("2001:db9::1"));
    }

    #[test]
    fn test_admit_reports_violation() {
        let scope = scope();
        assert!(scope.admit("example.com").is_ok());
        let violation = scope.admit("malicious.com").unwrap_err();
        assert_eq!(violation.target, "malicious.com");
    }

    #[test]
    fn test_scope_config_build() {
        let config = ScopeConfig {
            domains: vec!["example.com".into()],
            ip_ranges: vec!["192.168.1.0/24".into()],
            wildcards: vec![],
        };
        assert!(config.build().unwrap().is_in_scope("192.168.1.7"));
        assert!(ScopeConfig::default().build().unwrap().is_empty());
    }
}
