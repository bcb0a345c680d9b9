// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes version compatibility between a cluster template and the services it runs.

use crate::error::{FleetError, Result};
use crate::types::{ClusterDeployment, ServiceTemplate};
use kube::ResourceExt;
use semver::{Version, VersionReq};
use std::collections::BTreeMap;

/// A version range: alternatives separated by `||`, each a set of ANDed comparators.
#[derive(Debug, Clone)]
pub struct Constraint {
    alternatives: Vec<VersionReq>,
}

impl Constraint {
    /// Accepts comparators separated by commas or whitespace, operators
    /// separated from their version by whitespace (`>= 1.28`) and hyphen
    /// ranges (`1.28 - 1.30`). A version without an operator matches exactly.
    pub fn parse(expr: &str) -> std::result::Result<Self, semver::Error> {
        let alternatives = expr
            .split("||")
            .map(|alternative| VersionReq::parse(&normalize(alternative)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

fn is_operator(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '~' | '^')
}

fn is_wildcard(version: &str) -> bool {
    version.split('.').any(|part| matches!(part, "*" | "x" | "X"))
}

fn comparator(op: &str, version: &str) -> String {
    let version = version.strip_prefix('v').unwrap_or(version);
    // semver reads a bare version as a caret range
    let op = if op.is_empty() && !is_wildcard(version) { "=" } else { op };
    format!("{}{}", op, version)
}

fn normalize(alternative: &str) -> String {
    let tokens: Vec<&str> = alternative
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut comparators = Vec::new();
    let mut pending_op = String::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];

        if token.chars().all(is_operator) {
            pending_op.push_str(token);
            i += 1;
            continue;
        }

        if pending_op.is_empty() && tokens.get(i + 1) == Some(&"-") {
            if let Some(upper) = tokens.get(i + 2) {
                comparators.push(comparator(">=", token));
                comparators.push(comparator("<=", upper));
                i += 3;
                continue;
            }
        }

        let (op, version) = token.split_at(token.find(|c: char| !is_operator(c)).unwrap_or(token.len()));
        pending_op.push_str(op);
        comparators.push(comparator(&pending_op, version));
        pending_op.clear();
        i += 1;
    }

    // A dangling operator is left in place so the parser reports it.
    if !pending_op.is_empty() {
        comparators.push(pending_op);
    }

    comparators.join(", ")
}

/// Parse a Kubernetes version, tolerating the conventional `v` prefix and
/// missing minor or patch numbers (`v1.29` is `1.29.0`).
pub fn parse_version(version: &str) -> std::result::Result<Version, semver::Error> {
    let version = version.trim().trim_start_matches('v');
    let (core, suffix) = version.split_at(version.find(['-', '+']).unwrap_or(version.len()));
    let padding = match core.split('.').count() {
        1 => ".0.0",
        2 => ".0",
        _ => "",
    };
    Version::parse(&format!("{}{}{}", core, padding, suffix))
}

/// Every enabled service's constraint must accept the cluster's Kubernetes version.
/// Services are checked in declaration order and the first mismatch is reported.
pub fn check_compatibility(
    deployment: &ClusterDeployment,
    cluster_version: &str,
    service_templates: &BTreeMap<String, ServiceTemplate>,
) -> Result<()> {
    if cluster_version.is_empty() || deployment.enabled_services().next().is_none() {
        return Ok(());
    }

    let version = parse_version(cluster_version).map_err(|e| {
        FleetError::Internal(format!(
            "failed to parse k8s version {} of the ClusterDeployment {}: {}",
            cluster_version,
            deployment.key(),
            e
        ))
    })?;

    let namespace = deployment.namespace().unwrap_or_default();

    for service in deployment.enabled_services() {
        let template = service_templates
            .get(&service.template)
            .ok_or_else(|| FleetError::not_found("ServiceTemplate", &namespace, &service.template))?;

        let constraint = template.kubernetes_constraint();
        if constraint.is_empty() {
            continue;
        }

        let parsed = Constraint::parse(constraint).map_err(|e| {
            FleetError::Internal(format!(
                "failed to parse k8s constrained version {} of the ServiceTemplate {}/{}: {}",
                constraint, namespace, service.template, e
            ))
        })?;

        if !parsed.matches(&version) {
            return Err(FleetError::ConstraintViolation {
                deployment: deployment.key(),
                service: format!("{}/{}", namespace, service.template),
                constraint: constraint.to_string(),
                version: cluster_version.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_deployment, make_service, make_service_template};

    fn templates(entries: &[(&str, &str)]) -> BTreeMap<String, ServiceTemplate> {
        entries
            .iter()
            .map(|(name, constraint)| (name.to_string(), make_service_template(name, true, constraint)))
            .collect()
    }

    #[test]
    fn test_constraint_comma_separated() {
        let c = Constraint::parse(">=1.28.0,<1.30.0").unwrap();
        assert!(c.matches(&Version::parse("1.29.0").unwrap()));
        assert!(!c.matches(&Version::parse("1.30.0").unwrap()));
        assert!(!c.matches(&Version::parse("1.27.9").unwrap()));
    }

    #[test]
    fn test_constraint_space_separated() {
        let c = Constraint::parse(">=1.28.0 <1.30.0").unwrap();
        assert!(c.matches(&Version::parse("1.29.5").unwrap()));
        assert!(!c.matches(&Version::parse("1.31.0").unwrap()));
    }

    #[test]
    fn test_constraint_operator_with_space() {
        let c = Constraint::parse(">= 1.28.0, < 1.30.0").unwrap();
        assert!(c.matches(&Version::parse("1.28.0").unwrap()));
    }

    #[test]
    fn test_constraint_alternatives() {
        let c = Constraint::parse("<1.25.0 || >=1.29.0").unwrap();
        assert!(c.matches(&Version::parse("1.24.3").unwrap()));
        assert!(c.matches(&Version::parse("1.29.0").unwrap()));
        assert!(!c.matches(&Version::parse("1.27.0").unwrap()));
    }

    #[test]
    fn test_constraint_garbage_fails_to_parse() {
        assert!(Constraint::parse(">=banana").is_err());
        assert!(Constraint::parse(">=").is_err());
    }

    #[test]
    fn test_bare_version_matches_exactly() {
        let c = Constraint::parse("1.29.0").unwrap();
        assert!(c.matches(&Version::parse("1.29.0").unwrap()));
        assert!(!c.matches(&Version::parse("1.30.0").unwrap()));
        assert!(!c.matches(&Version::parse("1.29.1").unwrap()));

        let minor = Constraint::parse("v1.29").unwrap();
        assert!(minor.matches(&Version::parse("1.29.7").unwrap()));
        assert!(!minor.matches(&Version::parse("1.30.0").unwrap()));
    }

    #[test]
    fn test_constraint_wildcard() {
        let c = Constraint::parse("1.29.x").unwrap();
        assert!(c.matches(&Version::parse("1.29.3").unwrap()));
        assert!(!c.matches(&Version::parse("1.30.0").unwrap()));
    }

    #[test]
    fn test_constraint_hyphen_range() {
        let c = Constraint::parse("1.28 - 1.30").unwrap();
        assert!(c.matches(&Version::parse("1.28.0").unwrap()));
        assert!(c.matches(&Version::parse("1.30.4").unwrap()));
        assert!(!c.matches(&Version::parse("1.27.9").unwrap()));
        assert!(!c.matches(&Version::parse("1.31.0").unwrap()));

        let exact = Constraint::parse("1.28.0 - 1.29.2 || 1.31.0").unwrap();
        assert!(exact.matches(&Version::parse("1.29.2").unwrap()));
        assert!(!exact.matches(&Version::parse("1.29.3").unwrap()));
        assert!(exact.matches(&Version::parse("1.31.0").unwrap()));
    }

    #[test]
    fn test_parse_version_with_prefix() {
        assert_eq!(parse_version("v1.29.4+k0s.0").unwrap().minor, 29);
    }

    #[test]
    fn test_parse_version_pads_missing_parts() {
        assert_eq!(parse_version("v1.29").unwrap(), Version::new(1, 29, 0));
        assert_eq!(parse_version("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(parse_version("v1.30+k0s").unwrap().minor, 30);
        assert!(parse_version("latest").is_err());
    }

    #[test]
    fn test_short_cluster_version_is_compared() {
        let cd = make_deployment("t1", vec![make_service("ingress", "ingress-1", false)]);

        assert!(check_compatibility(&cd, "v1.29", &templates(&[("ingress-1", ">=1.28.0 <1.30.0")])).is_ok());
        let err = check_compatibility(&cd, "v1.29", &templates(&[("ingress-1", ">=1.30.0")])).unwrap_err();
        assert!(matches!(err, FleetError::ConstraintViolation { .. }));
    }

    #[test]
    fn test_empty_cluster_version_always_passes() {
        let cd = make_deployment("t1", vec![make_service("ingress", "ingress-1", false)]);
        let tpls = templates(&[("ingress-1", ">=99.0.0")]);

        assert!(check_compatibility(&cd, "", &tpls).is_ok());
    }

    #[test]
    fn test_no_services_passes() {
        let cd = make_deployment("t1", vec![]);
        assert!(check_compatibility(&cd, "not-a-version", &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_only_disabled_services_passes() {
        let cd = make_deployment("t1", vec![make_service("ingress", "ingress-1", true)]);
        assert!(check_compatibility(&cd, "1.29.0", &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_disabled_service_constraint_is_never_evaluated() {
        let cd = make_deployment(
            "t1",
            vec![
                make_service("broken", "broken-1", true),
                make_service("ingress", "ingress-1", false),
            ],
        );
        let tpls = templates(&[("broken-1", "this is not a constraint"), ("ingress-1", ">=1.28.0")]);

        assert!(check_compatibility(&cd, "1.29.0", &tpls).is_ok());
    }

    #[test]
    fn test_satisfied_constraint_passes() {
        let cd = make_deployment("t1", vec![make_service("ingress", "ingress-1", false)]);
        let tpls = templates(&[("ingress-1", ">=1.28.0,<1.30.0")]);

        assert!(check_compatibility(&cd, "1.29.0", &tpls).is_ok());
    }

    #[test]
    fn test_empty_constraint_is_skipped() {
        let cd = make_deployment("t1", vec![make_service("ingress", "ingress-1", false)]);
        let tpls = templates(&[("ingress-1", "")]);

        assert!(check_compatibility(&cd, "1.29.0", &tpls).is_ok());
    }

    #[test]
    fn test_violation_names_service_and_versions() {
        let cd = make_deployment("t1", vec![make_service("ingress", "ingress-1", false)]);
        let tpls = templates(&[("ingress-1", ">=1.30.0")]);

        let err = check_compatibility(&cd, "1.29.0", &tpls).unwrap_err();
        match &err {
            FleetError::ConstraintViolation {
                service,
                constraint,
                version,
                ..
            } => {
                assert_eq!(service, "team-a/ingress-1");
                assert_eq!(constraint, ">=1.30.0");
                assert_eq!(version, "1.29.0");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_rejection());
    }

    #[test]
    fn test_first_failing_service_is_reported() {
        let cd = make_deployment(
            "t1",
            vec![
                make_service("a", "a-1", false),
                make_service("b", "b-1", false),
                make_service("c", "c-1", false),
            ],
        );
        let tpls = templates(&[("a-1", ">=1.0.0"), ("b-1", "<1.20.0"), ("c-1", "<1.10.0")]);

        let err = check_compatibility(&cd, "1.29.0", &tpls).unwrap_err();
        assert!(err.to_string().contains("team-a/b-1"));
    }

    #[test]
    fn test_malformed_version_is_internal() {
        let cd = make_deployment("t1", vec![make_service("ingress", "ingress-1", false)]);
        let tpls = templates(&[("ingress-1", ">=1.28.0")]);

        let err = check_compatibility(&cd, "latest", &tpls).unwrap_err();
        assert!(matches!(err, FleetError::Internal(_)));
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_malformed_constraint_is_internal() {
        let cd = make_deployment("t1", vec![make_service("ingress", "ingress-1", false)]);
        let tpls = templates(&[("ingress-1", ">=one.two")]);

        let err = check_compatibility(&cd, "1.29.0", &tpls).unwrap_err();
        assert!(matches!(err, FleetError::Internal(_)));
    }

    #[test]
    fn test_missing_service_template_is_not_found() {
        let cd = make_deployment("t1", vec![make_service("ingress", "ingress-1", false)]);

        let err = check_compatibility(&cd, "1.29.0", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, FleetError::NotFound { ref kind, .. } if kind == "ServiceTemplate"));
    }
}
