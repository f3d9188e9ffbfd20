//! Excluded provider detector - finds billing after an exclusion took effect
//!
//! Exclusion records are tied to registry identities by npi when the record
//! carries one, otherwise by normalized party name (and state, when both
//! sides have one). Any billing where the provider is the billing or the
//! servicing npi, in a month after the exclusion date and before any
//! reinstatement, is post-exclusion billing and is entirely recoverable.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{
    normalize_name, Evidence, ExclusionRecord, MatchMethod, ProviderIdentity, Severity,
    SignalFinding, SignalKind,
};
use crate::source::BillingSource;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Detects providers billing while on the exclusion list
#[derive(Debug, Default)]
pub struct ExcludedProviderDetector;

impl ExcludedProviderDetector {
    pub fn new() -> Self {
        Self
    }
}

struct Match<'a> {
    record: &'a ExclusionRecord,
    method: MatchMethod,
    matched_name: String,
}

#[derive(Default)]
struct PostExclusion {
    billing: f64,
    claims: u64,
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
    /// Index into the provider's match list of the earliest record that applied
    record: Option<usize>,
}

fn states_agree(record: &ExclusionRecord, identity: &ProviderIdentity) -> bool {
    match (record.state.as_deref(), identity.state.as_deref()) {
        (Some(a), Some(b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
            a.trim().eq_ignore_ascii_case(b.trim())
        }
        _ => true,
    }
}

fn match_exclusions<'a>(
    exclusions: &'a [ExclusionRecord],
    identities: &BTreeMap<String, ProviderIdentity>,
    by_name: bool,
) -> BTreeMap<String, Vec<Match<'a>>> {
    let mut name_index: BTreeMap<String, Vec<&ProviderIdentity>> = BTreeMap::new();
    if by_name {
        for identity in identities.values() {
            name_index
                .entry(normalize_name(&identity.display_name))
                .or_default()
                .push(identity);
        }
    }

    let mut matches: BTreeMap<String, Vec<Match<'a>>> = BTreeMap::new();
    for record in exclusions {
        if let Some(npi) = record.usable_npi() {
            let matched_name = identities
                .get(npi)
                .map(|i| i.display_name.clone())
                .or_else(|| record.party_names().into_iter().next())
                .unwrap_or_default();
            matches.entry(npi.to_string()).or_default().push(Match {
                record,
                method: MatchMethod::Npi,
                matched_name,
            });
            continue;
        }
        if !by_name {
            continue;
        }
        for name in record.party_names() {
            let key = normalize_name(&name);
            let Some(candidates) = name_index.get(&key) else {
                continue;
            };
            for identity in candidates.iter().filter(|i| states_agree(record, i)) {
                matches
                    .entry(identity.npi.clone())
                    .or_default()
                    .push(Match {
                        record,
                        method: MatchMethod::Name,
                        matched_name: identity.display_name.clone(),
                    });
            }
        }
    }

    for list in matches.values_mut() {
        list.sort_by(|a, b| {
            a.record
                .effective_date
                .cmp(&b.record.effective_date)
                .then_with(|| a.record.exclusion_type.cmp(&b.record.exclusion_type))
        });
    }
    matches
}

impl Detector for ExcludedProviderDetector {
    fn name(&self) -> &'static str {
        "ExcludedProviderDetector"
    }

    fn description(&self) -> &'static str {
        "Detects billing by providers after their exclusion took effect"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::ExcludedProvider
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.excluded_provider;
        let exclusions = source.exclusions()?;
        if exclusions.is_empty() {
            return Ok(vec![]);
        }
        let index = source.identity_index()?;
        let transactions = source.transactions()?;

        let matches = match_exclusions(&exclusions, &index.by_npi, thresholds.match_by_name);
        debug!("Matched exclusion records to {} providers", matches.len());

        let mut post: BTreeMap<&str, PostExclusion> = BTreeMap::new();
        for tx in transactions.iter() {
            let parties = std::iter::once(tx.billing_npi.as_str()).chain(tx.distinct_servicing_npi());
            for npi in parties {
                let Some(list) = matches.get(npi) else {
                    continue;
                };
                let Some(pos) = list.iter().position(|m| m.record.excludes(tx.service_month)) else {
                    continue;
                };
                let entry = post.entry(npi).or_default();
                entry.billing += tx.amount;
                entry.claims += tx.claims;
                entry.first = Some(entry.first.map_or(tx.service_month, |f| f.min(tx.service_month)));
                entry.last = Some(entry.last.map_or(tx.service_month, |l| l.max(tx.service_month)));
                entry.record = Some(entry.record.map_or(pos, |r| r.min(pos)));
            }
        }

        let mut findings = Vec::new();
        for (npi, totals) in post {
            let (Some(first), Some(last), Some(pos)) = (totals.first, totals.last, totals.record) else {
                continue;
            };
            if totals.billing <= 0.0 {
                continue;
            }
            let Some(m) = matches.get(npi).and_then(|list| list.get(pos)) else {
                continue;
            };
            let overpayment = bounded_overpayment(
                totals.billing * thresholds.overpayment_fraction,
                totals.billing,
            );
            let evidence = Evidence::ExcludedProvider {
                matched_name: m.matched_name.clone(),
                match_method: m.method,
                exclusion_type: m.record.exclusion_type.clone(),
                exclusion_date: m.record.effective_date,
                reinstatement_date: m.record.reinstatement_date,
                billing_after_exclusion: crate::models::round2(totals.billing),
                claims_after_exclusion: totals.claims,
                first_month_after_exclusion: first,
                last_month_after_exclusion: last,
            };
            findings.push(SignalFinding::new(
                npi,
                Severity::Critical,
                evidence,
                overpayment,
                &m.record.effective_date.to_string(),
            ));
        }

        debug!("ExcludedProviderDetector found {} findings", findings.len());
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{date, exclusion, identity, source, tx};

    fn detect(src: &dyn BillingSource) -> Vec<SignalFinding> {
        ExcludedProviderDetector::new()
            .detect(src, &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_billing_after_exclusion_is_critical() {
        let src = source(
            vec![
                tx("1000000001", "2022-12", 9_000.0, 10),
                tx("1000000001", "2023-03", 50_000.0, 40),
            ],
            vec![exclusion(Some("1000000001"), "JOHN", "DOE", "2023-01-01")],
            vec![identity("1000000001")],
        );
        let findings = detect(&src);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(f.estimated_overpayment, 50_000.0);
        assert_eq!(f.statute, "31 U.S.C. section 3729(a)(1)(A)");
        match &f.evidence {
            Evidence::ExcludedProvider {
                match_method,
                claims_after_exclusion,
                exclusion_date,
                ..
            } => {
                assert_eq!(*match_method, MatchMethod::Npi);
                assert_eq!(*claims_after_exclusion, 40);
                assert_eq!(*exclusion_date, date("2023-01-01"));
            }
            other => panic!("unexpected evidence {other:?}"),
        }
    }

    #[test]
    fn test_name_match_without_npi() {
        let mut provider = identity("1000000002");
        provider.display_name = "John  Doe".into();
        let src = source(
            vec![tx("1000000002", "2023-05", 1_000.0, 2)],
            vec![exclusion(None, "JOHN", "DOE", "2023-01-01")],
            vec![provider],
        );
        let findings = detect(&src);
        assert_eq!(findings.len(), 1);
        assert!(matches!(
            findings[0].evidence,
            Evidence::ExcludedProvider {
                match_method: MatchMethod::Name,
                ..
            }
        ));
    }

    #[test]
    fn test_name_match_requires_state_agreement() {
        let mut provider = identity("1000000002");
        provider.display_name = "JOHN DOE".into();
        let mut record = exclusion(None, "JOHN", "DOE", "2023-01-01");
        record.state = Some("CA".into());
        let src = source(
            vec![tx("1000000002", "2023-05", 1_000.0, 2)],
            vec![record],
            vec![provider],
        );
        assert!(detect(&src).is_empty());
    }

    #[test]
    fn test_reinstatement_and_effective_month_not_counted() {
        let mut record = exclusion(Some("1000000001"), "JOHN", "DOE", "2023-01-01");
        record.reinstatement_date = Some(date("2023-04-01"));
        let src = source(
            vec![
                tx("1000000001", "2023-01", 100.0, 1),
                tx("1000000001", "2023-02", 200.0, 1),
                tx("1000000001", "2023-04", 400.0, 1),
            ],
            vec![record],
            vec![identity("1000000001")],
        );
        let findings = detect(&src);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].estimated_overpayment, 200.0);
    }

    #[test]
    fn test_servicing_role_counts() {
        let mut row = tx("1000000009", "2023-06", 700.0, 3);
        row.servicing_npi = Some("1000000001".into());
        let src = source(
            vec![row],
            vec![exclusion(Some("1000000001"), "JOHN", "DOE", "2023-01-01")],
            vec![identity("1000000001"), identity("1000000009")],
        );
        let findings = detect(&src);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].npi, "1000000001");
        assert_eq!(findings[0].estimated_overpayment, 700.0);
    }

    #[test]
    fn test_no_billing_after_exclusion() {
        let src = source(
            vec![tx("1000000001", "2022-06", 100.0, 1)],
            vec![exclusion(Some("1000000001"), "JOHN", "DOE", "2023-01-01")],
            vec![identity("1000000001")],
        );
        assert!(detect(&src).is_empty());
    }
}
