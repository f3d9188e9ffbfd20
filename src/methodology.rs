//! Methodology registry
//!
//! Static reference data for every signal: what it looks for, its
//! threshold, how overpayment is estimated, the False Claims Act framing
//! and the signal's inherent risk weight. The scorer reads the risk weights;
//! everything else is carried through to the output layer.

use crate::models::SignalKind;
use serde::Serialize;

/// Reference entry for one signal type
#[derive(Debug, Clone, Serialize)]
pub struct MethodologyEntry {
    pub signal: SignalKind,
    pub name: &'static str,
    pub description: &'static str,
    pub threshold: &'static str,
    pub overpayment_basis: &'static str,
    pub statute: &'static str,
    pub claim_type: &'static str,
    pub next_steps: &'static [&'static str],
    /// Inherent fraud-indicative strength used by the risk scorer
    pub risk_weight: f64,
}

/// Statute cited when a signal has no specific subsection
pub const GENERAL_STATUTE: &str = "31 U.S.C. section 3729";

static REGISTRY: [MethodologyEntry; 19] = [
    MethodologyEntry {
        signal: SignalKind::ExcludedProvider,
        name: "Excluded Provider",
        description: "Provider on the exclusion list billed after the exclusion took effect",
        threshold: "Any billing after the exclusion date and before reinstatement",
        overpayment_basis: "100% of post-exclusion billing",
        statute: "31 U.S.C. section 3729(a)(1)(A)",
        claim_type: "Presenting false claims: an excluded provider cannot bill federal healthcare programs",
        next_steps: &[
            "Verify exclusion status and dates against the exclusion database",
            "Request itemized claims for the post-exclusion period from the state agency",
            "Identify the managed care organizations that processed the post-exclusion claims",
        ],
        risk_weight: 10.0,
    },
    MethodologyEntry {
        signal: SignalKind::BillingOutlier,
        name: "Billing Outlier",
        description: "Total billing above the 99th percentile of the taxonomy and state peer group",
        threshold: "Total billing > p99 of peers; peer groups below 5 providers skipped",
        overpayment_basis: "Billing in excess of the peer p99",
        statute: "31 U.S.C. section 3729(a)(1)(A)",
        claim_type: "Potential overbilling: billing far exceeds peer group norms",
        next_steps: &[
            "Compare the procedure code mix to the peer group",
            "Confirm the provider practices at the registered address",
            "Sample patient records to verify services were rendered",
        ],
        risk_weight: 5.0,
    },
    MethodologyEntry {
        signal: SignalKind::RapidEscalation,
        name: "Rapid Escalation",
        description: "Newly enrolled provider whose rolling billing grows explosively",
        threshold: "Rolling 3-month billing grows > 200% month over month within the first year",
        overpayment_basis: "Billing in trigger months",
        statute: "31 U.S.C. section 3729(a)(1)(A)",
        claim_type: "Potential bust-out scheme: new provider with rapid billing escalation",
        next_steps: &[
            "Investigate ownership changes around the enrollment date",
            "Request claims detail for the first twelve billing months",
            "Check for ties between the entity and excluded individuals",
        ],
        risk_weight: 7.0,
    },
    MethodologyEntry {
        signal: SignalKind::WorkforceImpossibility,
        name: "Workforce Impossibility",
        description: "Organization billing more claims than its workforce could physically deliver",
        threshold: "> 6 claims per worker-hour in the peak month (176 hours per month)",
        overpayment_basis: "Claims above 6 per worker-hour times the average claim cost",
        statute: "31 U.S.C. section 3729(a)(1)(B)",
        claim_type: "False records: billing volume implies fabricated claims",
        next_steps: &[
            "Request employment records for licensed practitioners at the entity",
            "Compare staffing levels with claim volume by month",
            "Review claims for identical procedures billed on the same dates",
        ],
        risk_weight: 8.0,
    },
    MethodologyEntry {
        signal: SignalKind::SharedOfficial,
        name: "Shared Official",
        description: "One authorized official controls many billing entities",
        threshold: ">= 5 providers and > $1M combined billing",
        overpayment_basis: "15% of combined network billing, attributed per member",
        statute: "31 U.S.C. section 3729(a)(1)(C)",
        claim_type: "Conspiracy: coordinated billing through entities controlled by one individual",
        next_steps: &[
            "Investigate beneficial ownership of every entity tied to the official",
            "Check for cross-referrals between the controlled entities",
            "Review claims for patients shared across the entities",
        ],
        risk_weight: 5.0,
    },
    MethodologyEntry {
        signal: SignalKind::GeographicImplausibility,
        name: "Geographic Implausibility",
        description: "Home health provider billing many claims per beneficiary",
        threshold: "Beneficiaries per claim < 0.1",
        overpayment_basis: "Claims beyond one beneficiary per 10 claims times the average claim value",
        statute: "31 U.S.C. section 3729(a)(1)(G)",
        claim_type: "Reverse false claims: repeated billing on the same patients",
        next_steps: &[
            "Verify patient addresses against the service area",
            "Request visit logs and compare them with billed service dates",
            "Check other payers for duplicate billing of the same services",
        ],
        risk_weight: 4.0,
    },
    MethodologyEntry {
        signal: SignalKind::AddressClustering,
        name: "Address Clustering",
        description: "Many billing providers registered at one postal code",
        threshold: ">= 10 providers and > $5M combined billing",
        overpayment_basis: "15% of combined cluster billing, attributed per member",
        statute: "31 U.S.C. section 3729(a)(1)(C)",
        claim_type: "Potential ghost office: dense concentration of billing providers at one location",
        next_steps: &[
            "Site-visit the address to confirm each provider has a physical office",
            "Check for shared phone, fax or billing contacts across the cluster",
            "Review corporate filings for common ownership",
        ],
        risk_weight: 4.0,
    },
    MethodologyEntry {
        signal: SignalKind::Upcoding,
        name: "Upcoding",
        description: "Provider bills high-complexity E&M codes far above peers",
        threshold: "> 80% high-complexity E&M share while peer average < 30%",
        overpayment_basis: "30% uplift on E&M billing attributable to the excess share",
        statute: "31 U.S.C. section 3729(a)(1)(A)",
        claim_type: "Systematic upcoding: highest-complexity codes far above peer norms",
        next_steps: &[
            "Audit documentation for a sample of high-complexity claims",
            "Track the code distribution month over month for sudden shifts",
            "Ask billing staff whether coding software or training changed",
        ],
        risk_weight: 7.0,
    },
    MethodologyEntry {
        signal: SignalKind::ConcurrentBilling,
        name: "Concurrent Billing",
        description: "Individual provider billing in many states in the same month",
        threshold: ">= 5 distinct service states in one month",
        overpayment_basis: "60% of billing in flagged months",
        statute: "31 U.S.C. section 3729(a)(1)(B)",
        claim_type: "Phantom billing: one individual billing across distant states at once",
        next_steps: &[
            "Verify travel records or telehealth documentation",
            "Check whether the npi has been compromised or used without authorization",
            "Determine which services were in person and which could be remote",
        ],
        risk_weight: 6.0,
    },
    MethodologyEntry {
        signal: SignalKind::BurstEnrollment,
        name: "Burst Enrollment",
        description: "Cohort of organizations with the same specialty enrolled in one state and quarter",
        threshold: ">= 4 organizations and > $500K combined billing",
        overpayment_basis: "25% of each member's billing",
        statute: "31 U.S.C. section 3729(a)(1)(C)",
        claim_type: "Coordinated enrollment: a cohort of new entities created together to bill",
        next_steps: &[
            "Compare ownership, officials and addresses across the cohort",
            "Check whether the cohort shares billing agents or bank accounts",
            "Review the cohort's billing start dates for synchronized patterns",
        ],
        risk_weight: 5.0,
    },
    MethodologyEntry {
        signal: SignalKind::BillingMonoculture,
        name: "Billing Monoculture",
        description: "Almost all of a provider's claims carry one procedure code",
        threshold: "> 85% of claims on one code with > 500 claims",
        overpayment_basis: "25% of billing attributable to the share above 85%",
        statute: "31 U.S.C. section 3729(a)(1)(A)",
        claim_type: "Potential claim mill: billing concentrated on a single service",
        next_steps: &[
            "Confirm the practice model supports a single-service billing profile",
            "Sample records for the dominant code to verify medical necessity",
            "Compare the code's reimbursement with the provider's other services",
        ],
        risk_weight: 4.0,
    },
    MethodologyEntry {
        signal: SignalKind::BillingBustOut,
        name: "Billing Bust-Out",
        description: "Billing ramps to a sharp peak and then collapses",
        threshold: "Peak > $50K, post-peak average < 10% of peak, pre-peak average < 50% of peak",
        overpayment_basis: "40% of the peak month plus three pre-peak months",
        statute: "31 U.S.C. section 3729(a)(1)(A)",
        claim_type: "Bust-out scheme: rapid billing run-up followed by abandonment",
        next_steps: &[
            "Check whether the entity is still operating or reachable",
            "Trace payments made during the peak months",
            "Look for successor entities tied to the same officials",
        ],
        risk_weight: 7.0,
    },
    MethodologyEntry {
        signal: SignalKind::RateAnomaly,
        name: "Reimbursement Rate Anomaly",
        description: "Paid amount per claim far above the median for the same code",
        threshold: "Rate per claim > 3x the code median, >= 10 peer providers",
        overpayment_basis: "70% of the per-claim excess over median times claims",
        statute: "31 U.S.C. section 3729(a)(1)(A)",
        claim_type: "Inflated charges: reimbursement per service far above peers",
        next_steps: &[
            "Compare billed units and modifiers against the code's norms",
            "Check for unbundled or duplicated line items",
            "Confirm the payer's fee schedule for the code and period",
        ],
        risk_weight: 5.0,
    },
    MethodologyEntry {
        signal: SignalKind::CoordinatedBillingRamp,
        name: "Coordinated Billing Ramp",
        description: "Entities under one authorized official all peak in billing within a few months",
        threshold: ">= 3 billing providers, peak months within 3 months, > $200K combined peak billing",
        overpayment_basis: "30% of each member's billing",
        statute: "31 U.S.C. section 3729(a)(1)(C)",
        claim_type: "Conspiracy: synchronized billing run-up across commonly controlled entities",
        next_steps: &[
            "Line up each member's monthly billing around the shared peak",
            "Check whether the members share patients, staff or billing agents",
            "Investigate the official's role in each entity's enrollment",
        ],
        risk_weight: 6.0,
    },
    MethodologyEntry {
        signal: SignalKind::PhantomServicingHub,
        name: "Phantom Servicing Hub",
        description: "One servicing provider appears on claims of many unrelated billing entities",
        threshold: ">= 5 distinct billing npis and > $500K billed through the hub",
        overpayment_basis: "35% of billing through the hub",
        statute: "31 U.S.C. section 3729(a)(1)(B)",
        claim_type: "False records: a servicing relationship that may be fabricated or a kickback arrangement",
        next_steps: &[
            "Confirm the servicing provider's employment or contract with each billing entity",
            "Compare service dates across entities for physically impossible overlaps",
            "Check referral payments between the hub and the billing entities",
        ],
        risk_weight: 6.0,
    },
    MethodologyEntry {
        signal: SignalKind::NetworkBeneficiaryDilution,
        name: "Network Beneficiary Dilution",
        description: "A commonly controlled network bills many claims over very few beneficiaries",
        threshold: ">= 3 providers, > $500K combined; > 50 claims per beneficiary or ratio below network p10",
        overpayment_basis: "Claims above the peer median claims per beneficiary times the average claim cost, capped at 80%",
        statute: "31 U.S.C. section 3729(a)(1)(C)",
        claim_type: "Conspiracy: beneficiaries recycled across shell entities under one official",
        next_steps: &[
            "List beneficiaries billed by more than one network member",
            "Verify the beneficiaries received services from each entity",
            "Review ownership ties between the network members",
        ],
        risk_weight: 5.0,
    },
    MethodologyEntry {
        signal: SignalKind::CaregiverDensityAnomaly,
        name: "Caregiver Density Anomaly",
        description: "Home health billing in one postal code far above the state median, mostly by individuals with few beneficiaries",
        threshold: "> 3x state median zip billing, > 50% individual providers, < 5 beneficiaries per individual",
        overpayment_basis: "40% of zip billing above the state median, split across the zip's providers",
        statute: "31 U.S.C. section 3729(a)(1)(A)",
        claim_type: "Potential family caregiver billing: care billed by relatives for few patients",
        next_steps: &[
            "Check relationships between caregivers and the beneficiaries they bill for",
            "Verify timesheets against beneficiary care plans",
            "Compare hours billed with the beneficiary's assessed care needs",
        ],
        risk_weight: 4.0,
    },
    MethodologyEntry {
        signal: SignalKind::RepetitiveServiceAbuse,
        name: "Repetitive Service Abuse",
        description: "Claims per beneficiary for one procedure code above the 99th percentile of peers",
        threshold: "> 200 claims, >= 10 peers billing the code, claims per beneficiary > peer p99",
        overpayment_basis: "80% of the cost of claims beyond the peer p99 rate",
        statute: "31 U.S.C. section 3729(a)(1)(A)",
        claim_type: "Potential therapy mill: the same service billed repeatedly on the same patients",
        next_steps: &[
            "Sample records for medical necessity of repeated services",
            "Check frequency limits for the code against billed units",
            "Interview beneficiaries about the number of sessions received",
        ],
        risk_weight: 5.0,
    },
    MethodologyEntry {
        signal: SignalKind::PhantomServicingSpread,
        name: "Phantom Servicing Spread",
        description: "Servicing provider spread across many billing entities with very few beneficiaries",
        threshold: ">= 5 billing npis, > $200K; > 100 claims per beneficiary or ratio below hub p10",
        overpayment_basis: "65% of the cost of claims beyond the hub p10 rate",
        statute: "31 U.S.C. section 3729(a)(1)(B)",
        claim_type: "False records: one practitioner's identity used to bill implausible volume",
        next_steps: &[
            "Check whether the servicing npi has been compromised",
            "Compare claims volume with the practitioner's working hours",
            "Verify beneficiaries were seen by the named practitioner",
        ],
        risk_weight: 6.0,
    },
];

/// Methodology entry for a signal type
pub fn entry(kind: SignalKind) -> &'static MethodologyEntry {
    &REGISTRY[kind as usize]
}

/// Every entry, in signal enumeration order
pub fn all() -> &'static [MethodologyEntry] {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_matches_enumeration_order() {
        for (i, kind) in SignalKind::ALL.iter().enumerate() {
            assert_eq!(all()[i].signal, *kind);
            assert_eq!(entry(*kind).signal, *kind);
        }
    }

    #[test]
    fn test_excluded_outweighs_geographic() {
        assert!(
            entry(SignalKind::ExcludedProvider).risk_weight
                > entry(SignalKind::GeographicImplausibility).risk_weight
        );
    }

    #[test]
    fn test_statutes_cite_false_claims_act() {
        for e in all() {
            assert!(e.statute.starts_with(GENERAL_STATUTE));
            assert!(!e.next_steps.is_empty());
        }
        assert_eq!(
            entry(SignalKind::GeographicImplausibility).statute,
            "31 U.S.C. section 3729(a)(1)(G)"
        );
    }
}
