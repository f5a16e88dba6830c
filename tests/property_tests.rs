/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use chrono::{Duration, NaiveDate};
use company_intel_api::analysis::{extract_analysis_object, fallback_analysis, parse_analysis};
use company_intel_api::companies_house::normalize_company_number;
use company_intel_api::models::{CompanyProfile, RegisteredAddress};
use proptest::prelude::*;

fn profile(status: &str, created: NaiveDate) -> CompanyProfile {
    CompanyProfile {
        company_number: "01234567".to_string(),
        company_name: "PROPERTY TEST LTD".to_string(),
        company_status: status.to_string(),
        company_type: "ltd".to_string(),
        date_of_creation: Some(created.format("%Y-%m-%d").to_string()),
        registered_office_address: RegisteredAddress::default(),
        sic_codes: None,
        accounts: None,
        jurisdiction: None,
        has_charges: None,
        has_insolvency_history: None,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

// Property: company number normalization never panics and only emits safe path segments
proptest! {
    #[test]
    fn normalize_never_panics(raw in "\\PC*") {
        if let Ok(number) = normalize_company_number(&raw) {
            prop_assert!(!number.is_empty() && number.len() <= 8);
            prop_assert!(number.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn numeric_numbers_pad_to_eight_digits(n in 1u32..=99_999_999u32) {
        let number = normalize_company_number(&n.to_string()).unwrap();
        prop_assert_eq!(number.len(), 8);
        prop_assert_eq!(number.parse::<u32>().unwrap(), n);
    }

    #[test]
    fn prefixed_numbers_preserved(prefix in "(SC|NI|OC|SO|LP)", digits in "[0-9]{6}") {
        let raw = format!("{}{}", prefix.to_lowercase(), digits);
        let number = normalize_company_number(&raw).unwrap();
        prop_assert_eq!(number, format!("{}{}", prefix, digits));
    }
}

// Property: model reply parsing never panics and always yields an in-range score
proptest! {
    #[test]
    fn parse_never_panics(reply in "\\PC*") {
        if let Ok(analysis) = parse_analysis(&reply) {
            prop_assert!(analysis.risk_score <= 100);
        }
    }

    #[test]
    fn analysis_found_behind_prose(
        prose in "[a-zA-Z .,:]{0,60}",
        trailer in "[a-zA-Z .,:{}]{0,60}",
        score in 0u8..=100u8
    ) {
        let reply = format!(
            "{}{{\"riskScore\": {}, \"riskFactors\": [], \"businessSummary\": \"ok\"}}{}",
            prose, score, trailer
        );
        let analysis = parse_analysis(&reply).unwrap();
        prop_assert_eq!(analysis.risk_score, score);
    }

    #[test]
    fn objects_without_analysis_keys_ignored(key in "[a-z]{1,10}", value in 0i64..1000) {
        let reply = format!("{{\"{}\": {}}}", key, value);
        prop_assert!(extract_analysis_object(&reply).is_none());
    }
}

// Property: fallback scores depend only on status and age
proptest! {
    #[test]
    fn inactive_always_scores_75(
        status in "(dissolved|liquidation|administration|receivership|closed)",
        age_days in 0i64..40_000
    ) {
        let created = today() - Duration::days(age_days);
        let analysis = fallback_analysis(&profile(&status, created), today());
        prop_assert_eq!(analysis.risk_score, 75);
        prop_assert_eq!(analysis.risk_factors.len(), 1);
    }

    #[test]
    fn active_scores_by_age(age_days in 0i64..40_000) {
        let created = today() - Duration::days(age_days);
        let analysis = fallback_analysis(&profile("active", created), today());
        prop_assert!(analysis.risk_factors.is_empty());
        if age_days >= 3 * 366 {
            prop_assert_eq!(analysis.risk_score, 25);
        } else if age_days < 3 * 365 {
            prop_assert_eq!(analysis.risk_score, 45);
        } else {
            prop_assert!(analysis.risk_score == 25 || analysis.risk_score == 45);
        }
    }
}
