//! End-to-end detection scenarios through the public service.

use adsift::security::{DuplicateSignal, RiskTier};
use adsift::config::DuplicateConfig;
use adsift::{Config, SpamDetectionService};
use std::time::{Duration, Instant};

const SCENARIO_A: &str = "تطلع اعذار الطبية الموثق ب التطبيق +966541904263";
const GREETING: &str = "مرحبا كيفك انت";

#[test]
fn advert_with_phone_is_spam() {
    let service = SpamDetectionService::default();
    let result = service.classify_message(SCENARIO_A, -1001, 42, 0.7);

    assert!(result.is_spam, "confidence {}", result.confidence);
    assert!(result.matched_terms.contains(&"اعذار".to_string()));
    assert!(result.matched_terms.contains(&"موثق*".to_string()));
    assert!(
        result.matched_terms.iter().any(|t| t == "phone:966541904263"),
        "terms {:?}",
        result.matched_terms
    );
    assert!(result.matched_terms.iter().filter(|t| !t.starts_with("phone:")).count() >= 4);
}

#[test]
fn long_order_number_is_not_a_phone() {
    let service = SpamDetectionService::default();
    let result = service.classify_message("رقم الطلب 123456789012345678901234567890", -1001, 43, 0.7);

    assert!(result.matched_terms.iter().all(|t| !t.starts_with("phone:")), "terms {:?}", result.matched_terms);
    assert_eq!(result.matched_terms, vec!["رقم"]);
    assert!(!result.is_spam, "confidence {}", result.confidence);
}

#[test]
fn greeting_is_clean_at_every_sensitivity() {
    let service = SpamDetectionService::default();
    for step in 1..=9 {
        let sensitivity = step as f32 / 10.0;
        let result = service.classify_message(GREETING, -1001, step, sensitivity);
        assert!(!result.is_spam, "flagged at {sensitivity}");
        assert!(result.confidence < 0.05);
        assert!(result.matched_terms.is_empty());
    }
}

#[test]
fn dotted_keyword_normalizes_and_scores_as_obfuscated() {
    let service = SpamDetectionService::default();
    assert_eq!(service.normalize("س.ك.ل.ي.ف"), "سكليف");

    let report = service.obfuscation_report("س.ك.ل.ي.ف");
    assert!(report.score > 0.3);

    let result = service.classify_message("س.ك.ل.ي.ف", -1001, 42, 0.7);
    assert!(result.obfuscation_score > 0.3);
    assert!(result.obfuscation_tags.iter().any(|t| t.name() == "dots"));
}

#[test]
fn duplicate_bonus_applies_inside_horizon_only() {
    let signal = DuplicateSignal::new(DuplicateConfig::default());
    let start = Instant::now();
    assert_eq!(signal.observe(-1001, 42, "سكليف معتمد", start), 0.0);
    assert_eq!(signal.observe(-1001, 42, "سكليف معتمد", start + Duration::from_secs(30)), 0.5);
    // both earlier entries have expired by now
    let later = start + Duration::from_secs(30 + 301);
    assert_eq!(signal.observe(-1001, 42, "سكليف معتمد", later), 0.0);
}

#[test]
fn duplicate_flag_through_service() {
    let service = SpamDetectionService::default();
    let start = Instant::now();
    let text = "سكليف معتمد";

    let first = service.classify_message_at(text, -1001, 42, 0.7, start);
    let second = service.classify_message_at(text, -1001, 42, 0.7, start + Duration::from_secs(5));
    let third = service.classify_message_at(text, -1001, 42, 0.7, start + Duration::from_secs(5 + 301));

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert!(!third.duplicate);
    assert!((third.confidence - first.confidence).abs() < 1e-6);
}

#[test]
fn advertiser_usernames_outrank_ordinary_ones() {
    let service = SpamDetectionService::default();
    let advert = service.classify_username("@سكليف_معتمد");
    let ordinary = service.classify_username("@khalid_99");

    assert!(advert.tier >= RiskTier::Suspicious, "{advert:?}");
    assert_eq!(ordinary.tier, RiskTier::Clear);
}

#[test]
fn configured_keywords_extend_the_table() {
    let config = Config::from_toml(
        r#"
        [[keywords]]
        term = "ت.خ.ف.ي.ض.ا.ت"
        weight = 0.8
        "#,
    )
    .unwrap();
    let service = SpamDetectionService::new(config);
    assert_eq!(service.keyword_weight("تخفيضات"), Some(0.8));
    assert!(service.classify_message("تخفيضات", 1, 1, 0.7).is_spam);
}

#[test]
fn tightened_config_changes_verdicts() {
    let config = Config::from_toml(
        r#"
        [detection]
        lexical_weight = 0.3
        "#,
    )
    .unwrap();
    let strict = SpamDetectionService::new(config);
    let default = SpamDetectionService::default();

    let text = "عندي سكليف";
    assert!(default.classify_message(text, 1, 1, 0.7).is_spam);
    assert!(!strict.classify_message(text, 1, 1, 0.7).is_spam);
}
