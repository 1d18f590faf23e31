//! Integration tests for cadence-core
//!
//! These tests exercise the full load → detect → project workflow.

use chrono::NaiveDate;

use cadence_core::{
    db::Database,
    detect::DetectionEngine,
    feed::parse_feed,
    models::{ConfidenceBand, Frequency, OverrideKind, PatternKind},
    projector,
    registry::MerchantRegistry,
};

/// Feed with 3 obvious monthly subscriptions (Netflix, Spotify, Hulu):
/// consistent amounts, ~30-day intervals, 4 transactions each.
fn subscription_feed() -> &'static str {
    r#"id,date,description,merchant,amount,type,category
n1,2023-07-15,NETFLIX.COM,,-15.49,expense,Entertainment
n2,2023-08-15,NETFLIX.COM,,-15.49,expense,Entertainment
n3,2023-09-15,NETFLIX.COM,,-15.49,expense,Entertainment
n4,2023-10-15,NETFLIX.COM,,-15.49,expense,Entertainment
s1,2023-07-20,SPOTIFY USA,,-10.99,expense,Entertainment
s2,2023-08-20,SPOTIFY USA,,-10.99,expense,Entertainment
s3,2023-09-20,SPOTIFY USA,,-10.99,expense,Entertainment
s4,2023-10-20,SPOTIFY USA,,-10.99,expense,Entertainment
h1,2023-07-01,HULU,,-17.99,expense,Entertainment
h2,2023-08-01,HULU,,-17.99,expense,Entertainment
h3,2023-09-01,HULU,,-17.99,expense,Entertainment
h4,2023-10-01,HULU,,-17.99,expense,Entertainment"#
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_full_load_workflow() {
    let db = Database::in_memory().expect("Failed to create test database");

    let feed = parse_feed(subscription_feed().as_bytes()).expect("Failed to parse feed");
    assert_eq!(feed.transactions.len(), 12);
    assert!(feed.skipped.is_empty());

    let result = db.insert_transactions(&feed.transactions).unwrap();
    assert_eq!(result.inserted, 12);

    // Re-loading the same file is a no-op
    let result = db.insert_transactions(&feed.transactions).unwrap();
    assert_eq!(result.inserted, 0);
    assert_eq!(result.duplicates, 12);
    assert_eq!(db.count_transactions().unwrap(), 12);
}

#[test]
fn test_detection_over_stored_transactions() {
    let db = Database::in_memory().unwrap();
    let feed = parse_feed(subscription_feed().as_bytes()).unwrap();
    db.insert_transactions(&feed.transactions).unwrap();

    let engine = DetectionEngine::new();
    let transactions = db.list_transactions().unwrap();
    let registry = db.load_registry().unwrap();
    let overrides = db.list_overrides().unwrap();
    let run = engine.run(&transactions, &registry, &overrides);

    assert_eq!(run.patterns.len(), 3);

    let netflix = run
        .patterns
        .iter()
        .find(|p| p.normalized_key.contains("netflix"))
        .expect("Netflix pattern not detected");
    assert_eq!(netflix.frequency, Some(Frequency::Monthly));
    assert_eq!(netflix.occurrences, 4);
    assert_eq!(netflix.confidence_band(), ConfidenceBand::High);
    assert_eq!(netflix.next_due_date, Some(date(2023, 11, 15)));

    db.replace_detected_patterns(&run.patterns).unwrap();
    assert_eq!(db.list_patterns().unwrap().len(), 3);
}

#[test]
fn test_detection_is_deterministic() {
    let feed = parse_feed(subscription_feed().as_bytes()).unwrap();
    let engine = DetectionEngine::new();

    let a = engine.run(&feed.transactions, &MerchantRegistry::empty(), &[]);
    let b = engine.run(&feed.transactions, &MerchantRegistry::empty(), &[]);

    assert_eq!(
        serde_json::to_string(&a.patterns).unwrap(),
        serde_json::to_string(&b.patterns).unwrap()
    );
}

#[test]
fn test_two_charge_merchant_detected() {
    // A merchant seen exactly twice, ~30 days apart, same amount
    let feed = "id,date,description,merchant,amount,type,category\n\
                a,2024-01-15,NETFLIX.COM 2024-01-15,,-15.49,expense,\n\
                b,2024-02-14,NETFLIX.COM *1234,,-15.49,expense,\n";
    let feed = parse_feed(feed.as_bytes()).unwrap();

    let engine = DetectionEngine::new();
    let run = engine.run(&feed.transactions, &MerchantRegistry::empty(), &[]);

    assert_eq!(run.patterns.len(), 1);
    let p = &run.patterns[0];
    // Date fragments and card suffixes normalize away
    assert_eq!(p.normalized_key, "netflix.com");
    assert_eq!(p.frequency, Some(Frequency::Monthly));
    assert_eq!(p.confidence_band(), ConfidenceBand::High);
    // Next due 30 days after the second charge, 90 after the first
    assert_eq!(p.next_due_date, Some(date(2024, 3, 14)));
}

#[test]
fn test_single_charge_is_not_a_pattern() {
    let feed = "id,date,description,merchant,amount,type,category\n\
                a,2024-01-15,ONE TIME STORE,,-42.00,expense,\n";
    let feed = parse_feed(feed.as_bytes()).unwrap();

    let engine = DetectionEngine::new();
    let run = engine.run(&feed.transactions, &MerchantRegistry::empty(), &[]);
    assert!(run.patterns.is_empty());
}

#[test]
fn test_irregular_amounts_lower_confidence() {
    // Same cadence, wildly different amounts
    let regular = "id,date,description,merchant,amount,type,category\n\
                   a,2024-01-01,ACME SUB,,-20.00,expense,\n\
                   b,2024-02-01,ACME SUB,,-20.00,expense,\n\
                   c,2024-03-01,ACME SUB,,-20.00,expense,\n";
    let irregular = "id,date,description,merchant,amount,type,category\n\
                     a,2024-01-01,ACME SHOP,,-20.00,expense,\n\
                     b,2024-02-01,ACME SHOP,,-95.00,expense,\n\
                     c,2024-03-01,ACME SHOP,,-14.00,expense,\n";

    let engine = DetectionEngine::new();
    let run_regular = engine.run(
        &parse_feed(regular.as_bytes()).unwrap().transactions,
        &MerchantRegistry::empty(),
        &[],
    );
    let run_irregular = engine.run(
        &parse_feed(irregular.as_bytes()).unwrap().transactions,
        &MerchantRegistry::empty(),
        &[],
    );

    assert!(run_regular.patterns[0].confidence > run_irregular.patterns[0].confidence);
    assert!(run_irregular.patterns[0].mixed_pattern);
}

#[test]
fn test_mixed_merchant_flagged_not_billed() {
    let feed = "id,date,description,merchant,amount,type,category\n\
                a1,2024-01-03,AMAZON.COM,,-12.99,expense,Shopping\n\
                a2,2024-01-16,AMAZON.COM,,-87.50,expense,Shopping\n\
                a3,2024-02-01,AMAZON.COM,,-12.99,expense,Shopping\n\
                a4,2024-02-27,AMAZON.COM,,-200.00,expense,Shopping\n";
    let feed = parse_feed(feed.as_bytes()).unwrap();

    let engine = DetectionEngine::new();
    let run = engine.run(&feed.transactions, &MerchantRegistry::empty(), &[]);

    assert_eq!(run.patterns.len(), 1);
    let p = &run.patterns[0];
    assert!(p.mixed_pattern);
    assert_eq!(p.kind, PatternKind::Excluded);
    assert_ne!(p.confidence_band(), ConfidenceBand::High);
}

#[test]
fn test_exclusion_override_suppresses_bills() {
    let db = Database::in_memory().unwrap();
    let feed = parse_feed(subscription_feed().as_bytes()).unwrap();
    db.insert_transactions(&feed.transactions).unwrap();
    db.add_override(OverrideKind::ExcludeFromBills, "netflix.com", None)
        .unwrap();

    let engine = DetectionEngine::new();
    let run = engine.run(
        &db.list_transactions().unwrap(),
        &db.load_registry().unwrap(),
        &db.list_overrides().unwrap(),
    );

    let netflix = run
        .patterns
        .iter()
        .find(|p| p.normalized_key.contains("netflix"))
        .unwrap();
    assert!(netflix.exclude_from_bills);

    // The pattern still exists with a projection; it just never surfaces
    assert!(netflix.next_due_date.is_some());
    let due = projector::upcoming(&run.patterns, date(2023, 11, 14), 7);
    assert!(due.iter().all(|p| !p.normalized_key.contains("netflix")));
    assert!(due.iter().any(|p| p.normalized_key.contains("spotify")));
}

#[test]
fn test_upcoming_bills_window() {
    let feed = parse_feed(subscription_feed().as_bytes()).unwrap();
    let engine = DetectionEngine::new();
    let run = engine.run(&feed.transactions, &MerchantRegistry::empty(), &[]);

    // Due dates: hulu 11-01, netflix 11-15, spotify 11-20
    let due = projector::upcoming(&run.patterns, date(2023, 11, 1), 7);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].normalized_key, "hulu");

    let due = projector::upcoming(&run.patterns, date(2023, 11, 1), 30);
    assert_eq!(due.len(), 3);
    // Sorted soonest first
    assert!(due[0].next_due_date <= due[1].next_due_date);
    assert!(due[1].next_due_date <= due[2].next_due_date);

    // Every surfaced due date sits inside the window and after the last charge
    for p in &due {
        let d = p.next_due_date.unwrap();
        assert!(d >= date(2023, 11, 1) && d <= date(2023, 12, 1));
        assert!(d > p.last_transaction_date);
    }
}

#[test]
fn test_registry_entry_boosts_and_classifies() {
    let db = Database::in_memory().unwrap();
    db.add_registry_entry(&cadence_core::NewRegistryEntry {
        merchant_name: "City Water".to_string(),
        category: Some("Utilities".to_string()),
        kind: PatternKind::Utility,
        patterns: vec!["city water".to_string()],
        confidence: Some(0.95),
        logo_url: None,
    })
    .unwrap();

    let feed = "id,date,description,merchant,amount,type,category\n\
                w1,2024-01-05,CITY WATER 555123,,-60.12,expense,\n\
                w2,2024-02-05,CITY WATER 555124,,-58.40,expense,\n";
    let feed = parse_feed(feed.as_bytes()).unwrap();

    let engine = DetectionEngine::new();
    let run = engine.run(&feed.transactions, &db.load_registry().unwrap(), &[]);

    assert_eq!(run.patterns.len(), 1);
    let p = &run.patterns[0];
    assert_eq!(p.kind, PatternKind::Utility);
    assert_eq!(p.category.as_deref(), Some("Utilities"));
    assert!(p.confidence >= 0.95);
}

#[test]
fn test_registry_bulk_import_end_to_end() {
    let db = Database::in_memory().unwrap();

    let input = "Netflix|Entertainment|subscription|monthly|active|0.95\n\
                 netflix|Entertainment|subscription|monthly|active|0.95\n";
    let entries = cadence_core::parse_bulk_import(input.as_bytes()).unwrap();
    let result = db.bulk_add_registry_entries(&entries).unwrap();

    assert_eq!(result.added, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(db.list_registry_entries().unwrap().len(), 1);
}

#[test]
fn test_fuzzy_variants_group_together() {
    let feed = "id,date,description,merchant,amount,type,category\n\
                a,2024-01-02,SPOTIFY USA,,-10.99,expense,\n\
                b,2024-02-02,SPOTIFY USA,,-10.99,expense,\n\
                c,2024-03-02,SPOTIFY USAA,,-10.99,expense,\n";
    let feed = parse_feed(feed.as_bytes()).unwrap();

    let engine = DetectionEngine::new();
    let run = engine.run(&feed.transactions, &MerchantRegistry::empty(), &[]);

    assert_eq!(run.patterns.len(), 1);
    assert_eq!(run.patterns[0].occurrences, 3);
}
