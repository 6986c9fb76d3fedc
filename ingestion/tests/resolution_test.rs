use ingestion::{validate_json, EdgeExtractor, EntityResolver, MappingError};
use sociogram_core::config::AppConfig;
use sociogram_core::model::EntityId;
use sociogram_core::table::RawTable;

fn nominations(rows: &[(&str, &str)]) -> RawTable {
    RawTable::from_records(
        rows.iter()
            .map(|(from, nominates)| vec![("From", *from), ("Nominates", *nominates)]),
    )
    .unwrap()
}

const MAPPING: &str = r#"{"from_column": "From", "to_columns": ["Nominates"]}"#;

#[test]
fn test_kim_lee_park_scenario() {
    let table = nominations(&[("Kim", "Lee, Park"), ("Lee", "Kim")]);
    let mapping = validate_json(&table, MAPPING).unwrap();

    let roster = EntityResolver::default().resolve(&table, &mapping);
    assert_eq!(roster.names(), vec!["Kim", "Lee", "Park"]);

    let extraction = EdgeExtractor::default().extract(&table, &mapping, &roster);
    let edges: Vec<(&str, &str, f64)> = extraction
        .edges
        .iter()
        .map(|e| {
            (
                roster.name(e.from).unwrap(),
                roster.name(e.to).unwrap(),
                e.weight,
            )
        })
        .collect();
    assert_eq!(
        edges,
        vec![("Kim", "Lee", 1.0), ("Kim", "Park", 1.0), ("Lee", "Kim", 1.0)]
    );
    assert!(extraction.is_clean());
}

#[test]
fn test_case_and_trailing_space_resolve_to_one_student() {
    let table = nominations(&[("Kim", "Lee"), ("kim ", "Lee"), ("Lee", "")]);
    let mapping = validate_json(&table, MAPPING).unwrap();

    let roster = EntityResolver::default().resolve(&table, &mapping);

    assert_eq!(roster.len(), 2);
    assert_eq!(roster.resolve("Kim"), roster.resolve("kim "));
    assert_eq!(roster.resolve_entity("kim ").unwrap().name, "Kim");
}

#[test]
fn test_many_weight_only_drops_that_edge() {
    let table = RawTable::from_records(vec![
        vec![("From", "Kim"), ("Nominates", "Lee"), ("Strength", "many")],
        vec![("From", "Lee"), ("Nominates", "Kim"), ("Strength", "2")],
        vec![("From", "Park"), ("Nominates", "Kim"), ("Strength", "")],
    ])
    .unwrap();
    let mapping = validate_json(
        &table,
        r#"{"from_column": "From", "to_columns": ["Nominates"], "weight_column": "Strength"}"#,
    )
    .unwrap();
    let roster = EntityResolver::default().resolve(&table, &mapping);

    let extraction = EdgeExtractor::default().extract(&table, &mapping, &roster);

    assert_eq!(extraction.weight_errors.len(), 1);
    let error = &extraction.weight_errors[0];
    assert_eq!((error.row, error.value.as_str()), (0, "many"));
    assert_eq!(error.column, "Strength");
    let weights: Vec<f64> = extraction.edges.iter().map(|e| e.weight).collect();
    assert_eq!(weights, vec![2.0, 1.0]);

    let json = serde_json::to_value(&extraction).unwrap();
    assert_eq!(json["weight_errors"][0]["value"], "many");
}

#[test]
fn test_every_row_is_resolved_or_reported() {
    let table = nominations(&[
        ("Kim", "Lee"),
        ("", "Kim"),
        ("  ", "Kim"),
        ("Lee", "Kim, Choi"),
        ("Mr.", "Lee"),
    ]);
    let mapping = validate_json(&table, MAPPING).unwrap();
    let roster = EntityResolver::default().resolve(&table, &mapping);
    let extraction = EdgeExtractor::default().extract(&table, &mapping, &roster);

    let unresolved: Vec<usize> = extraction.unresolved_rows.iter().map(|r| r.row).collect();
    for row in 0..table.row_count() {
        let from = table.cell(row, "From").unwrap();
        let resolved = roster.resolve(from).is_some();
        assert_ne!(resolved, unresolved.contains(&row), "row {row}");
    }
    assert_eq!(unresolved, vec![1, 2, 4]);
}

#[test]
fn test_resolution_is_idempotent() {
    let table = nominations(&[
        ("Kim Minsu", "Lee Jiwoo, Park"),
        ("kim minsu", "Jiwoo Lee"),
        ("Lee Jiwoo", "Kim Min-su"),
        ("Park", "Lee Ji-woo, Kim Minsu"),
    ]);
    let mapping = validate_json(&table, MAPPING).unwrap();
    let resolver = EntityResolver::default();

    let first = resolver.resolve(&table, &mapping);
    let second = resolver.resolve(&table, &mapping);

    assert_eq!(first.entities(), second.entities());
    assert_eq!(first.names(), vec!["Kim Minsu", "Lee Jiwoo", "Park"]);
    for entity in first.entities() {
        for alias in &entity.aliases {
            assert_eq!(second.resolve(alias), Some(entity.id));
        }
        assert_eq!(first.resolve(&entity.name), Some(entity.id));
    }
}

#[test]
fn test_declared_students_and_config_threshold() {
    let config = AppConfig::from_toml_str(
        r#"
        [analysis]
        similarity_threshold = 1.0
        "#,
    )
    .unwrap();
    let table = nominations(&[("Kim Minsu", "Kim Min-su")]);
    let mapping = validate_json(
        &table,
        r#"{"relations": [{"from": "From", "to": "Nominates"}], "students": ["Choi"]}"#,
    )
    .unwrap();

    let roster = EntityResolver::from_config(&config.analysis).resolve(&table, &mapping);

    assert_eq!(roster.names(), vec!["Choi", "Kim Min-su", "Kim Minsu"]);
    assert_eq!(roster.resolve("Choi"), Some(EntityId(0)));
}

#[test]
fn test_unknown_columns_are_rejected_before_resolution() {
    let table = nominations(&[("Kim", "Lee")]);
    let err = validate_json(&table, r#"{"from_column": "Name", "to_columns": ["Nominates"]}"#)
        .unwrap_err();
    assert!(matches!(err, MappingError::SchemaMismatch(ref v) if v.len() == 1));
}
