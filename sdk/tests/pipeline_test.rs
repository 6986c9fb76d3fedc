use advisor::{AiClient, Credential, CredentialPool, FailureKind, PoolSettings, ScriptedReply, ScriptedTransport};
use sociogram_core::config::AnalysisConfig;
use sociogram_core::error::{ErrorCode, SociogramError};
use sociogram_core::table::RawTable;
use sociogram_sdk::{AnalysisPipeline, PipelineError};
use std::sync::Arc;

fn survey() -> RawTable {
    RawTable::from_records(vec![
        vec![("Timestamp", "09:01"), ("Your name", "Kim Minsu"), ("Best friends", "Lee Jiwoo; Park")],
        vec![("Timestamp", "09:02"), ("Your name", "Lee Jiwoo"), ("Best friends", "Minsu")],
        vec![("Timestamp", "09:03"), ("Your name", "Park"), ("Best friends", "Kim Minsu")],
        vec![("Timestamp", "09:04"), ("Your name", "Choi"), ("Best friends", "")],
    ])
    .unwrap()
}

fn client(replies: Vec<ScriptedReply>, keys: &[&str]) -> (AiClient, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new(replies);
    let pool = Arc::new(CredentialPool::new(
        keys.iter().map(Credential::new),
        PoolSettings::default(),
        Some(1),
    ));
    (AiClient::new(pool, transport.clone()), transport)
}

const MAPPING_REPLY: &str = r#"Mapping:
{"relations": [{"from_column": "Your name", "to_columns": ["Best friends"], "relation_type_label": "friendship"}]}"#;

#[tokio::test]
async fn test_propose_and_run_with_alias_hints() {
    let (client, transport) = client(
        vec![
            ScriptedReply::Reply(MAPPING_REPLY.to_string()),
            ScriptedReply::Reply(r#"{"aliases": {"Kim Minsu": ["Minsu"]}}"#.to_string()),
        ],
        &["k1"],
    );
    let pipeline = AnalysisPipeline::new(AnalysisConfig {
        ai_alias_hints: true,
        ..Default::default()
    });

    let report = pipeline.propose_and_run(&client, &survey()).await.unwrap();

    assert_eq!(transport.calls().len(), 2);
    assert_eq!(report.roster.names(), vec!["Choi", "Kim Minsu", "Lee Jiwoo", "Park"]);
    assert_eq!(report.mapping.relations[0].relation_type, "friendship");

    let choi = report.roster.resolve("Choi").unwrap();
    assert_eq!(report.result.isolates, vec![choi]);
    let kim = report.roster.resolve("Minsu").unwrap();
    assert_eq!(report.roster.name(kim), Some("Kim Minsu"));
    assert_eq!(report.result.node(kim).unwrap().in_degree, 2.0 / 3.0);
}

#[tokio::test]
async fn test_alias_failure_falls_back_to_similarity() {
    let (client, _) = client(
        vec![
            ScriptedReply::Reply(MAPPING_REPLY.to_string()),
            ScriptedReply::Fail(FailureKind::Transient),
            ScriptedReply::Fail(FailureKind::Transient),
            ScriptedReply::Fail(FailureKind::Transient),
        ],
        &["k1", "k2", "k3"],
    );
    let pipeline = AnalysisPipeline::new(AnalysisConfig {
        ai_alias_hints: true,
        ..Default::default()
    });

    let report = pipeline.propose_and_run(&client, &survey()).await.unwrap();

    // Without the hint "Minsu" stays a separate student.
    assert_eq!(report.roster.len(), 5);
    assert!(report.mapping.alias_hints.is_empty());
}

#[tokio::test]
async fn test_exhausted_pool_surfaces_as_resource_exhausted() {
    let (client, _) = client(vec![ScriptedReply::Fail(FailureKind::QuotaExceeded)], &["only"]);

    let err = AnalysisPipeline::default()
        .propose_and_run(&client, &survey())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Ai(_)));
    assert_eq!(err.error_code(), ErrorCode::ResourceExhausted);
}

#[tokio::test]
async fn test_report_view_serializes() {
    let (client, _) = client(vec![ScriptedReply::Reply(MAPPING_REPLY.to_string())], &["k1"]);

    let report = AnalysisPipeline::default()
        .propose_and_run(&client, &survey())
        .await
        .unwrap();
    let json = serde_json::to_value(report.view()).unwrap();

    assert_eq!(json["directed"], true);
    assert_eq!(json["nodes"].as_array().unwrap().len(), 5);
    assert_eq!(json["summary"]["isolate_count"], 1);
}
