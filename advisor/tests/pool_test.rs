use advisor::{
    AiClient, Credential, CredentialPool, FailureKind, PoolError, PoolSettings, ScriptedReply,
    ScriptedTransport,
};
use sociogram_core::config::{AppConfig, CredentialsConfig};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn settings() -> PoolSettings {
    PoolSettings {
        cooldown: Duration::from_secs(300),
        auth_cooldown: Duration::from_secs(3600),
        max_consecutive_failures: 3,
    }
}

#[test]
fn test_pool_from_config_uses_configured_keys() {
    let config = CredentialsConfig {
        keys: vec!["alpha".to_string(), " beta ".to_string(), "".to_string()],
        seed: Some(3),
        ..Default::default()
    };
    let pool = CredentialPool::from_config(&config);

    assert_eq!(pool.len().unwrap(), 2);
    assert_eq!(pool.settings().cooldown, Duration::from_secs(60));
    let slots = pool.slots().unwrap();
    assert!(slots.iter().any(|s| s.credential == Credential::new("beta")));
}

#[test]
fn test_pool_survives_concurrent_acquire_and_report() {
    let pool = Arc::new(CredentialPool::new(
        (0..4).map(|i| Credential::new(format!("key-{i}"))),
        settings(),
        Some(11),
    ));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let pool = pool.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    if let Ok(credential) = pool.acquire() {
                        if worker % 2 == 0 {
                            pool.report_success(&credential).unwrap();
                        } else {
                            pool.report_failure(&credential, FailureKind::Transient)
                                .unwrap();
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(pool.len().unwrap(), 4);
    let slots = pool.slots().unwrap();
    assert!(slots
        .iter()
        .all(|s| s.consecutive_failures <= 3 || s.cooldown_until.is_some()));
}

#[test]
fn test_pool_exhaustion_after_every_key_hits_quota() {
    let pool = CredentialPool::new(
        ["a", "b", "c"].iter().map(Credential::new),
        settings(),
        Some(5),
    );

    for key in ["a", "b"] {
        pool.report_failure(&Credential::new(key), FailureKind::QuotaExceeded)
            .unwrap();
    }
    for _ in 0..20 {
        assert_eq!(pool.acquire().unwrap(), Credential::new("c"));
    }

    pool.report_failure(&Credential::new("c"), FailureKind::QuotaExceeded)
        .unwrap();
    assert!(matches!(
        pool.acquire(),
        Err(PoolError::Exhausted { size: 3, .. })
    ));
    assert_eq!(pool.available().unwrap(), 0);
}

#[tokio::test]
async fn test_client_from_config_proposes_mapping_through_pool() {
    let config = CredentialsConfig {
        keys: vec!["k1".to_string(), "k2".to_string()],
        max_attempts: 2,
        call_timeout_ms: 500,
        seed: Some(9),
        ..Default::default()
    };
    let transport = ScriptedTransport::new([
        ScriptedReply::Fail(FailureKind::AuthRejected),
        ScriptedReply::Reply(
            "```json\n{\"relations\": [{\"from\": \"Name\", \"to\": \"Friend\", \"type\": \"friendship\"}]}\n```"
                .to_string(),
        ),
    ]);
    let client = AiClient::from_config(&config, transport.clone());
    let table = sociogram_core::table::RawTable::from_records(vec![vec![
        ("Name", "Kim"),
        ("Friend", "Lee"),
    ]])
    .unwrap();

    let proposal = client.propose_mapping(&table).await.unwrap();

    assert_eq!(
        proposal.relations[0].relation_type_label.as_deref(),
        Some("friendship")
    );
    assert_eq!(client.pool().available().unwrap(), 1);
    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0], calls[1]);
}

#[tokio::test]
async fn test_client_from_app_config_limits_prompt_rows() {
    let config = AppConfig::from_toml_str(
        r#"
        [analysis]
        prompt_sample_rows = 1

        [credentials]
        keys = ["k1"]
        "#,
    )
    .unwrap();
    let transport = ScriptedTransport::replying(r#"{"from_column": "Name", "to_columns": ["Friend"]}"#);
    let client = AiClient::from_app_config(&config, transport.clone());
    let table = sociogram_core::table::RawTable::from_records(vec![
        vec![("Name", "Kim"), ("Friend", "Lee")],
        vec![("Name", "Zhang"), ("Friend", "Kim")],
    ])
    .unwrap();

    let proposal = client.propose_mapping(&table).await.unwrap();

    assert_eq!(proposal.relations.len(), 1);
    let prompts = transport.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Kim\tLee"));
    assert!(!prompts[0].contains("Zhang"));
}
