use std::sync::Arc;
use tokio_test::assert_ok;
use std::time::Duration;
use vqa_llm::{
    AnswerClient, AnswerError, EndpointError, LLMConfig, RecordingSleeper, RetryPolicy,
    ScriptedEndpoint,
};

const KEY: &str = "sk-test0123456789abcdefghijklmnopqrstuvwxyz";

fn client(endpoint: Arc<ScriptedEndpoint>, sleeper: Arc<RecordingSleeper>) -> AnswerClient {
    AnswerClient::with_sleeper(endpoint, sleeper, LLMConfig::default())
}

async fn ask(client: &AnswerClient) -> Result<vqa_llm::Answer, AnswerError> {
    client
        .answer("what is this about", "[0:00] Hello", "Bread 101", 3.0, Some(KEY))
        .await
}

#[tokio::test]
async fn test_success_returns_answer_and_usage() {
    let endpoint = Arc::new(ScriptedEndpoint::new().reply("It is about bread."));
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = client(endpoint.clone(), sleeper.clone());

    let answer = assert_ok!(ask(&client).await);

    assert_eq!(answer.text, "It is about bread.");
    assert_eq!(answer.usage.map(|u| u.total_tokens), Some(120));
    assert_eq!(endpoint.request_count(), 1);
    assert!(sleeper.delays().is_empty());

    let request = &endpoint.requests()[0];
    assert_eq!(request.model, "gpt-4o");
    assert!(request.user_prompt.contains("[0:00] Hello"));
    assert!(request.system_prompt.contains("Bread 101"));
}

#[tokio::test]
async fn test_repeated_rate_limits_exhaust_retry_budget() {
    let endpoint = Arc::new(
        ScriptedEndpoint::new()
            .status(429, "slow down")
            .status(429, "slow down")
            .status(429, "still slow"),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = client(endpoint.clone(), sleeper.clone());

    let err = ask(&client).await.unwrap_err();

    match err {
        AnswerError::RateLimited { attempts, detail } => {
            assert_eq!(attempts, 3);
            assert_eq!(
                detail,
                "HTTP 429: slow down; HTTP 429: slow down; HTTP 429: still slow"
            );
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
    assert_eq!(endpoint.request_count(), 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let endpoint = Arc::new(
        ScriptedEndpoint::new()
            .push(Err(EndpointError::Status {
                status: 429,
                retry_after: Some(Duration::from_secs(1)),
                body: String::new(),
            }))
            .reply("Recovered"),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = client(endpoint.clone(), sleeper.clone());

    let answer = ask(&client).await.unwrap();

    assert_eq!(answer.text, "Recovered");
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn test_unauthorized_is_never_retried() {
    let endpoint = Arc::new(ScriptedEndpoint::new().status(401, "invalid api key"));
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = client(endpoint.clone(), sleeper.clone());

    let err = ask(&client).await.unwrap_err();

    assert!(matches!(err, AnswerError::AuthInvalid(_)));
    assert_eq!(endpoint.request_count(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_insufficient_quota_is_not_retried() {
    let endpoint = Arc::new(ScriptedEndpoint::new().status(
        429,
        r#"{"error":{"code":"insufficient_quota","message":"Check your billing"}}"#,
    ));
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = client(endpoint.clone(), sleeper.clone());

    let err = ask(&client).await.unwrap_err();

    assert_eq!(
        err,
        AnswerError::QuotaExceeded("HTTP 429: Check your billing".to_string())
    );
    assert_eq!(endpoint.request_count(), 1);
}

#[tokio::test]
async fn test_missing_model_falls_back_once() {
    let endpoint = Arc::new(
        ScriptedEndpoint::new()
            .status(404, "model not found")
            .reply("From fallback"),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = client(endpoint.clone(), sleeper.clone());

    let answer = ask(&client).await.unwrap();

    assert_eq!(answer.text, "From fallback");
    let models: Vec<String> = endpoint.requests().into_iter().map(|r| r.model).collect();
    assert_eq!(models, vec!["gpt-4o".to_string(), "gpt-3.5-turbo".to_string()]);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_fallback_model_failure_gives_up() {
    let endpoint = Arc::new(
        ScriptedEndpoint::new()
            .status(404, "model not found")
            .status(404, "model not found"),
    );
    let client = client(endpoint.clone(), Arc::new(RecordingSleeper::new()));

    let err = ask(&client).await.unwrap_err();

    assert!(matches!(err, AnswerError::Unknown(_)));
    assert_eq!(endpoint.request_count(), 2);
}

#[tokio::test]
async fn test_network_errors_retry_with_backoff() {
    let endpoint = Arc::new(
        ScriptedEndpoint::new()
            .push(Err(EndpointError::Transport("connection reset".to_string())))
            .reply("Back online"),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = client(endpoint.clone(), sleeper.clone());

    let answer = ask(&client).await.unwrap();

    assert_eq!(answer.text, "Back online");
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(2)]);
}

#[tokio::test]
async fn test_persistent_network_failure_surfaces_network_error() {
    let endpoint = Arc::new(
        ScriptedEndpoint::new()
            .push(Err(EndpointError::Transport("down".to_string())))
            .push(Err(EndpointError::Transport("down".to_string())))
            .push(Err(EndpointError::Transport("still down".to_string()))),
    );
    let client = client(endpoint.clone(), Arc::new(RecordingSleeper::new()));

    let err = ask(&client).await.unwrap_err();

    assert_eq!(err, AnswerError::Network("still down".to_string()));
    assert!(err.is_transient());
    assert_eq!(endpoint.request_count(), 3);
}

#[tokio::test]
async fn test_credentials_checked_before_network() {
    let endpoint = Arc::new(ScriptedEndpoint::new());
    let client = client(endpoint.clone(), Arc::new(RecordingSleeper::new()));

    let missing = client.answer("q", "ctx", "t", 0.0, None).await.unwrap_err();
    let malformed = client
        .answer("q", "ctx", "t", 0.0, Some("not-a-key"))
        .await
        .unwrap_err();

    assert_eq!(missing, AnswerError::CredentialMissing);
    assert!(matches!(malformed, AnswerError::MalformedCredential(_)));
    assert_eq!(endpoint.request_count(), 0);
}

#[tokio::test]
async fn test_custom_retry_ceiling() {
    let endpoint = Arc::new(
        ScriptedEndpoint::new()
            .status(429, "")
            .status(429, ""),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let config = LLMConfig::new().with_retry(RetryPolicy {
        max_retries: 1,
        ..RetryPolicy::default()
    });
    let client = AnswerClient::with_sleeper(endpoint.clone(), sleeper.clone(), config);

    let err = ask(&client).await.unwrap_err();

    assert!(matches!(err, AnswerError::RateLimited { attempts: 2, .. }));
    assert_eq!(sleeper.delays().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overall_deadline_bounds_real_backoff() {
    let endpoint = Arc::new(
        ScriptedEndpoint::new()
            .status(429, "")
            .status(429, "")
            .status(429, ""),
    );
    let config = LLMConfig::new().with_retry(RetryPolicy {
        max_retries: 2,
        base_delay_ms: 10_000,
        max_delay_ms: 60_000,
        deadline_seconds: 5,
    });
    let client = AnswerClient::new(endpoint.clone(), config);

    let err = ask(&client).await.unwrap_err();

    assert!(matches!(err, AnswerError::Network(ref m) if m.contains("deadline")));
    assert_eq!(endpoint.request_count(), 1);
}

#[tokio::test]
async fn test_verify_credential_accepts_working_key() {
    let endpoint = Arc::new(ScriptedEndpoint::new().check(Ok(())));
    let client = client(endpoint.clone(), Arc::new(RecordingSleeper::new()));

    assert_ok!(client.verify_credential(Some(KEY)).await);
    assert_eq!(endpoint.request_count(), 0);
}

#[tokio::test]
async fn test_verify_credential_classifies_rejections() {
    let rejection = |status: u16, body: &str| -> Result<(), EndpointError> {
        Err(EndpointError::Status {
            status,
            retry_after: None,
            body: body.to_string(),
        })
    };
    let endpoint = Arc::new(
        ScriptedEndpoint::new()
            .check(rejection(401, r#"{"error":{"message":"Incorrect API key provided"}}"#))
            .check(rejection(429, "slow down"))
            .check(rejection(429, r#"{"error":{"code":"insufficient_quota","message":"billing"}}"#))
            .check(Err(EndpointError::Transport("dns failure".to_string()))),
    );
    let client = client(endpoint, Arc::new(RecordingSleeper::new()));

    assert_eq!(
        client.verify_credential(Some(KEY)).await.unwrap_err(),
        AnswerError::AuthInvalid("HTTP 401: Incorrect API key provided".to_string())
    );
    assert_eq!(
        client.verify_credential(Some(KEY)).await.unwrap_err(),
        AnswerError::RateLimited {
            attempts: 1,
            detail: "HTTP 429: slow down".to_string()
        }
    );
    assert!(matches!(
        client.verify_credential(Some(KEY)).await.unwrap_err(),
        AnswerError::QuotaExceeded(_)
    ));
    assert_eq!(
        client.verify_credential(Some(KEY)).await.unwrap_err(),
        AnswerError::Network("dns failure".to_string())
    );
}

#[tokio::test]
async fn test_verify_credential_checks_format_first() {
    let endpoint = Arc::new(ScriptedEndpoint::new().check(Err(EndpointError::Transport("unreachable".to_string()))));
    let client = client(endpoint, Arc::new(RecordingSleeper::new()));

    assert_eq!(
        client.verify_credential(None).await.unwrap_err(),
        AnswerError::CredentialMissing
    );
    assert!(matches!(
        client.verify_credential(Some("sk-short")).await.unwrap_err(),
        AnswerError::MalformedCredential(_)
    ));
    // the scripted failure was never consumed
    assert!(matches!(
        client.verify_credential(Some(KEY)).await.unwrap_err(),
        AnswerError::Network(_)
    ));
}
