//! End-to-end command routing against a mocked generation backend

use copychain::cli::{Commands, ConfigCommands, GenerationArgs, RunContext};
use copychain::config::CopyChainConfig;
use copychain::error::ApiError;
use copychain::project::ProjectDocument;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::test_utils::sse_payload;

fn backend_config(server: &MockServer, token: Option<&str>) -> CopyChainConfig {
    let mut config = CopyChainConfig::default();
    config.gateway.endpoint = format!("{}/functions/v1/generate-copy", server.uri());
    config.session.token = token.map(str::to_string);
    config.session.token_env = "COPYCHAIN_TEST_UNSET_TOKEN".to_string();
    config.logging.color = false;
    config
}

fn stream_response(deltas: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(sse_payload(deltas))
}

fn options(project: &std::path::Path, input: Option<&str>) -> GenerationArgs {
    GenerationArgs {
        input: input.map(str::to_string),
        project: Some(project.to_path_buf()),
        ..GenerationArgs::default()
    }
}

#[tokio::test]
async fn generate_saves_result_to_project() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/generate-copy"))
        .and(header("authorization", "Bearer session-token"))
        .and(body_partial_json(serde_json::json!({
            "product_input": "Standing desk",
            "step": "avatar",
            "provider": "deepseek",
            "generation_context": { "language_code": "en", "tone_formality": "neutral" }
        })))
        .respond_with(stream_response(&["Remote ", "workers"]))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("desk.json");
    let ctx = RunContext::from_config(
        temp.path().to_path_buf(),
        backend_config(&server, Some("session-token")),
    );

    let output = ctx
        .execute(&Commands::Generate {
            step: "avatar".to_string(),
            continue_from: None,
            continue_saved: false,
            options: options(&project, Some("Standing desk")),
        })
        .await
        .unwrap();
    assert!(output.contains("desk.json"));

    let saved = ProjectDocument::load(&project).unwrap();
    assert_eq!(saved.product_input, "Standing desk");
    assert_eq!(
        saved.copy_results.get("avatar").map(String::as_str),
        Some("Remote workers")
    );
}

#[tokio::test]
async fn run_uses_saved_results_as_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "step": "usp",
            "previous_context": "## Customer Avatar\n\nSaved avatar"
        })))
        .respond_with(stream_response(&["USP"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(stream_response(&["more"]))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let project = temp.path().join("desk.json");
    let mut document = ProjectDocument::new("desk", "Standing desk");
    document
        .copy_results
        .insert("avatar".to_string(), "Saved avatar".to_string());
    document.save(&project).unwrap();

    let ctx = RunContext::from_config(
        temp.path().to_path_buf(),
        backend_config(&server, Some("session-token")),
    );
    let output = ctx
        .execute(&Commands::Run {
            from: Some("usp".to_string()),
            options: options(&project, None),
        })
        .await
        .unwrap();
    assert!(output.contains("usp"));

    let saved = ProjectDocument::load(&project).unwrap();
    assert_eq!(saved.copy_results.len(), 7);
    assert_eq!(saved.copy_results["avatar"], "Saved avatar");
    assert_eq!(saved.copy_results["usp"], "USP");
}

#[tokio::test]
async fn run_prints_every_step_in_catalog_order() {
    let server = MockServer::start().await;
    let steps = [
        ("avatar", "Customer Avatar"),
        ("usp", "Unique Selling Proposition"),
        ("offer", "Irresistible Offer"),
        ("sales_page", "Sales Page"),
        ("upsells", "Upsells"),
        ("vsl", "Video Sales Letter"),
        ("ads", "Ads"),
    ];
    for (step, _) in steps {
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "step": step })))
            .respond_with(stream_response(&["Copy for ", step]))
            .expect(1)
            .mount(&server)
            .await;
    }

    let temp = TempDir::new().unwrap();
    let ctx = RunContext::from_config(
        temp.path().to_path_buf(),
        backend_config(&server, Some("session-token")),
    );
    let (mut out, mut headings) = (Vec::new(), Vec::new());
    ctx.execute_to(
        &Commands::Run {
            from: None,
            options: GenerationArgs {
                input: Some("Standing desk".to_string()),
                ..GenerationArgs::default()
            },
        },
        &mut out,
        &mut headings,
    )
    .await
    .unwrap();

    let expected: String = steps
        .iter()
        .map(|(step, _)| format!("Copy for {}\n", step))
        .collect();
    assert_eq!(String::from_utf8(out).unwrap(), expected);

    let expected_headings: String = steps
        .iter()
        .map(|(_, label)| format!("== {} ==\n", label))
        .collect();
    assert_eq!(String::from_utf8(headings).unwrap(), expected_headings);
}

#[tokio::test]
async fn generate_prints_seed_and_continuation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "step": "offer",
            "continue_from": "Buy one,"
        })))
        .respond_with(stream_response(&[" get one free"]))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let ctx = RunContext::from_config(
        temp.path().to_path_buf(),
        backend_config(&server, Some("session-token")),
    );
    let (mut out, mut headings) = (Vec::new(), Vec::new());
    ctx.execute_to(
        &Commands::Generate {
            step: "offer".to_string(),
            continue_from: Some("Buy one,".to_string()),
            continue_saved: false,
            options: GenerationArgs {
                input: Some("Standing desk".to_string()),
                ..GenerationArgs::default()
            },
        },
        &mut out,
        &mut headings,
    )
    .await
    .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "Buy one, get one free\n");
    assert_eq!(String::from_utf8(headings).unwrap(), "== Irresistible Offer ==\n");
}

#[tokio::test]
async fn missing_credential_blocks_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(stream_response(&["never"]))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let ctx = RunContext::from_config(temp.path().to_path_buf(), backend_config(&server, None));
    let result = ctx
        .execute(&Commands::Generate {
            step: "avatar".to_string(),
            continue_from: None,
            continue_saved: false,
            options: GenerationArgs {
                input: Some("Standing desk".to_string()),
                ..GenerationArgs::default()
            },
        })
        .await;
    assert!(matches!(result, Err(ApiError::Unauthenticated)));
}

#[tokio::test]
async fn rejected_step_reports_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(402)
                .set_body_json(serde_json::json!({ "error": "No credits left" })),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let ctx = RunContext::from_config(
        temp.path().to_path_buf(),
        backend_config(&server, Some("session-token")),
    );
    let result = ctx
        .execute(&Commands::Generate {
            step: "offer".to_string(),
            continue_from: None,
            continue_saved: false,
            options: GenerationArgs {
                input: Some("Standing desk".to_string()),
                ..GenerationArgs::default()
            },
        })
        .await;
    match result {
        Err(ApiError::RequestRejected { status, message }) => {
            assert_eq!(status, 402);
            assert_eq!(message, "No credits left");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn unknown_step_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let ctx = RunContext::from_config(
        temp.path().to_path_buf(),
        backend_config(&server, Some("session-token")),
    );
    let result = ctx
        .execute(&Commands::Generate {
            step: "press_release".to_string(),
            continue_from: None,
            continue_saved: false,
            options: GenerationArgs {
                input: Some("Standing desk".to_string()),
                ..GenerationArgs::default()
            },
        })
        .await;
    assert!(matches!(result, Err(ApiError::UnknownStep(_))));
}

#[tokio::test]
async fn config_validate_reports_problems() {
    let mut config = CopyChainConfig::default();
    config.gateway.endpoint = String::new();
    let ctx = RunContext::from_config(std::path::PathBuf::from("."), config);
    let result = ctx
        .execute(&Commands::Config {
            command: ConfigCommands::Validate,
        })
        .await;
    assert!(matches!(result, Err(ApiError::ConfigError(ref msg)) if msg.contains("Gateway")));
}
