use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{assistants, chat, health, telephony};

pub fn router(state: AppState) -> Router {
    let mut routes = Router::new().merge(assistants::router()).merge(chat::router());
    if state.telephony.is_some() {
        routes = routes.nest("/telephony", telephony::router());
    }

    let health_routes = health::router(state.db_pool.clone(), state.orchestrator.tracker().clone());
    routes.with_state(state).merge(health_routes).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tokio_util::task::TaskTracker;
    use tower::ServiceExt;

    use switchboard_agent::client::AssistantTool;
    use switchboard_agent::memory::{InMemoryAssistants, ScriptStep};
    use switchboard_agent::AssistantsApi;
    use switchboard_core::config::AppConfig;
    use switchboard_core::domain::correspondent::CorrespondentKey;
    use switchboard_db::{connect_with_settings, migrations};
    use switchboard_telephony::memory::InMemoryTelephony;
    use switchboard_telephony::TelephonyClient;

    use super::router;
    use crate::bootstrap::assemble_state;
    use crate::state::AppState;

    struct Harness {
        api: Arc<InMemoryAssistants>,
        telephony: Arc<InMemoryTelephony>,
        state: AppState,
        app: Router,
    }

    impl Harness {
        async fn new(telephony_enabled: bool) -> Self {
            let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
            migrations::run_pending(&pool).await.expect("migrations");

            let mut config = AppConfig::default();
            config.assistant.poll_interval_ms = 1;
            config.telephony.phone_number = Some("+15550000".to_string());

            let api = Arc::new(InMemoryAssistants::new());
            api.add_assistant("asst_helper", "Helper", vec![AssistantTool::function("webscrape")]).await;
            api.add_assistant("asst_text", "Text Responder", Vec::new()).await;
            let telephony = Arc::new(InMemoryTelephony::new());

            let state = assemble_state(
                &config,
                pool,
                api.clone() as Arc<dyn AssistantsApi>,
                telephony_enabled.then(|| telephony.clone() as Arc<dyn TelephonyClient>),
                TaskTracker::new(),
            )
            .expect("state");
            let app = router(state.clone());
            Self { api, telephony, state, app }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = self.app.clone().oneshot(request).await.expect("response");
            let status = response.status();
            let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
            (status, body.to_vec())
        }

        async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
            let (status, body) = self.send(request).await;
            (status, serde_json::from_slice(&body).expect("json body"))
        }

        async fn drain(&self) {
            self.state.orchestrator.tracker().close();
            self.state.orchestrator.tracker().wait().await;
        }
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn named_assistant_call_waits_for_reply() {
        let harness = Harness::new(false).await;
        harness.api.script_run(vec![ScriptStep::reply("hello from helper")]).await;

        let (status, body) =
            harness.json(post_json("/assistant/Helper", json!({"content": "hi"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "hello from helper");
        assert_eq!(body["statusCode"], 200);
        assert!(body["threadId"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn failed_run_status_is_mirrored_in_http_status() {
        let harness = Harness::new(false).await;
        harness
            .api
            .script_run(vec![ScriptStep::Fail {
                status: switchboard_core::domain::run::RunStatus::Failed,
                error: Some(json!({"code": "server_error"})),
            }])
            .await;

        let (status, body) =
            harness.json(post_json("/assistant/Helper", json!({"content": "hi"}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["response"], json!({"code": "server_error"}));
    }

    #[tokio::test]
    async fn unknown_assistant_name_is_not_found() {
        let harness = Harness::new(false).await;

        let (status, body) =
            harness.json(post_json("/assistant/Nobody", json!({"content": "hi"}))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Assistant 'Nobody' not found"}));
        assert!(harness.api.created_runs().await.is_empty());
    }

    #[tokio::test]
    async fn when_done_queues_the_run() {
        let harness = Harness::new(false).await;

        let (status, body) = harness
            .json(post_json("/assistant/Helper", json!({"content": "hi", "whenDone": "runAfter"})))
            .await;
        harness.drain().await;

        let thread_id = body["threadId"].as_str().expect("thread id").to_string();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], format!("Thread {thread_id} queued for execution"));

        let (status, _) = harness
            .json(post_json("/assistant/Helper", json!({"content": "hi", "whenDone": "nope"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn assistants_are_listed_with_tool_availability() {
        let harness = Harness::new(false).await;

        let (status, body) = harness.json(get("/assistants")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "Helper");
        assert_eq!(body[0]["tools"], json!([{"name": "webscrape", "enabled": true}]));
        assert_eq!(body[1]["name"], "Text Responder");
    }

    #[tokio::test]
    async fn assistant_listing_failure_returns_empty_list() {
        let harness = Harness::new(false).await;
        harness.api.fail_listing().await;

        let (status, body) = harness.json(get("/assistants")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"assistants": []}));
    }

    #[tokio::test]
    async fn chat_requires_content_and_assistant_id() {
        let harness = Harness::new(false).await;

        let (status, body) = harness.json(post_json("/chat", json!({"content": "hi"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Content and Assistant ID are required"}));

        let (status, body) = harness
            .json(post_json("/chat", json!({"content": "hi", "assistantId": "asst_helper"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "ok");
    }

    #[tokio::test]
    async fn upload_attaches_file_to_thread() {
        let harness = Harness::new(false).await;
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"assistantId\"\r\n\r\nasst_helper\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"threadId\"\r\n\r\nnull\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.md\"\r\n\
             Content-Type: text/markdown\r\n\r\n# notes\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .expect("request");

        let (status, body) = harness.json(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "file uploaded notes.md");
        assert_eq!(harness.api.uploaded_filenames().await, vec!["notes.md".to_string()]);
        assert!(harness.api.created_runs().await.is_empty());
    }

    #[tokio::test]
    async fn telephony_routes_are_absent_when_disabled() {
        let harness = Harness::new(false).await;
        let (status, _) = harness.send(post_form("/telephony/sms", "From=%2B1555&To=%2B1666")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_telephony_path_is_invalid_endpoint() {
        let harness = Harness::new(true).await;
        let (status, body) = harness.json(post_form("/telephony/fax", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Invalid endpoint"}));
    }

    #[tokio::test]
    async fn inbound_calls_are_screened_by_correspondent() {
        let harness = Harness::new(true).await;

        let (status, body) =
            harness.send(post_form("/telephony/in", "Direction=inbound&From=%2B1555")).await;
        assert_eq!(status, StatusCode::OK);
        let xml = String::from_utf8(body).expect("utf8");
        assert!(xml.contains("<Say>No access to this number. Goodbye.</Say><Hangup/>"));

        harness
            .json(post_json(
                "/telephony/adduser",
                json!({"name": "Ada", "phone": "+1555", "email": "ada@example.com"}),
            ))
            .await;
        let (_, body) =
            harness.send(post_form("/telephony/in", "Direction=inbound&From=%2B1555")).await;
        let xml = String::from_utf8(body).expect("utf8");
        assert!(xml.contains("<Say>Hi Ada, this is a bot. How can I help you today?</Say>"));
        assert!(xml.contains("recordingStatusCallback=\"/telephony/transcribe\""));

        let (status, body) = harness.json(post_form("/telephony/in", "Direction=outbound-api&Digits=hangup")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "response": "Call ended"}));

        let (status, body) = harness.json(post_form("/telephony/in", "From=%2B1555")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "No direction in payload"}));
    }

    #[tokio::test]
    async fn add_user_validates_and_rejects_duplicates() {
        let harness = Harness::new(true).await;
        let user = json!({"name": "Ada", "phone": "+1555", "email": "ada@example.com"});

        let (status, body) = harness.json(post_json("/telephony/adduser", user.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");
        assert_eq!(body["user"]["phone"], "+1555");

        let (status, body) = harness.json(post_json("/telephony/adduser", user)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "User already exists"}));

        let (status, body) =
            harness.json(post_json("/telephony/adduser", json!({"name": "Ada"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing required fields"}));
    }

    #[tokio::test]
    async fn sms_binds_one_thread_per_correspondent_and_replies() {
        let harness = Harness::new(true).await;
        harness.api.script_run(vec![ScriptStep::reply("first answer")]).await;
        harness.api.script_run(vec![ScriptStep::reply("second answer")]).await;

        let (status, body) = harness
            .json(post_form("/telephony/sms", "From=%2B1555&To=%2B15550000&Body=hello"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "response": "SMS received"}));

        let key = CorrespondentKey::new("+1555");
        let first = harness.state.directory.resolve(&key, chrono::Utc::now()).await.expect("resolve");

        harness.json(post_form("/telephony/sms", "From=%2B1555&To=%2B15550000&Body=again")).await;
        let second = harness.state.directory.resolve(&key, chrono::Utc::now()).await.expect("resolve");
        harness.drain().await;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(harness.api.threads().await.len(), 1);

        let mut bodies: Vec<String> =
            harness.telephony.sent().await.into_iter().map(|sms| sms.body).collect();
        bodies.sort();
        assert_eq!(bodies, vec!["first answer".to_string(), "second answer".to_string()]);
        assert!(harness.telephony.sent().await.iter().all(|sms| sms.to == "+1555"));
    }

    #[tokio::test]
    async fn sms_media_failures_are_skipped() {
        let harness = Harness::new(true).await;
        harness.telephony.add_media("https://media.test/0", vec![0xFF, 0xD8]).await;

        let (status, _) = harness
            .json(post_form(
                "/telephony/sms",
                "From=%2B1555&To=%2B15550000&Body=pics&NumMedia=2\
                 &MediaUrl0=https%3A%2F%2Fmedia.test%2F0&MediaContentType0=image%2Fjpeg\
                 &MediaUrl1=https%3A%2F%2Fmedia.test%2Fmissing&MediaContentType1=image%2Fpng",
            ))
            .await;
        harness.drain().await;

        assert_eq!(status, StatusCode::OK);
        let uploaded = harness.api.uploaded_filenames().await;
        assert_eq!(uploaded.len(), 1);
        assert!(uploaded[0].starts_with("media_") && uploaded[0].ends_with("_0.jpeg"));
    }

    #[tokio::test]
    async fn voicemail_transcript_is_answered_by_sms() {
        let harness = Harness::new(true).await;
        harness.telephony.add_call("CA1", "+1555").await;
        harness.telephony.add_media("https://rec.test/1", vec![1, 2, 3]).await;
        harness.api.set_transcript("call me back").await;
        harness.api.script_run(vec![ScriptStep::reply("calling soon")]).await;

        let (status, _) = harness
            .json(post_form("/telephony/transcribe", "RecordingUrl=https%3A%2F%2Frec.test%2F1&CallSid=CA1"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        harness
            .json(post_json(
                "/telephony/adduser",
                json!({"name": "Ada", "phone": "+1555", "email": "ada@example.com"}),
            ))
            .await;
        let (status, body) = harness
            .json(post_form("/telephony/transcribe", "RecordingUrl=https%3A%2F%2Frec.test%2F1&CallSid=CA1"))
            .await;
        harness.drain().await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "response": "Transcription received"}));
        let sent = harness.telephony.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "+1555");
        assert_eq!(sent[0].body, "calling soon");

        let bound = harness
            .state
            .directory
            .resolve(&CorrespondentKey::new("+1555"), chrono::Utc::now())
            .await
            .expect("resolve");
        assert!(bound.is_some());
    }

    #[tokio::test]
    async fn health_reports_ready_database() {
        let harness = Harness::new(false).await;
        let (status, body) = harness.json(get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"]["status"], "ready");
        assert_eq!(body["background_runs"], 0);
    }
}
