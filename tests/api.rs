//! HTTP surface served on an ephemeral port

mod common;

use boardgame_rag::config::Config;
use boardgame_rag::ingest::IngestQueue;
use boardgame_rag::meta::MetaDb;
use boardgame_rag::server::{router, AppState};
use boardgame_rag::store::MemoryIndex;
use common::*;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestServer {
    _dir: TempDir,
    base: String,
    config: Config,
    db: MetaDb,
    client: reqwest::Client,
    _queue: IngestQueue,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        tweak(&mut config);

        let db = MetaDb::new(&config.paths.db_file).await.unwrap();
        let (state, queue) = AppState::build(
            config.clone(),
            db.clone(),
            Arc::new(MemoryIndex::new(DIM)),
            Arc::new(FakeEmbedder::new()),
            Arc::new(StaticExtractor),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            _dir: dir,
            base: format!("http://{}", addr),
            config,
            db,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            _queue: queue,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base, path)
    }

    async fn upload(&self, bytes: Vec<u8>, filename: &str, mime: &str, extra: &[(&str, &str)]) -> reqwest::Response {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .unwrap();
        let mut form = Form::new().part("file", part);
        for (name, value) in extra {
            form = form.text(name.to_string(), value.to_string());
        }
        self.client
            .post(self.api("/rulebooks/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    fn uploaded_files(&self) -> Vec<String> {
        match std::fs::read_dir(&self.config.paths.upload_dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn rules_pdf() -> Vec<u8> {
    fake_pdf(&[
        "Setup. Each player takes a mat and five workers.",
        "Harvest. At the end of each round every field yields one grain.",
    ])
}

#[tokio::test]
async fn test_root_and_ping() {
    let server = TestServer::start().await;

    let root: Value = server.client.get(server.url("/")).send().await.unwrap().json().await.unwrap();
    assert_eq!(root, json!({"message": "Welcome to Boardgame RAG"}));

    let ping: Value = server.client.get(server.api("/ping")).send().await.unwrap().json().await.unwrap();
    assert_eq!(ping, json!({"ping": "pong"}));

    let health: Value = server.client.get(server.url("/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["index"]["backend"], "memory");
}

#[tokio::test]
async fn test_pdf_upload_is_accepted_and_processed() {
    let server = TestServer::start().await;
    let bytes = rules_pdf();

    let response = server.upload(bytes.clone(), "test_rulebook.pdf", "application/pdf", &[]).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["filename"], "test_rulebook.pdf");
    assert!(body["detail"].as_str().unwrap().contains("uploaded successfully"));
    assert_eq!(body["duplicate"], false);

    let stored = std::fs::read(server.config.paths.upload_dir.join("test_rulebook.pdf")).unwrap();
    assert_eq!(stored, bytes);

    let game_id = body["game_id"].as_i64().unwrap();
    let game = server.db.get_game(game_id).await.unwrap().unwrap();
    assert_eq!(game.title, "test_rulebook");

    let rulebook_id = body["rulebook_id"].as_i64().unwrap();
    let done = wait_for_terminal(&server.db, rulebook_id).await;
    assert_eq!(done.processing_status, "processed");

    let status: Value = server
        .client
        .get(server.api(&format!("/rulebooks/{}", rulebook_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["processing_status"], "processed");
    assert_eq!(status["page_count"], 2);
    assert_eq!(status["chunk_count"], 2);
    assert_eq!(status["error"], Value::Null);
}

#[tokio::test]
async fn test_text_upload_is_rejected() {
    let server = TestServer::start().await;

    let response = server
        .upload(b"house rules".to_vec(), "notes.txt", "text/plain", &[])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"detail": "Invalid file type. Only PDF files are accepted."})
    );

    assert!(server.uploaded_files().is_empty());
    assert!(server.db.list_all_rulebooks().await.unwrap().is_empty());
    assert!(server.db.list_games().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pdf_content_type_with_wrong_bytes_is_rejected() {
    let server = TestServer::start().await;

    let response = server
        .upload(b"not really a pdf".to_vec(), "fake.pdf", "application/pdf", &[])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.uploaded_files().is_empty());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let server = TestServer::start_with(|config| config.server.max_upload_bytes = 128).await;

    let filler = "y".repeat(512);
    let big = fake_pdf(&[filler.as_str()]);
    let response = server.upload(big, "big.pdf", "application/pdf", &[]).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(server.uploaded_files().is_empty());
}

#[tokio::test]
async fn test_duplicate_upload_reports_existing_rulebook() {
    let server = TestServer::start().await;

    let first: Value = server
        .upload(rules_pdf(), "farm.pdf", "application/pdf", &[("game_title", "Agricola")])
        .await
        .json()
        .await
        .unwrap();
    let game_id = first["game_id"].as_i64().unwrap().to_string();

    let second = server
        .upload(rules_pdf(), "farm-again.pdf", "application/pdf", &[("game_id", game_id.as_str())])
        .await;
    assert_eq!(second.status(), StatusCode::CREATED);

    let second: Value = second.json().await.unwrap();
    assert_eq!(second["duplicate"], true);
    assert_eq!(second["rulebook_id"], first["rulebook_id"]);
}

#[tokio::test]
async fn test_upload_to_unknown_game_is_not_found() {
    let server = TestServer::start().await;
    let response = server
        .upload(rules_pdf(), "farm.pdf", "application/pdf", &[("game_id", "777")])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ask_returns_citations_and_records_chat() {
    let server = TestServer::start().await;

    let upload: Value = server
        .upload(rules_pdf(), "farm.pdf", "application/pdf", &[("game_title", "Agricola")])
        .await
        .json()
        .await
        .unwrap();
    let game_id = upload["game_id"].as_i64().unwrap();
    wait_for_terminal(&server.db, upload["rulebook_id"].as_i64().unwrap()).await;

    let response = server
        .client
        .post(server.api(&format!("/games/{}/ask", game_id)))
        .json(&json!({
            "question": "Harvest. At the end of each round every field yields one grain.",
            "k": 1,
            "session_id": "session-1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["passages"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["answer_citations"],
        json!([{"rulebook_id": upload["rulebook_id"], "page": 2}])
    );

    let chat: Value = server
        .client
        .get(server.api("/chat/session-1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = chat["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["citations"][0]["page"], 2);
}

#[tokio::test]
async fn test_ask_on_empty_game_returns_no_passages() {
    let server = TestServer::start().await;

    let created = server
        .client
        .post(server.api("/games"))
        .json(&json!({"title": "Brass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let game: Value = created.json().await.unwrap();

    let body: Value = server
        .client
        .post(server.api(&format!("/games/{}/ask", game["game_id"])))
        .json(&json!({"question": "How do canals work?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["passages"], json!([]));
    assert_eq!(body["answer_citations"], json!([]));
}

#[tokio::test]
async fn test_missing_resources_are_404() {
    let server = TestServer::start().await;

    for path in ["/rulebooks/9", "/games/9", "/games/9/rulebooks"] {
        let response = server.client.get(server.api(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
        let body: Value = response.json().await.unwrap();
        assert!(body["detail"].is_string());
    }

    let ask = server
        .client
        .post(server.api("/games/9/ask"))
        .json(&json!({"question": "Anything?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(ask.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_users_and_submissions() {
    let server = TestServer::start().await;

    let user = server
        .client
        .post(server.api("/users"))
        .json(&json!({"username": "meeple", "email": "meeple@example.com", "password_hash": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(user.status(), StatusCode::CREATED);
    let user: Value = user.json().await.unwrap();
    assert!(user.get("password_hash").is_none());

    let duplicate = server
        .client
        .post(server.api("/users"))
        .json(&json!({"username": "meeple", "email": "meeple@example.com", "password_hash": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let submission = server
        .client
        .post(server.api("/submissions"))
        .json(&json!({"game_title": "Wingspan", "submitted_by_user_id": user["user_id"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(submission.status(), StatusCode::CREATED);

    let submissions: Value = server
        .client
        .get(server.api("/submissions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(submissions[0]["game_title"], "Wingspan");
    assert_eq!(submissions[0]["submission_status"], "Pending Review");
}

#[tokio::test]
async fn test_delete_rulebook_removes_it() {
    let server = TestServer::start().await;

    let upload: Value = server
        .upload(rules_pdf(), "farm.pdf", "application/pdf", &[])
        .await
        .json()
        .await
        .unwrap();
    let rulebook_id = upload["rulebook_id"].as_i64().unwrap();
    wait_for_terminal(&server.db, rulebook_id).await;

    let deleted = server
        .client
        .delete(server.api(&format!("/rulebooks/{}", rulebook_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = server
        .client
        .get(server.api(&format!("/rulebooks/{}", rulebook_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_storage_failure_is_500() {
    let server = TestServer::start_with(|config| {
        let blocker = config.paths.base_dir.join("uploads-file");
        std::fs::write(&blocker, b"occupied").unwrap();
        config.paths.upload_dir = blocker;
    })
    .await;

    let response = server
        .upload(rules_pdf(), "farm.pdf", "application/pdf", &[("game_title", "Agricola")])
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = response.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().starts_with("Could not save file"));
    assert!(server.db.list_games().await.unwrap().is_empty());
    assert!(server.db.list_all_rulebooks().await.unwrap().is_empty());
}
