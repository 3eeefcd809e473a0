//! Catalog, assistant and route guard over the authorized client.

mod common;

use client::{
    ClientError, GREETING, GuardOutcome, GuardSink, LOGIN_PATH, MemoryCredentialStore,
    PersistedSession,
};
use common::{EMAIL, FakeBackend, PASSWORD, RecordingNavigator};
use reqwest::StatusCode;
use shared::models::{CarUpdate, ChatRole, NewCar, Page};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Recorder {
    seen: Vec<String>,
}

impl GuardSink for Recorder {
    fn fallback(&mut self, placeholder: &str) {
        self.seen.push(format!("fallback:{placeholder}"));
    }

    fn children(&mut self) {
        self.seen.push("children".to_string());
    }
}

#[tokio::test]
async fn test_car_crud() {
    let backend = FakeBackend::start().await;
    let context = backend.context(Arc::new(MemoryCredentialStore::new()));
    context.session().login(EMAIL, PASSWORD).await.unwrap();
    let cars = context.cars();

    let created = cars
        .create(&NewCar {
            make: "Honda".to_string(),
            model: "Civic".to_string(),
            year: 2021,
            price: Some(21_500.0),
            description: Some("Compact sedan".to_string()),
            features: vec!["heated seats".to_string()],
        })
        .await
        .unwrap();
    assert_eq!(cars.get(created.id).await.unwrap(), created);
    assert_eq!(cars.list(Page::default()).await.unwrap().len(), 1);

    let updated = cars
        .update(
            created.id,
            &CarUpdate {
                year: Some(2022),
                ..CarUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.year, 2022);
    assert_eq!(updated.model, "Civic");

    cars.delete(created.id).await.unwrap();
    let err = cars.get(created.id).await.unwrap_err();
    assert!(matches!(
        &err,
        ClientError::Rejected { status, .. } if *status == StatusCode::NOT_FOUND
    ));
    assert_eq!(err.to_string(), "Car not found");
    assert!(context.session().is_authenticated());
}

#[tokio::test]
async fn test_catalog_paging() {
    let backend = FakeBackend::start().await;
    for year in 2015..2020 {
        backend.state.seed_car("Toyota", "Corolla", year);
    }
    let context = backend.context(Arc::new(MemoryCredentialStore::new()));
    context.session().login(EMAIL, PASSWORD).await.unwrap();
    let cars = context.cars();

    assert_eq!(cars.list(Page::default()).await.unwrap().len(), 5);
    let window = cars.list(Page::new(1, 2)).await.unwrap();
    let years: Vec<i32> = window.iter().map(|car| car.year).collect();
    assert_eq!(years, vec![2016, 2017]);
    assert!(cars.list(Page::new(10, 2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_search() {
    let backend = FakeBackend::start().await;
    backend.state.seed_car("Toyota", "Land Cruiser", 2020);
    backend.state.seed_car("Toyota", "Corolla", 2019);
    backend.state.seed_car("Ford", "Focus", 2018);
    let context = backend.context(Arc::new(MemoryCredentialStore::new()));
    context.session().login(EMAIL, PASSWORD).await.unwrap();
    let cars = context.cars();

    let found = cars.search("toyota", Page::default()).await.unwrap();
    assert_eq!(found.len(), 2);
    let found = cars.search("land cruiser", Page::default()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].model, "Land Cruiser");
    let found = cars.search("toyota", Page::new(1, 10)).await.unwrap();
    assert_eq!(found.len(), 1);
    assert!(cars.search("tesla", Page::default()).await.unwrap().is_empty());

    let err = cars.search("  ", Page::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));
}

#[tokio::test]
async fn test_empty_car_update_is_refused_locally() {
    let backend = FakeBackend::start().await;
    let context = backend.context(Arc::new(MemoryCredentialStore::new()));

    let err = context
        .cars()
        .update(1, &CarUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));
}

#[tokio::test]
async fn test_chat_appends_reply() {
    let backend = FakeBackend::start().await;
    let context = backend.context(Arc::new(MemoryCredentialStore::new()));
    context.session().login(EMAIL, PASSWORD).await.unwrap();
    let mut chat = context.chat();

    let reply = chat.send("family SUV under 30k?").await.unwrap();
    assert_eq!(reply.role, ChatRole::Assistant);
    assert_eq!(reply.content, "You asked about: family SUV under 30k?");

    let transcript = chat.messages();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[0].content, GREETING);
    assert_eq!(transcript[1].role, ChatRole::User);
    assert!(chat.error().is_none());

    chat.reset();
    assert_eq!(chat.messages().len(), 1);
}

#[tokio::test]
async fn test_chat_continues_server_conversation() {
    let backend = FakeBackend::start().await;
    let context = backend.context(Arc::new(MemoryCredentialStore::new()));
    context.session().login(EMAIL, PASSWORD).await.unwrap();
    let mut chat = context.chat();

    chat.send("first question").await.unwrap();
    let id = chat.session_id().unwrap();
    chat.send("second question").await.unwrap();
    assert_eq!(chat.session_id(), Some(id));

    let sessions = chat.sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, id);
    assert_eq!(sessions[0].title.as_deref(), Some("first question"));

    chat.reset();
    assert!(chat.session_id().is_none());
    chat.send("fresh start").await.unwrap();
    assert_ne!(chat.session_id(), Some(id));
    assert_eq!(chat.sessions().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_chat_resume_loads_history() {
    let backend = FakeBackend::start().await;
    let id = backend.state.seed_conversation(
        EMAIL,
        "Commuter cars",
        &[("cheap commuter?", "Try a Civic.")],
    );
    let context = backend.context(Arc::new(MemoryCredentialStore::new()));
    context.session().login(EMAIL, PASSWORD).await.unwrap();
    let mut chat = context.chat();

    chat.resume(id).await.unwrap();
    assert_eq!(chat.session_id(), Some(id));
    let contents: Vec<&str> = chat
        .messages()
        .iter()
        .map(|message| message.content.as_str())
        .collect();
    assert_eq!(contents, vec![GREETING, "cheap commuter?", "Try a Civic."]);
    assert_eq!(chat.messages()[1].role, ChatRole::User);

    chat.send("and used?").await.unwrap();
    assert_eq!(chat.session_id(), Some(id));
    assert_eq!(chat.messages().len(), 5);
}

#[tokio::test]
async fn test_chat_resume_unknown_session_keeps_transcript() {
    let backend = FakeBackend::start().await;
    let context = backend.context(Arc::new(MemoryCredentialStore::new()));
    context.session().login(EMAIL, PASSWORD).await.unwrap();
    let mut chat = context.chat();
    chat.send("hello").await.unwrap();
    let before = chat.messages().to_vec();
    let id = chat.session_id();

    let err = chat.resume(9_999).await.unwrap_err();
    assert!(matches!(
        &err,
        ClientError::Rejected { status, .. } if *status == StatusCode::NOT_FOUND
    ));
    assert_eq!(err.to_string(), "Session not found");
    assert_eq!(chat.messages(), before.as_slice());
    assert_eq!(chat.session_id(), id);
    assert!(context.session().is_authenticated());
}

#[tokio::test]
async fn test_chat_failure_keeps_user_message() {
    let backend = FakeBackend::start().await;
    let context = backend.context(Arc::new(MemoryCredentialStore::new()));
    context.session().login(EMAIL, PASSWORD).await.unwrap();
    let mut chat = context.chat();

    assert!(chat.send("fail").await.is_err());
    assert_eq!(chat.messages().len(), 2);
    assert_eq!(chat.messages()[1].content, "fail");
    assert_eq!(chat.error(), Some("Failed to send message"));
    assert!(context.session().is_authenticated());
}

#[tokio::test]
async fn test_guard_verifies_rehydrated_token() {
    let backend = FakeBackend::start().await;
    let bootstrap = backend.context(Arc::new(MemoryCredentialStore::new()));
    bootstrap.session().login(EMAIL, PASSWORD).await.unwrap();
    let token = bootstrap.session().credential().unwrap().token().to_string();

    let storage = Arc::new(MemoryCredentialStore::with_session(PersistedSession {
        token,
        user: None,
    }));
    let context = backend.context(storage);
    let navigator = Arc::new(RecordingNavigator::default());
    let mut sink = Recorder::default();

    let outcome = context.guard(navigator.clone()).mount(&mut sink).await;
    assert_eq!(outcome, GuardOutcome::Rendered);
    assert_eq!(sink.seen, vec!["fallback:Redirecting...", "children"]);
    assert!(navigator.visits().is_empty());
}

#[tokio::test]
async fn test_guard_redirects_stale_token() {
    let backend = FakeBackend::start().await;
    let storage = Arc::new(MemoryCredentialStore::with_session(PersistedSession {
        token: "forged".to_string(),
        user: None,
    }));
    let context = backend.context(storage.clone());
    let navigator = Arc::new(RecordingNavigator::default());
    let mut sink = Recorder::default();

    let outcome = context.guard(navigator.clone()).mount(&mut sink).await;
    assert_eq!(outcome, GuardOutcome::Redirected);
    assert_eq!(sink.seen, vec!["fallback:Redirecting..."]);
    assert_eq!(navigator.visits(), vec![LOGIN_PATH.to_string()]);
    assert!(storage.snapshot().is_none());
}
