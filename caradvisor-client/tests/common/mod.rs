//! In-process fake of the CarAdvisor backend.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use client::{AppContext, CredentialStore, Navigator};
use serde_json::json;
use shared::{
    config::Config,
    models::{
        Car, CarUpdate, ChatReply, ChatRequest, ChatRole, ChatSessionSummary, LoginRequest,
        NewCar, Page, ProfileUpdateRequest, RegisterRequest, StoredChatMessage, UserId,
        UserRecord,
    },
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    },
};
use tokio::{net::TcpListener, sync::Notify, task::JoinHandle};
use url::Url;

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "secret1";

#[derive(Debug)]
struct Conversation {
    owner: String,
    summary: ChatSessionSummary,
    messages: Vec<StoredChatMessage>,
}

#[derive(Debug, Default)]
pub struct BackendState {
    accounts: Mutex<HashMap<String, (UserRecord, String)>>,
    tokens: Mutex<HashMap<String, String>>,
    cars: Mutex<Vec<Car>>,
    conversations: Mutex<Vec<Conversation>>,
    next_id: AtomicI64,
    pub me_calls: AtomicUsize,
    pub catalog_calls: AtomicUsize,
}

impl BackendState {
    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn add_account(&self, name: &str, email: &str, password: &str) -> UserRecord {
        let user = UserRecord {
            id: UserId::Numeric(self.next_id()),
            email: email.to_string(),
            name: name.to_string(),
        };
        Self::lock(&self.accounts).insert(email.to_string(), (user.clone(), password.to_string()));
        user
    }

    fn issue_token(&self, email: &str) -> String {
        let token = format!("token-{}", self.next_id());
        Self::lock(&self.tokens).insert(token.clone(), email.to_string());
        token
    }

    /// Invalidates every issued token.
    pub fn revoke_all(&self) {
        Self::lock(&self.tokens).clear();
    }

    /// Stores a finished conversation for `owner` and returns its id.
    pub fn seed_conversation(
        &self,
        owner: &str,
        title: &str,
        exchange: &[(&str, &str)],
    ) -> i64 {
        let id = self.next_id();
        let mut messages = Vec::new();
        for (question, answer) in exchange {
            for (role, content) in [(ChatRole::User, question), (ChatRole::Assistant, answer)] {
                messages.push(StoredChatMessage {
                    id: self.next_id(),
                    content: (*content).to_string(),
                    role,
                    timestamp: Some(Utc::now()),
                });
            }
        }
        Self::lock(&self.conversations).push(Conversation {
            owner: owner.to_string(),
            summary: ChatSessionSummary {
                id,
                title: Some(title.to_string()),
                created_at: Some(Utc::now()),
                updated_at: Some(Utc::now()),
            },
            messages,
        });
        id
    }

    /// Whether an account is registered under `email`.
    pub fn has_account(&self, email: &str) -> bool {
        Self::lock(&self.accounts).contains_key(email)
    }

    pub fn seed_car(&self, make: &str, model: &str, year: i32) -> Car {
        let car = Car {
            id: self.next_id(),
            make: make.to_string(),
            model: model.to_string(),
            year,
            price: Some(25_000.0),
            description: None,
            features: vec!["bluetooth".to_string()],
        };
        Self::lock(&self.cars).push(car.clone());
        car
    }

    fn caller(&self, headers: &HeaderMap) -> Option<UserRecord> {
        let token = headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        let email = Self::lock(&self.tokens).get(token)?.clone();
        Self::lock(&self.accounts)
            .get(&email)
            .map(|(user, _)| user.clone())
    }
}

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

type Shared = State<Arc<BackendState>>;

async fn login(State(state): Shared, Json(request): Json<LoginRequest>) -> Response {
    let user = BackendState::lock(&state.accounts)
        .get(&request.email)
        .filter(|(_, password)| *password == request.password)
        .map(|(user, _)| user.clone());
    match user {
        Some(user) => {
            let token = state.issue_token(&request.email);
            Json(json!({ "access_token": token, "token_type": "bearer", "user": user }))
                .into_response()
        }
        None => detail(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn register(State(state): Shared, Json(request): Json<RegisterRequest>) -> Response {
    if BackendState::lock(&state.accounts).contains_key(&request.email) {
        return detail(StatusCode::BAD_REQUEST, "Email already exists");
    }
    let user = state.add_account(&request.name, &request.email, &request.password);
    let token = state.issue_token(&request.email);
    Json(json!({ "access_token": token, "token_type": "bearer", "user": user })).into_response()
}

async fn me(State(state): Shared, headers: HeaderMap) -> Response {
    state.me_calls.fetch_add(1, Ordering::SeqCst);
    match state.caller(&headers) {
        // The auth router reports `full_name`.
        Some(user) => {
            Json(json!({ "id": user.id, "email": user.email, "full_name": user.name }))
                .into_response()
        }
        None => unauthorized(),
    }
}

async fn update_profile(
    State(state): Shared,
    headers: HeaderMap,
    Json(request): Json<ProfileUpdateRequest>,
) -> Response {
    let Some(user) = state.caller(&headers) else {
        return unauthorized();
    };
    if !request.email.contains('@') {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": [{
                "loc": ["body", "email"],
                "msg": "value is not a valid email address",
                "type": "value_error"
            }] })),
        )
            .into_response();
    }

    let updated = user.with_profile(&request.name, &request.email);
    let mut accounts = BackendState::lock(&state.accounts);
    if let Some((_, password)) = accounts.remove(&user.email) {
        accounts.insert(updated.email.clone(), (updated.clone(), password));
    }
    drop(accounts);
    for email in BackendState::lock(&state.tokens).values_mut() {
        if *email == user.email {
            email.clone_from(&updated.email);
        }
    }
    Json(updated).into_response()
}

async fn delete_profile(State(state): Shared, headers: HeaderMap) -> Response {
    let Some(user) = state.caller(&headers) else {
        return unauthorized();
    };
    BackendState::lock(&state.accounts).remove(&user.email);
    BackendState::lock(&state.tokens).retain(|_, email| *email != user.email);
    Json(json!({ "success": true, "message": "User deleted successfully" })).into_response()
}

fn paged(cars: impl Iterator<Item = Car>, page: Page) -> Vec<Car> {
    cars.skip(page.skip as usize)
        .take(page.limit as usize)
        .collect()
}

async fn list_cars(
    State(state): Shared,
    headers: HeaderMap,
    Query(page): Query<Page>,
) -> Response {
    state.catalog_calls.fetch_add(1, Ordering::SeqCst);
    if state.caller(&headers).is_none() {
        return unauthorized();
    }
    let cars = BackendState::lock(&state.cars).clone();
    Json(paged(cars.into_iter(), page)).into_response()
}

async fn search_cars(
    State(state): Shared,
    headers: HeaderMap,
    Path(query): Path<String>,
    Query(page): Query<Page>,
) -> Response {
    if state.caller(&headers).is_none() {
        return unauthorized();
    }
    let needle = query.to_lowercase();
    let cars = BackendState::lock(&state.cars).clone();
    let matches = cars.into_iter().filter(|car| {
        car.make.to_lowercase().contains(&needle)
            || car.model.to_lowercase().contains(&needle)
            || car
                .description
                .as_deref()
                .is_some_and(|text| text.to_lowercase().contains(&needle))
    });
    Json(paged(matches, page)).into_response()
}

async fn create_car(State(state): Shared, headers: HeaderMap, Json(car): Json<NewCar>) -> Response {
    if state.caller(&headers).is_none() {
        return unauthorized();
    }
    let car = Car {
        id: state.next_id(),
        make: car.make,
        model: car.model,
        year: car.year,
        price: car.price,
        description: car.description,
        features: car.features,
    };
    BackendState::lock(&state.cars).push(car.clone());
    (StatusCode::CREATED, Json(car)).into_response()
}

async fn get_car(State(state): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if state.caller(&headers).is_none() {
        return unauthorized();
    }
    match BackendState::lock(&state.cars).iter().find(|car| car.id == id) {
        Some(car) => Json(car.clone()).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Car not found"),
    }
}

async fn update_car(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(changes): Json<CarUpdate>,
) -> Response {
    if state.caller(&headers).is_none() {
        return unauthorized();
    }
    let mut cars = BackendState::lock(&state.cars);
    let Some(car) = cars.iter_mut().find(|car| car.id == id) else {
        return detail(StatusCode::NOT_FOUND, "Car not found");
    };
    if let Some(make) = changes.make {
        car.make = make;
    }
    if let Some(model) = changes.model {
        car.model = model;
    }
    if let Some(year) = changes.year {
        car.year = year;
    }
    if changes.price.is_some() {
        car.price = changes.price;
    }
    if changes.description.is_some() {
        car.description = changes.description;
    }
    if let Some(features) = changes.features {
        car.features = features;
    }
    Json(car.clone()).into_response()
}

async fn delete_car(State(state): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if state.caller(&headers).is_none() {
        return unauthorized();
    }
    let mut cars = BackendState::lock(&state.cars);
    let before = cars.len();
    cars.retain(|car| car.id != id);
    if cars.len() == before {
        return detail(StatusCode::NOT_FOUND, "Car not found");
    }
    Json(json!({ "message": "Car deleted" })).into_response()
}

async fn chat(State(state): Shared, headers: HeaderMap, Json(request): Json<ChatRequest>) -> Response {
    let Some(user) = state.caller(&headers) else {
        return unauthorized();
    };
    if request.message == "fail" {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let answer = format!("You asked about: {}", request.message);

    let mut conversations = BackendState::lock(&state.conversations);
    let index = match request.session_id {
        Some(id) => {
            let found = conversations.iter().position(|conversation| {
                conversation.summary.id == id && conversation.owner == user.email
            });
            match found {
                Some(index) => index,
                None => return detail(StatusCode::BAD_REQUEST, "Chat session not found"),
            }
        }
        None => {
            conversations.push(Conversation {
                owner: user.email.clone(),
                summary: ChatSessionSummary {
                    id: state.next_id(),
                    title: Some(request.message.chars().take(50).collect()),
                    created_at: Some(Utc::now()),
                    updated_at: Some(Utc::now()),
                },
                messages: Vec::new(),
            });
            conversations.len() - 1
        }
    };
    let conversation = &mut conversations[index];
    let exchange = [
        (ChatRole::User, request.message),
        (ChatRole::Assistant, answer.clone()),
    ];
    for (role, content) in exchange {
        conversation.messages.push(StoredChatMessage {
            id: state.next_id(),
            content,
            role,
            timestamp: Some(Utc::now()),
        });
    }
    conversation.summary.updated_at = Some(Utc::now());

    Json(ChatReply {
        response: answer,
        session_id: Some(conversation.summary.id),
    })
    .into_response()
}

async fn chat_sessions(State(state): Shared, headers: HeaderMap) -> Response {
    let Some(user) = state.caller(&headers) else {
        return unauthorized();
    };
    let summaries: Vec<ChatSessionSummary> = BackendState::lock(&state.conversations)
        .iter()
        .filter(|conversation| conversation.owner == user.email)
        .map(|conversation| conversation.summary.clone())
        .collect();
    Json(summaries).into_response()
}

async fn chat_messages(State(state): Shared, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let Some(user) = state.caller(&headers) else {
        return unauthorized();
    };
    let conversations = BackendState::lock(&state.conversations);
    match conversations
        .iter()
        .find(|conversation| conversation.summary.id == id && conversation.owner == user.email)
    {
        Some(conversation) => Json(conversation.messages.clone()).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Session not found"),
    }
}

/// A running fake backend with one account (`a@b.com` / `secret1`).
#[derive(Debug)]
pub struct FakeBackend {
    pub base_url: Url,
    pub state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        state.add_account("Ann", EMAIL, PASSWORD);

        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/me", get(me))
            .route("/profile", put(update_profile).delete(delete_profile))
            .route("/cars/", get(list_cars).post(create_car))
            .route("/cars/search/{query}", get(search_cars))
            .route("/cars/{id}", get(get_car).put(update_car).delete(delete_car))
            .route("/chat/", post(chat))
            .route("/chat/sessions", get(chat_sessions))
            .route("/chat/sessions/{id}/messages", get(chat_messages))
            .with_state(state.clone());
        let app = Router::new().nest("/api/v1", api);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}")).unwrap(),
            state,
            handle,
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::with_defaults();
        config.api.base_url = self.base_url.clone();
        config.api.timeout_secs = 5;
        config
    }

    pub fn context(&self, storage: Arc<dyn CredentialStore>) -> AppContext {
        AppContext::new(&self.config(), storage).unwrap()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A config pointing at a port nothing listens on.
pub async fn unreachable_config() -> Config {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = Config::with_defaults();
    config.api.base_url = Url::parse(&format!("http://{addr}")).unwrap();
    config.api.timeout_secs = 2;
    config
}

/// Navigator that records where it was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
    moved: Notify,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<String> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn moved(&self) {
        self.moved.notified().await;
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        self.moved.notify_one();
    }
}
