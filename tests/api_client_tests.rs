use std::collections::HashMap;

use axum::extract::{Path, Query};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use ecotrack::api::{ApiClient, ApiError};
use ecotrack::cli::{self, CliContext, Commands};
use ecotrack::config::ApiConfig;
use ecotrack::models::{AuthSession, Category, ChatRequest, LoginRequest, ProfileUpdate, RegisterRequest, User};
use ecotrack::store::TOKEN_KEY;
use ecotrack::{Config, Session, Store};
use ecotrack::submission::ActivityDraft;

const TOKEN: &str = "tok-123";

type Reply = (StatusCode, Json<Value>);

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn unauthorized() -> Reply {
    (StatusCode::UNAUTHORIZED, Json(json!({"msg": "Missing Authorization Header"})))
}

async fn login(Json(body): Json<Value>) -> Reply {
    if body["password"] == "secret" {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "access_token": TOKEN,
                "user": {"id": 1, "name": "Ada", "email": body["email"]}
            })),
        )
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid email or password"})))
    }
}

async fn register(Json(body): Json<Value>) -> Reply {
    if body["email"] == "taken@example.org" {
        return (StatusCode::CONFLICT, Json(json!({"error": "Email already registered"})));
    }
    (
        StatusCode::CREATED,
        Json(json!({"success": true, "token": "tok-new", "user": {"id": "u2", "name": body["name"], "email": body["email"]}})),
    )
}

async fn profile(headers: HeaderMap) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "user": {"id": 1, "name": "Ada", "email": "ada@example.org", "weekly_goal": 40}})),
    )
}

async fn update_profile(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "data": {"user": {"id": 1, "name": body["name"], "email": "ada@example.org"}}})),
    )
}

async fn delete_profile(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    if body["password"] != "secret" {
        return (StatusCode::OK, Json(json!({"success": false, "message": "Incorrect password"})));
    }
    (StatusCode::OK, Json(json!({"success": true})))
}

fn sample_activities() -> Value {
    json!([
        {"id": "a1", "category": "transport", "vehicle_type": "Bus", "distance_km": 8, "co2": 0.8,
         "timestamp": "2026-10-16T08:00:00Z"},
        {"_id": "a2", "category": "energy", "energy_type": "Electricity", "usage_kwh": 12, "emission_kg": 4.8,
         "created_at": "2026-10-15T19:00:00Z"}
    ])
}

async fn list_activities(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let all = sample_activities();
    let filtered: Vec<Value> = all
        .as_array()
        .into_iter()
        .flatten()
        .filter(|a| query.get("category").is_none_or(|c| a["category"] == c.as_str()))
        .cloned()
        .collect();
    (StatusCode::OK, Json(json!({"activities": filtered})))
}

async fn create_activity(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    if body["category"] == "transport" && body["distance_km"].as_f64().unwrap_or(0.0) <= 0.0 {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "distance must be positive"})));
    }
    (
        StatusCode::CREATED,
        Json(json!({"success": true, "activity": {"id": "a9", "category": body["category"], "co2": 2.3}})),
    )
}

async fn summary(headers: HeaderMap) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "data": {"total_emissions": 12.5, "total_activities": 5}})),
    )
}

async fn history(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let filter = query.get("filter").cloned().unwrap_or_default();
    let all = sample_activities();
    let items: Vec<Value> = all
        .as_array()
        .into_iter()
        .flatten()
        .filter(|a| filter == "all" || a["category"] == filter.as_str())
        .cloned()
        .collect();
    (StatusCode::OK, Json(Value::Array(items)))
}

async fn energy_types() -> Reply {
    (StatusCode::OK, Json(json!({"success": true, "energy_types": ["Electricity", {"name": "Natural Gas"}]})))
}

async fn delete_activity(headers: HeaderMap, Path(id): Path<String>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Activity not found"})));
    }
    (StatusCode::OK, Json(json!({"success": true})))
}

async fn chat(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let conversation_id = if body["conversation_id"].is_null() { json!(42) } else { body["conversation_id"].clone() };
    (
        StatusCode::OK,
        Json(json!({"success": true, "response": format!("You said: {}", body["message"].as_str().unwrap_or("")),
                    "conversation_id": conversation_id})),
    )
}

async fn geocode(Query(query): Query<HashMap<String, String>>) -> Reply {
    if query.get("address").map(String::as_str) == Some("nowhere") {
        return (StatusCode::OK, Json(json!({"results": []})));
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "data": {"lat": 51.5072, "lng": -0.1276, "display_name": "London"}})),
    )
}

async fn reverse_geocode() -> Reply {
    (StatusCode::OK, Json(json!({"address": "10 Downing St"})))
}

async fn spawn_backend() -> ApiConfig {
    let app = Router::new()
        .route("/api/user/login", post(login))
        .route("/api/user/register", post(register))
        .route("/api/user/profile", get(profile).put(update_profile).delete(delete_profile))
        .route("/api/activities", get(list_activities).post(create_activity))
        .route("/api/activities/summary", get(summary))
        .route("/api/activities/history", get(history))
        .route("/api/activities/energy-types", get(energy_types))
        .route("/api/activities/{id}", delete(delete_activity))
        .route("/api/chatbot/chat", post(chat))
        .route("/api/geocode", get(geocode))
        .route("/api/reverse-geocode", get(reverse_geocode));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ApiConfig {
        base_url: format!("http://{}/api", addr),
        ..ApiConfig::default()
    }
}

async fn signed_in_client() -> ApiClient {
    let config = spawn_backend().await;
    ApiClient::new(&config).unwrap().with_token(Some(TOKEN.to_string()))
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let config = spawn_backend().await;
    let client = ApiClient::new(&config).unwrap();

    let session = client
        .login(&LoginRequest { email: "ada@example.org".into(), password: "secret".into() })
        .await
        .unwrap();
    assert_eq!(session.token, TOKEN);
    assert_eq!(session.user.id.as_deref(), Some("1"));
    assert_eq!(session.user.email, "ada@example.org");

    let err = client
        .login(&LoginRequest { email: "ada@example.org".into(), password: "nope".into() })
        .await
        .unwrap_err();
    match err {
        ApiError::HttpError { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid email or password");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_register_reads_token_field_and_error_field() {
    let config = spawn_backend().await;
    let client = ApiClient::new(&config).unwrap();

    let session = client
        .register(&RegisterRequest { name: "Grace".into(), email: "grace@example.org".into(), password: "hopper1".into() })
        .await
        .unwrap();
    assert_eq!(session.token, "tok-new");
    assert_eq!(session.user.name, "Grace");

    let err = client
        .register(&RegisterRequest { name: "X".into(), email: "taken@example.org".into(), password: "abcdef".into() })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Email already registered (HTTP 409)");
}

#[tokio::test]
async fn test_profile_requires_token() {
    let config = spawn_backend().await;
    let anonymous = ApiClient::new(&config).unwrap();
    assert!(matches!(anonymous.profile().await, Err(ApiError::NotAuthenticated)));

    let stale = ApiClient::new(&config).unwrap().with_token(Some("expired".to_string()));
    let err = stale.profile().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(err.to_string().contains("Missing Authorization Header"));
}

#[tokio::test]
async fn test_profile_fetch_and_update() {
    let client = signed_in_client().await;
    let user = client.profile().await.unwrap();
    assert_eq!(user.name, "Ada");
    assert_eq!(user.weekly_goal_kg, Some(40.0));

    let updated = client
        .update_profile(&ProfileUpdate { name: Some("Ada L.".into()), ..ProfileUpdate::default() })
        .await
        .unwrap();
    assert_eq!(updated.name, "Ada L.");
}

#[tokio::test]
async fn test_delete_account_rejected_with_success_false() {
    let client = signed_in_client().await;
    let err = client.delete_account("wrong").await.unwrap_err();
    assert!(matches!(err, ApiError::RejectedError(ref m) if m == "Incorrect password"));
    client.delete_account("secret").await.unwrap();
}

#[tokio::test]
async fn test_list_activities_with_category_filter() {
    let client = signed_in_client().await;
    let all = client.list_activities(None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].id, "a2");
    assert_eq!(all[1].co2_kg, 4.8);

    let energy = client.list_activities(Some(Category::Energy)).await.unwrap();
    assert_eq!(energy.len(), 1);
    assert_eq!(energy[0].kind, "Electricity");
}

#[tokio::test]
async fn test_history_and_summary_shapes() {
    let client = signed_in_client().await;
    let history = client.history(Some(Category::Transport)).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].distance_km, Some(8.0));

    let summary = client.summary().await.unwrap();
    assert_eq!(summary.activities_logged, 5);
    assert_eq!(summary.average_kg, 2.5);
}

#[tokio::test]
async fn test_create_activity_completes_sparse_response() {
    let client = signed_in_client().await;
    let draft = ActivityDraft {
        kind: "Train".to_string(),
        amount: "42".to_string(),
        ..ActivityDraft::new(Category::Transport)
    };
    let created = client.create_activity(&draft.validate().unwrap()).await.unwrap();
    assert_eq!(created.id, "a9");
    assert_eq!(created.category, Category::Transport);
    assert_eq!(created.kind, "Train");
    assert_eq!(created.distance_km, Some(42.0));
    assert_eq!(created.co2_kg, 2.3);
}

#[tokio::test]
async fn test_delete_activity_not_found_uses_detail() {
    let client = signed_in_client().await;
    client.delete_activity("a1").await.unwrap();
    let err = client.delete_activity("missing").await.unwrap_err();
    assert!(matches!(err, ApiError::HttpError { status: 404, ref message } if message == "Activity not found"));
}

#[tokio::test]
async fn test_energy_types_accepts_mixed_entries() {
    let config = spawn_backend().await;
    let client = ApiClient::new(&config).unwrap();
    let types = client.energy_types().await.unwrap();
    assert_eq!(types, vec!["Electricity".to_string(), "Natural Gas".to_string()]);
}

#[tokio::test]
async fn test_chat_keeps_conversation_id() {
    let client = signed_in_client().await;
    let first = client
        .chat(&ChatRequest { message: "hi".into(), conversation_id: None })
        .await
        .unwrap();
    assert_eq!(first.reply, "You said: hi");
    assert_eq!(first.conversation_id.as_deref(), Some("42"));

    let second = client
        .chat(&ChatRequest { message: "more".into(), conversation_id: first.conversation_id.clone() })
        .await
        .unwrap();
    assert_eq!(second.conversation_id.as_deref(), Some("42"));
}

#[tokio::test]
async fn test_geocode_and_reverse_geocode() {
    let config = spawn_backend().await;
    let client = ApiClient::new(&config).unwrap();

    let london = client.geocode("London").await.unwrap().unwrap();
    assert!((london.lat - 51.5072).abs() < 1e-6);
    assert_eq!(london.address.as_deref(), Some("London"));

    assert!(client.geocode("nowhere").await.unwrap().is_none());

    let reversed = client.reverse_geocode(51.5, -0.12).await.unwrap().unwrap();
    assert_eq!(reversed.address.as_deref(), Some("10 Downing St"));
    assert_eq!(reversed.lat, 51.5);
    assert_eq!(reversed.lng, -0.12);
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ApiConfig {
        base_url: format!("http://{}/api", addr),
        timeout_secs: 2,
        ..ApiConfig::default()
    };
    let client = ApiClient::new(&config).unwrap();
    let err = client
        .login(&LoginRequest { email: "a@b.c".into(), password: "x".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NetworkError(_)));
}

async fn signed_in_cli(token: &str) -> CliContext {
    let api = spawn_backend().await;
    let store = Store::in_memory().unwrap();
    let mut session = Session::default();
    session
        .begin(&store, AuthSession { token: token.to_string(), user: User { name: "Ada".into(), ..User::default() } })
        .unwrap();
    let client = ApiClient::new(&api).unwrap().with_token(Some(token.to_string()));
    let mut config = Config::default();
    config.api = api;
    CliContext { config, store, session, client }
}

#[tokio::test]
async fn test_cli_wrong_password_keeps_session() {
    let mut ctx = signed_in_cli(TOKEN).await;
    let command = Commands::Login { email: "ada@example.org".into(), password: Some("nope".into()) };
    assert!(cli::run(command, &mut ctx).await.is_err());
    assert!(ctx.session.is_authenticated());
    assert_eq!(ctx.store.get(TOKEN_KEY).unwrap().as_deref(), Some(TOKEN));
}

#[tokio::test]
async fn test_cli_expired_token_clears_session() {
    let mut ctx = signed_in_cli("stale").await;
    assert!(cli::run(Commands::Whoami, &mut ctx).await.is_err());
    assert!(!ctx.session.is_authenticated());
    assert!(ctx.store.get(TOKEN_KEY).unwrap().is_none());
}
