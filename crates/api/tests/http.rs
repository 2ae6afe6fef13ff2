use std::sync::Arc;

use axum::{
  body::Body,
  http::{header, Method, Request, StatusCode},
  Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use freelance_hub_api::{
  app,
  config::{Config, Environment},
  store::MemoryStore,
  AppState,
};

const COVER_LETTER: &str = "I have shipped several marketplaces in React and would love to help you with this one.";

fn test_app() -> Router {
  let config = Config {
    host: "127.0.0.1".to_string(),
    port: 0,
    database_url: "sqlite::memory:".to_string(),
    jwt_secret: "integration-secret".to_string(),
    jwt_maxage: 60,
    cors_origin: "http://localhost:3000".to_string(),
    environment: Environment::Development,
  };
  let state = AppState::new(Arc::new(MemoryStore::new()), &config);

  app(state, &config).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
  let mut request = Request::builder()
    .method(method)
    .uri(uri)
    .header(header::CONTENT_TYPE, "application/json");
  if let Some(token) = token {
    request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let body = match body {
    Some(body) => Body::from(serde_json::to_vec(&body).unwrap()),
    None => Body::empty(),
  };

  let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
  let status = response.status();
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };

  (status, body)
}

/// Registers a user and returns its token and id.
async fn register(app: &Router, first_name: &str, email: &str, role: &str) -> (String, String) {
  let (status, body) = send(
    app,
    Method::POST,
    "/api/auth/register",
    None,
    Some(json!({
      "firstName": first_name,
      "lastName": "Tester",
      "email": email,
      "password": "secret123",
      "role": role,
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");

  (
    body["token"].as_str().unwrap().to_string(),
    body["user"]["id"].as_str().unwrap().to_string(),
  )
}

fn project_body() -> Value {
  json!({
    "title": "Marketplace landing page",
    "description": "Design and build the landing page of a marketplace",
    "category": "Web Development",
    "skills": ["React", "CSS"],
    "budget": 1000.0,
    "deadline": (Utc::now() + Duration::days(30)).to_rfc3339(),
    "requirements": ["Responsive layout"],
  })
}

#[tokio::test]
async fn test_health() {
  let app = test_app();

  let (status, body) = send(&app, Method::GET, "/health", None, None).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn test_register_login_and_me() {
  let app = test_app();
  register(&app, "Ada", "Ada@Example.com", "freelancer").await;

  let (status, body) = send(
    &app,
    Method::POST,
    "/api/auth/login",
    None,
    Some(json!({ "email": "ada@example.com", "password": "secret123" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["user"]["email"], json!("ada@example.com"));
  assert!(body["user"].get("password").is_none());
  let token = body["token"].as_str().unwrap().to_string();

  let (status, body) = send(&app, Method::GET, "/api/users/me", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["role"], json!("freelancer"));

  let (status, body) = send(
    &app,
    Method::POST,
    "/api/auth/login",
    None,
    Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["kind"], json!("AUTHENTICATION_ERROR"));
}

#[tokio::test]
async fn test_duplicate_email_is_a_conflict() {
  let app = test_app();
  register(&app, "Ada", "ada@example.com", "freelancer").await;

  let (status, body) = send(
    &app,
    Method::POST,
    "/api/auth/register",
    None,
    Some(json!({
      "firstName": "Ada",
      "lastName": "Again",
      "email": "ADA@example.com",
      "password": "secret123",
      "role": "investor",
    })),
  )
  .await;

  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["kind"], json!("CONFLICT"));
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
  let app = test_app();

  let (status, body) = send(&app, Method::POST, "/api/projects", None, Some(project_body())).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["kind"], json!("AUTHENTICATION_ERROR"));

  let (status, _) = send(&app, Method::GET, "/api/users/me", Some("not-a-token"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

async fn me_with_cookie(app: &Router, bearer: Option<&str>, cookie: &str) -> StatusCode {
  let mut request = Request::builder()
    .method(Method::GET)
    .uri("/api/users/me")
    .header(header::COOKIE, cookie);
  if let Some(token) = bearer {
    request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }

  let response = app.clone().oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
  response.status()
}

#[tokio::test]
async fn test_auth_cookie_is_set_and_cleared() {
  let app = test_app();
  register(&app, "Ada", "ada@example.com", "freelancer").await;

  let request = Request::builder()
    .method(Method::POST)
    .uri("/api/auth/login")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(
      json!({ "email": "ada@example.com", "password": "secret123" }).to_string(),
    ))
    .unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
  assert!(set_cookie.starts_with("token="), "{set_cookie}");
  assert!(set_cookie.contains("HttpOnly"));

  let cookie = set_cookie.split(';').next().unwrap();
  assert_eq!(me_with_cookie(&app, None, cookie).await, StatusCode::OK);

  let request = Request::builder()
    .method(Method::POST)
    .uri("/api/auth/logout")
    .body(Body::empty())
    .unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
  assert!(cleared.starts_with("token=;"), "{cleared}");
}

#[tokio::test]
async fn test_bearer_token_wins_over_stale_cookie() {
  let app = test_app();
  let (token, _) = register(&app, "Ada", "ada@example.com", "freelancer").await;

  let status = me_with_cookie(&app, Some(&token), "token=stale.expired.jwt").await;
  assert_eq!(status, StatusCode::OK);

  let status = me_with_cookie(&app, None, "token=stale.expired.jwt").await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_short_cover_letter_is_rejected() {
  let app = test_app();
  let (owner, _) = register(&app, "Eve", "eve@example.com", "entrepreneur").await;
  let (freelancer, _) = register(&app, "Ada", "ada@example.com", "freelancer").await;

  let (status, project) = send(&app, Method::POST, "/api/projects", Some(&owner), Some(project_body())).await;
  assert_eq!(status, StatusCode::CREATED, "{project}");
  let project_id = project["id"].as_str().unwrap();

  let (status, body) = send(
    &app,
    Method::POST,
    &format!("/api/projects/{project_id}/proposals"),
    Some(&freelancer),
    Some(json!({ "coverLetter": "Hire me", "proposedBudget": 900.0 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], json!("VALIDATION_ERROR"));

  let (status, _) = send(
    &app,
    Method::POST,
    &format!("/api/projects/{project_id}/proposals"),
    Some(&freelancer),
    Some(json!({ "coverLetter": COVER_LETTER, "proposedBudget": 900.0 })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_freelancer_cannot_create_projects() {
  let app = test_app();
  let (token, _) = register(&app, "Ada", "ada@example.com", "freelancer").await;

  let (status, body) = send(&app, Method::POST, "/api/projects", Some(&token), Some(project_body())).await;

  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["kind"], json!("AUTHORIZATION_ERROR"));
}

#[tokio::test]
async fn test_invalid_project_is_a_validation_error() {
  let app = test_app();
  let (token, _) = register(&app, "Eve", "eve@example.com", "entrepreneur").await;

  let mut body = project_body();
  body["skills"] = json!([]);
  let (status, response) = send(&app, Method::POST, "/api/projects", Some(&token), Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(response["kind"], json!("VALIDATION_ERROR"));

  let (status, response) = send(
    &app,
    Method::POST,
    "/api/projects",
    Some(&token),
    Some(json!({ "title": "Missing everything" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(response["kind"], json!("VALIDATION_ERROR"));
}

#[tokio::test]
async fn test_full_project_workflow() {
  let app = test_app();
  let (owner, owner_id) = register(&app, "Eve", "eve@example.com", "entrepreneur").await;
  let (first, first_id) = register(&app, "Ada", "ada@example.com", "freelancer").await;
  let (second, _) = register(&app, "Bob", "bob@example.com", "freelancer").await;

  let (status, project) = send(&app, Method::POST, "/api/projects", Some(&owner), Some(project_body())).await;
  assert_eq!(status, StatusCode::CREATED, "{project}");
  assert_eq!(project["status"], json!("open"));
  assert_eq!(project["owner"]["id"], json!(owner_id));
  let project_id = project["id"].as_str().unwrap().to_string();

  let (status, page) = send(&app, Method::GET, "/api/projects?search=landing&skills=react", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page["total"], json!(1));
  assert_eq!(page["currentPage"], json!(1));

  // Proposals, the second one through the legacy route and field name.
  let (status, _) = send(
    &app,
    Method::POST,
    &format!("/api/projects/{project_id}/proposals"),
    Some(&first),
    Some(json!({ "coverLetter": COVER_LETTER, "proposedBudget": 900.0, "estimatedTime": "2 weeks" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, project) = send(
    &app,
    Method::POST,
    &format!("/api/projects/{project_id}/apply"),
    Some(&second),
    Some(json!({ "coverLetter": COVER_LETTER, "price": 950.0, "estimatedTime": "3 weeks" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(project["proposalCount"], json!(2));

  let (status, body) = send(
    &app,
    Method::POST,
    &format!("/api/projects/{project_id}/proposals"),
    Some(&first),
    Some(json!({ "coverLetter": COVER_LETTER, "proposedBudget": 800.0 })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["kind"], json!("CONFLICT"));

  let proposal_id = project["proposals"]
    .as_array()
    .unwrap()
    .iter()
    .find(|p| p["freelancer"]["id"] == json!(first_id))
    .and_then(|p| p["id"].as_str())
    .unwrap()
    .to_string();

  let (status, _) = send(
    &app,
    Method::PUT,
    &format!("/api/projects/{project_id}/proposals/{proposal_id}"),
    Some(&first),
    Some(json!({ "status": "accepted" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, project) = send(
    &app,
    Method::PUT,
    &format!("/api/projects/{project_id}/proposals/{proposal_id}"),
    Some(&owner),
    Some(json!({ "status": "accepted" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(project["status"], json!("in-progress"));
  assert_eq!(project["freelancer"]["id"], json!(first_id));
  assert_eq!(project["finalBudget"], json!(900.0));
  let statuses: Vec<&str> = project["proposals"]
    .as_array()
    .unwrap()
    .iter()
    .filter_map(|p| p["status"].as_str())
    .collect();
  assert_eq!(statuses.iter().filter(|s| **s == "accepted").count(), 1);
  assert_eq!(statuses.iter().filter(|s| **s == "rejected").count(), 1);

  // Milestone, with the legacy `payment` name.
  let (status, project) = send(
    &app,
    Method::POST,
    &format!("/api/projects/{project_id}/milestones"),
    Some(&owner),
    Some(json!({
      "title": "Everything",
      "description": "The whole landing page",
      "dueDate": (Utc::now() + Duration::days(7)).to_rfc3339(),
      "payment": 900.0,
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(project["milestones"][0]["amount"], json!(900.0));
  let milestone_uri = format!(
    "/api/projects/{project_id}/milestones/{}",
    project["milestones"][0]["id"].as_str().unwrap()
  );

  let (status, body) = send(
    &app,
    Method::PUT,
    &milestone_uri,
    Some(&owner),
    Some(json!({ "status": "completed" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["kind"], json!("AUTHORIZATION_ERROR"));

  let (status, project) = send(
    &app,
    Method::PUT,
    &milestone_uri,
    Some(&first),
    Some(json!({ "status": "completed" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(project["completionPercentage"], json!(100));

  let (status, project) = send(
    &app,
    Method::PUT,
    &milestone_uri,
    Some(&owner),
    Some(json!({ "status": "approved" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(project["status"], json!("completed"));

  let (status, project) = send(
    &app,
    Method::POST,
    &format!("/api/projects/{project_id}/reviews"),
    Some(&first),
    Some(json!({ "rating": 5, "review": "Clear brief, quick feedback" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(project["reviews"]["client"]["rating"], json!(5));

  let (status, stats) = send(&app, Method::GET, "/api/users/me/stats", Some(&first), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(stats["role"], json!("freelancer"));
  assert_eq!(stats["completedProjects"], json!(1));
  assert_eq!(stats["totalEarnings"], json!(900.0));
}

#[tokio::test]
async fn test_delete_is_owner_only() {
  let app = test_app();
  let (owner, _) = register(&app, "Eve", "eve@example.com", "entrepreneur").await;
  let (other, _) = register(&app, "Mallory", "mallory@example.com", "entrepreneur").await;

  let (_, project) = send(&app, Method::POST, "/api/projects", Some(&owner), Some(project_body())).await;
  let uri = format!("/api/projects/{}", project["id"].as_str().unwrap());

  let (status, _) = send(&app, Method::DELETE, &uri, Some(&other), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(&app, Method::DELETE, &uri, Some(&owner), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (status, body) = send(&app, Method::GET, &uri, None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["kind"], json!("NOT_FOUND"));
}

#[tokio::test]
async fn test_profile_update_rejects_fields_of_another_role() {
  let app = test_app();
  let (token, user_id) = register(&app, "Eve", "eve@example.com", "entrepreneur").await;

  let (status, body) = send(
    &app,
    Method::PUT,
    "/api/users/me",
    Some(&token),
    Some(json!({ "hourlyRate": 50.0 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], json!("VALIDATION_ERROR"));

  let (status, body) = send(
    &app,
    Method::PUT,
    "/api/users/me",
    Some(&token),
    Some(json!({ "bio": "Building things", "company": { "name": "Acme" } })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["company"]["name"], json!("Acme"));

  let (status, body) = send(&app, Method::GET, &format!("/api/users/{user_id}"), None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["bio"], json!("Building things"));
  assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_freelancer_directory() {
  let app = test_app();
  let (cheap, _) = register(&app, "Ada", "ada@example.com", "freelancer").await;
  let (pricey, _) = register(&app, "Bob", "bob@example.com", "freelancer").await;
  register(&app, "Eve", "eve@example.com", "entrepreneur").await;

  for (token, rate) in [(&cheap, 30.0), (&pricey, 120.0)] {
    let (status, _) = send(
      &app,
      Method::PUT,
      "/api/users/me",
      Some(token),
      Some(json!({ "hourlyRate": rate, "skills": ["Rust"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
  }

  let (status, body) = send(&app, Method::GET, "/api/users/freelancers?skills=rust&hourlyRate=50", None, None).await;

  assert_eq!(status, StatusCode::OK);
  let users = body.as_array().unwrap();
  assert_eq!(users.len(), 1);
  assert_eq!(users[0]["firstName"], json!("Ada"));
}
