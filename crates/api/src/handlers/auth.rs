use axum::{
  extract::{Request, State},
  http::{header, HeaderValue, StatusCode},
  middleware::Next,
  response::IntoResponse,
  Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::SecretBox;
use serde::{Deserialize, Serialize};
use tower_cookies::{
  cookie::{time::Duration, SameSite},
  Cookie,
};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  entities::user::{Role, User},
  error::{ApiError, ApiResult},
  service::{mutation, query},
  AppJson, AppState,
};

const AUTH_TAG: &str = "auth";
pub(crate) const AUTH_COOKIE_NAME: &str = "token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub sub: String, // User associated with token
  pub iat: usize,  // Issued at time of the token
  pub exp: usize,  // Expiry time of the token
}

pub struct Keys {
  pub encoding: EncodingKey,
  pub decoding: DecodingKey,
}

impl Keys {
  pub fn new(secret: &[u8]) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
    }
  }
}

/// Issues a token for `user_id` valid for `maxage` minutes.
pub fn encode_jwt(user_id: Uuid, keys: &Keys, maxage: i64) -> ApiResult<String> {
  let now = Utc::now();
  let iat = now.timestamp() as usize;
  let exp = (now + chrono::Duration::minutes(maxage)).timestamp() as usize;
  let claims: Claims = Claims {
    sub: user_id.to_string(),
    exp,
    iat,
  };

  encode(&Header::default(), &claims, &keys.encoding)
    .map_err(|_| ApiError::Anyhow(anyhow::anyhow!("Can't encode token")))
}

pub fn decode_jwt(token: &str, keys: &Keys) -> ApiResult<Uuid> {
  let claims = decode::<Claims>(token, &keys.decoding, &Validation::default())
    .map_err(|_| ApiError::Unauthenticated("Invalid token".to_string()))?
    .claims;

  Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthenticated("Invalid token".to_string()))
}

pub async fn auth_guard(
  cookie_jar: CookieJar,
  State(state): State<AppState>,
  mut req: Request,
  next: Next,
) -> ApiResult<impl IntoResponse> {
  // Bearer header wins over the cookie
  let token = req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|auth_header| auth_header.to_str().ok())
    .and_then(|auth_value| {
      auth_value
        .strip_prefix("Bearer ")
        .map(|auth_value| auth_value.to_owned())
    })
    .filter(|token| !token.is_empty())
    .or_else(|| {
      cookie_jar
        .get(AUTH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
    });

  let token =
    token.ok_or_else(|| ApiError::Unauthenticated("You are not logged in, please provide token".to_string()))?;

  let user_id = decode_jwt(&token, &state.keys)?;

  let user = query::users::find_by_id(state.store.as_ref(), user_id)
    .await?
    .ok_or_else(|| ApiError::Unauthenticated("The user belonging to this token no longer exists".to_string()))?;

  debug!("Authenticated user {} ({})", user.id, user.role());

  req.extensions_mut().insert(user);
  Ok(next.run(req).await)
}

pub fn init_auth_routes() -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(register))
    .routes(routes!(login))
    .routes(routes!(logout))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
  #[validate(length(min = 1, max = 50))]
  first_name: String,
  #[validate(length(min = 1, max = 50))]
  last_name: String,
  #[validate(email)]
  email: String,
  #[validate(length(min = 6))]
  password: String,
  role: Role,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
  pub token: String,
  pub user: User,
}

#[utoipa::path(
  post,
  path = "/register",
  tag = AUTH_TAG,
  request_body = RegisterRequest,
  responses(
    (status = 201, description = "User registered", body = AuthResponse),
    (status = 400, description = "Validation error"),
    (status = 409, description = "Email already registered")
  )
)]
#[instrument(skip(state, input))]
async fn register(
  State(state): State<AppState>,
  AppJson(input): AppJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
  input.validate()?;

  let params = mutation::users::RegisterParams {
    first_name: input.first_name,
    last_name: input.last_name,
    email: input.email,
    password: SecretBox::new(Box::new(input.password)),
    role: input.role,
  };

  debug!("Register new user with request: {:?}", params);

  let user = mutation::users::register(state.store.as_ref(), params, Utc::now()).await?;
  let token = encode_jwt(user.id, &state.keys, state.token_maxage)?;

  let cookie = auth_cookie_header(token.clone(), state.token_maxage)?;

  Ok((
    StatusCode::CREATED,
    [(header::SET_COOKIE, cookie)],
    Json(AuthResponse { token, user }),
  ))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
  #[validate(email)]
  email: String,
  #[validate(length(min = 1))]
  password: String,
}

#[utoipa::path(
  post,
  path = "/login",
  tag = AUTH_TAG,
  request_body = LoginRequest,
  responses(
    (status = 200, description = "Login successful", body = AuthResponse),
    (status = 401, description = "Invalid credentials"),
    (status = 400, description = "Validation error")
  )
)]
#[instrument(skip(state, input))]
async fn login(
  State(state): State<AppState>,
  AppJson(input): AppJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
  input.validate()?;

  let params = mutation::users::LoginParams {
    email: input.email,
    password: SecretBox::new(Box::new(input.password)),
  };

  debug!("Try login user with params {:?}", params);

  let user = mutation::users::login(state.store.as_ref(), params).await?;
  let token = encode_jwt(user.id, &state.keys, state.token_maxage)?;

  let cookie = auth_cookie_header(token.clone(), state.token_maxage)?;

  Ok(([(header::SET_COOKIE, cookie)], Json(AuthResponse { token, user })))
}

#[utoipa::path(
  post,
  path = "/logout",
  tag = AUTH_TAG,
  responses(
    (status = 200, description = "Logout successful")
  )
)]
async fn logout() -> ApiResult<impl IntoResponse> {
  let cookie = auth_cookie_header(String::new(), -1)?;

  Ok((
    [(header::SET_COOKIE, cookie)],
    Json(serde_json::json!({ "status": "success" })),
  ))
}

fn auth_cookie_header(token: String, maxage: i64) -> ApiResult<HeaderValue> {
  HeaderValue::from_str(&build_auth_cookie(token, maxage).to_string())
    .map_err(|e| ApiError::Anyhow(anyhow::anyhow!("Can't build auth cookie: {e}")))
}

/// Http-only auth cookie living `maxage` minutes; a negative age clears it.
fn build_auth_cookie(token: String, maxage: i64) -> Cookie<'static> {
  Cookie::build((AUTH_COOKIE_NAME, token))
    .path("/")
    .max_age(Duration::minutes(maxage))
    .same_site(SameSite::Lax)
    .http_only(true)
    .build()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_jwt_round_trip() {
    let keys = Keys::new(b"test-secret");
    let user_id = Uuid::new_v4();

    let token = encode_jwt(user_id, &keys, 60).unwrap();
    assert_eq!(decode_jwt(&token, &keys).unwrap(), user_id);

    let other = Keys::new(b"another-secret");
    assert!(matches!(decode_jwt(&token, &other), Err(ApiError::Unauthenticated(_))));
  }

  #[test]
  fn test_expired_token_is_rejected() {
    let keys = Keys::new(b"test-secret");
    let token = encode_jwt(Uuid::new_v4(), &keys, -10).unwrap();

    assert!(matches!(decode_jwt(&token, &keys), Err(ApiError::Unauthenticated(_))));
  }

  #[test]
  fn test_auth_cookie_header() {
    let value = auth_cookie_header("abc".to_string(), 60).unwrap();
    let value = value.to_str().unwrap();
    assert!(value.starts_with("token=abc"));
    assert!(value.contains("HttpOnly"));
    assert!(value.contains("Max-Age=3600"));

    let cleared = auth_cookie_header(String::new(), -1).unwrap();
    assert!(cleared.to_str().unwrap().starts_with("token=;"));
  }
}
