use axum::{
  extract::{Path, Query, State},
  middleware::from_fn_with_state,
  Extension, Json,
};
use chrono::Utc;
use secrecy::SecretBox;
use serde::Deserialize;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{
  router::{OpenApiRouter, UtoipaMethodRouterExt},
  routes,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
  entities::user::{Company, Education, Experience, InvestmentPreferences, SocialLinks, User},
  error::ApiResult,
  service::{
    mutation::{
      self,
      users::{ProfileChanges, RoleChanges},
    },
    query::{self, users::DashboardStats},
  },
  store::FreelancerFilter,
  AppJson, AppState,
};

use super::{auth::auth_guard, split_list};

const USERS_TAG: &str = "users";

pub fn init_users_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(get_me, update_me).layer(from_fn_with_state(state.clone(), auth_guard)))
    .routes(routes!(get_my_stats).layer(from_fn_with_state(state.clone(), auth_guard)))
    .routes(routes!(list_freelancers))
    .routes(routes!(get_user))
}

#[utoipa::path(
  get,
  path = "/me",
  tag = USERS_TAG,
  responses(
    (status = OK, description = "Return current logged user", body = User),
    (status = 401, description = "Unauthorized")
  )
)]
async fn get_me(Extension(user): Extension<User>) -> ApiResult<Json<User>> {
  Ok(Json(user))
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
  #[validate(length(min = 1, max = 50))]
  first_name: Option<String>,
  #[validate(length(min = 1, max = 50))]
  last_name: Option<String>,
  #[validate(email)]
  email: Option<String>,
  #[validate(length(min = 6))]
  password: Option<String>,
  #[validate(length(max = 500))]
  bio: Option<String>,
  skills: Option<Vec<String>>,
  location: Option<String>,
  #[serde(alias = "profilePicture")]
  avatar: Option<String>,
  social: Option<SocialLinks>,
  #[validate(range(min = 0.0))]
  hourly_rate: Option<f64>,
  experience: Option<Vec<Experience>>,
  education: Option<Vec<Education>>,
  company: Option<Company>,
  investment_preferences: Option<InvestmentPreferences>,
}

#[utoipa::path(
  put,
  path = "/me",
  tag = USERS_TAG,
  request_body = UpdateProfile,
  responses(
    (status = 200, description = "Profile updated", body = User),
    (status = 400, description = "Validation error or fields of another role"),
    (status = 401, description = "Unauthorized"),
    (status = 409, description = "Email already registered")
  )
)]
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn update_me(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  AppJson(input): AppJson<UpdateProfile>,
) -> ApiResult<Json<User>> {
  input.validate()?;

  let params = ProfileChanges {
    first_name: input.first_name,
    last_name: input.last_name,
    email: input.email,
    password: input.password.map(|password| SecretBox::new(Box::new(password))),
    bio: input.bio,
    skills: input.skills,
    location: input.location,
    avatar: input.avatar,
    social: input.social,
    role_details: RoleChanges {
      hourly_rate: input.hourly_rate,
      experience: input.experience,
      education: input.education,
      company: input.company,
      investment_preferences: input.investment_preferences,
    },
  };

  debug!("Update profile with params {:?}", params);

  let user = mutation::users::update_profile(state.store.as_ref(), user, params, Utc::now()).await?;

  Ok(Json(user))
}

#[utoipa::path(
  get,
  path = "/me/stats",
  tag = USERS_TAG,
  responses(
    (status = 200, description = "Dashboard figures for the caller's role", body = DashboardStats),
    (status = 401, description = "Unauthorized")
  )
)]
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn get_my_stats(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
) -> ApiResult<Json<DashboardStats>> {
  let stats = query::users::dashboard_stats(state.store.as_ref(), &user, Utc::now()).await?;

  Ok(Json(stats))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
struct ListFreelancersParams {
  /// Comma separated, matches freelancers having any of them
  skills: Option<String>,
  /// Upper bound of the hourly rate
  hourly_rate: Option<f64>,
}

#[utoipa::path(
  get,
  path = "/freelancers",
  tag = USERS_TAG,
  params(
    ListFreelancersParams
  ),
  responses(
    (status = 200, description = "Matching freelancers, newest first", body = [User])
  )
)]
#[instrument(skip(state))]
async fn list_freelancers(
  State(state): State<AppState>,
  Query(params): Query<ListFreelancersParams>,
) -> ApiResult<Json<Vec<User>>> {
  let filter = FreelancerFilter {
    skills: split_list(params.skills.as_deref()),
    max_hourly_rate: params.hourly_rate,
  };

  let users = query::users::list_freelancers(state.store.as_ref(), &filter).await?;

  Ok(Json(users))
}

#[utoipa::path(
  get,
  path = "/{id}",
  tag = USERS_TAG,
  responses(
    (status = 200, description = "Public profile of the user", body = User),
    (status = 404, description = "User not found")
  ),
  params(
    ("id" = Uuid, Path, description = "User id")
  )
)]
#[instrument(skip(state))]
async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<User>> {
  let user = query::users::get_by_id(state.store.as_ref(), id).await?;

  Ok(Json(user))
}
