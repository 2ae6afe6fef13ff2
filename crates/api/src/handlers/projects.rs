use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  Extension, Json,
};
use chrono::{DateTime, Utc};
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
  entities::{
    project::{Attachment, Category, ProjectPage, ProjectStatus, ProjectView},
    user::User,
  },
  error::{ApiError, ApiResult},
  service::{
    lifecycle::{Actor, NewProject, NewReview, ProjectChanges},
    mutation, query,
  },
  store::{Pagination, ProjectFilter},
  AppJson, AppState,
};

use super::{auth::auth_guard, milestones::init_milestones_routes, proposals::init_proposals_routes, split_list};

pub(crate) const PROJECTS_TAG: &str = "projects";

pub fn init_projects_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_projects))
    .routes(routes!(create_project).layer(from_fn_with_state(state.clone(), auth_guard)))
    .routes(routes!(get_project))
    .routes(routes!(update_project, delete_project).layer(from_fn_with_state(state.clone(), auth_guard)))
    .routes(routes!(similar_projects))
    .routes(routes!(cancel_project).layer(from_fn_with_state(state.clone(), auth_guard)))
    .routes(routes!(review_project).layer(from_fn_with_state(state.clone(), auth_guard)))
    .merge(init_proposals_routes(state.clone()))
    .merge(init_milestones_routes(state.clone()))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
struct ListProjectsParams {
  /// Category label, e.g. `Web Development`
  category: Option<String>,
  status: Option<String>,
  min_budget: Option<f64>,
  max_budget: Option<f64>,
  /// Comma separated, matches projects requiring any of them
  skills: Option<String>,
  /// Case-insensitive substring of the title, description or a skill
  search: Option<String>,
  page: Option<i64>,
  limit: Option<i64>,
}

impl ListProjectsParams {
  fn filter(&self) -> ApiResult<ProjectFilter> {
    Ok(ProjectFilter {
      category: self
        .category
        .as_deref()
        .map(str::parse::<Category>)
        .transpose()
        .map_err(ApiError::InvalidInput)?,
      status: self
        .status
        .as_deref()
        .map(str::parse::<ProjectStatus>)
        .transpose()
        .map_err(ApiError::InvalidInput)?,
      min_budget: self.min_budget,
      max_budget: self.max_budget,
      skills: split_list(self.skills.as_deref()),
      search: self
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
        .map(str::to_string),
      ..ProjectFilter::default()
    })
  }
}

#[utoipa::path(
  get,
  path = "",
  tag = PROJECTS_TAG,
  params(
    ListProjectsParams
  ),
  responses(
    (status = 200, description = "Page of projects, newest first", body = ProjectPage),
    (status = 400, description = "Invalid filter")
  )
)]
#[instrument(skip(state))]
async fn list_projects(
  State(state): State<AppState>,
  Query(params): Query<ListProjectsParams>,
) -> ApiResult<Json<ProjectPage>> {
  let filter = params.filter()?;
  let pagination = Pagination::new(params.page, params.limit);

  let page = query::projects::list(state.store.as_ref(), &filter, pagination, Utc::now()).await?;

  Ok(Json(page))
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
  #[validate(length(min = 1, max = 200))]
  title: String,
  #[validate(length(min = 1, max = 5000))]
  description: String,
  category: Category,
  #[validate(length(min = 1))]
  skills: Vec<String>,
  #[validate(range(min = 0.0))]
  budget: f64,
  deadline: DateTime<Utc>,
  #[validate(length(min = 1))]
  requirements: Vec<String>,
  #[serde(default)]
  attachments: Vec<Attachment>,
}

#[utoipa::path(
  post,
  path = "",
  tag = PROJECTS_TAG,
  request_body = CreateProject,
  responses(
    (status = 201, description = "Project created successfully", body = ProjectView),
    (status = 400, description = "Validation error"),
    (status = 401, description = "Unauthorized"),
    (status = 403, description = "Only entrepreneurs can create projects")
  )
)]
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn create_project(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  AppJson(input): AppJson<CreateProject>,
) -> ApiResult<(StatusCode, Json<ProjectView>)> {
  debug!("Register new project with request: {:?}", input);

  input.validate()?;

  let project = mutation::projects::create(
    state.store.as_ref(),
    &Actor::from(&user),
    NewProject {
      title: input.title,
      description: input.description,
      category: input.category,
      skills: input.skills,
      budget: input.budget,
      deadline: input.deadline,
      requirements: input.requirements,
      attachments: input.attachments,
    },
    Utc::now(),
  )
  .await?;

  let view = query::projects::present(state.store.as_ref(), project).await?;

  Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
  get,
  path = "/{id}",
  tag = PROJECTS_TAG,
  responses(
    (status = 200, description = "Project with resolved users", body = ProjectView),
    (status = 404, description = "Project not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state), fields(project_id = %id))]
async fn get_project(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ProjectView>> {
  let project = query::projects::find_by_id(state.store.as_ref(), id, Utc::now()).await?;
  let view = query::projects::present(state.store.as_ref(), project).await?;

  Ok(Json(view))
}

/// Partial update. The status is not part of it and cannot be changed here.
#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProject {
  #[validate(length(min = 1, max = 200))]
  title: Option<String>,
  #[validate(length(min = 1, max = 5000))]
  description: Option<String>,
  category: Option<Category>,
  #[validate(length(min = 1))]
  skills: Option<Vec<String>>,
  #[validate(range(min = 0.0))]
  budget: Option<f64>,
  deadline: Option<DateTime<Utc>>,
  #[validate(length(min = 1))]
  requirements: Option<Vec<String>>,
  attachments: Option<Vec<Attachment>>,
}

#[utoipa::path(
  put,
  path = "/{id}",
  tag = PROJECTS_TAG,
  request_body = UpdateProject,
  responses(
    (status = 200, description = "Project updated successfully", body = ProjectView),
    (status = 400, description = "Validation error or project no longer open"),
    (status = 403, description = "Not the owner"),
    (status = 404, description = "Project not found"),
    (status = 409, description = "Project modified concurrently")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state, user, input), fields(project_id = %id, user_id = %user.id))]
async fn update_project(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<UpdateProject>,
) -> ApiResult<Json<ProjectView>> {
  debug!("Update project with id {} and params {:?}", id, input);

  input.validate()?;

  let project = mutation::projects::update(
    state.store.as_ref(),
    id,
    &Actor::from(&user),
    ProjectChanges {
      title: input.title,
      description: input.description,
      category: input.category,
      skills: input.skills,
      budget: input.budget,
      deadline: input.deadline,
      requirements: input.requirements,
      attachments: input.attachments,
    },
    Utc::now(),
  )
  .await?;

  let view = query::projects::present(state.store.as_ref(), project).await?;

  Ok(Json(view))
}

#[utoipa::path(
  delete,
  path = "/{id}",
  tag = PROJECTS_TAG,
  responses(
    (status = 204, description = "Project successfully deleted"),
    (status = 403, description = "Not the owner"),
    (status = 404, description = "Project not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state, user), fields(project_id = %id, user_id = %user.id))]
async fn delete_project(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
  debug!("Remove project with id {}", id);

  mutation::projects::delete(state.store.as_ref(), id, &Actor::from(&user), Utc::now()).await?;

  Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
  get,
  path = "/{id}/similar",
  tag = PROJECTS_TAG,
  responses(
    (status = 200, description = "Open projects of the same category", body = [ProjectView]),
    (status = 404, description = "Project not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state), fields(project_id = %id))]
async fn similar_projects(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<ProjectView>>> {
  let projects = query::projects::similar(state.store.as_ref(), id, Utc::now()).await?;
  let views = query::projects::present_many(state.store.as_ref(), projects).await?;

  Ok(Json(views))
}

#[utoipa::path(
  post,
  path = "/{id}/cancel",
  tag = PROJECTS_TAG,
  responses(
    (status = 200, description = "Project cancelled", body = ProjectView),
    (status = 400, description = "Project already completed or cancelled"),
    (status = 403, description = "Not the owner"),
    (status = 404, description = "Project not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state, user), fields(project_id = %id, user_id = %user.id))]
async fn cancel_project(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectView>> {
  let project = mutation::projects::cancel(state.store.as_ref(), id, &Actor::from(&user), Utc::now()).await?;
  let view = query::projects::present(state.store.as_ref(), project).await?;

  Ok(Json(view))
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
pub struct ReviewRequest {
  #[validate(range(min = 1, max = 5))]
  rating: u8,
  #[validate(length(max = 2000))]
  review: Option<String>,
}

#[utoipa::path(
  post,
  path = "/{id}/reviews",
  tag = PROJECTS_TAG,
  request_body = ReviewRequest,
  responses(
    (status = 201, description = "Review recorded", body = ProjectView),
    (status = 400, description = "Project not completed or invalid rating"),
    (status = 403, description = "Neither the owner nor the assigned freelancer"),
    (status = 409, description = "Review already left")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state, user, input), fields(project_id = %id, user_id = %user.id))]
async fn review_project(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<ReviewRequest>,
) -> ApiResult<(StatusCode, Json<ProjectView>)> {
  input.validate()?;

  let project = mutation::projects::review(
    state.store.as_ref(),
    id,
    &Actor::from(&user),
    NewReview {
      rating: input.rating,
      review: input.review,
    },
    Utc::now(),
  )
  .await?;
  let view = query::projects::present(state.store.as_ref(), project).await?;

  Ok((StatusCode::CREATED, Json(view)))
}
