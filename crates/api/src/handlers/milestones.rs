use axum::{
  extract::{Path, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;
use utoipa::ToSchema;
use utoipa_axum::{
  router::{OpenApiRouter, UtoipaMethodRouterExt},
  routes,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
  entities::{milestone::MilestoneStatus, project::ProjectView, user::User},
  error::ApiResult,
  service::{
    lifecycle::{Actor, NewMilestone},
    mutation, query,
  },
  AppJson, AppState,
};

use super::{auth::auth_guard, projects::PROJECTS_TAG};

pub fn init_milestones_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(add_milestone).layer(from_fn_with_state(state.clone(), auth_guard)))
    .routes(routes!(update_milestone).layer(from_fn_with_state(state.clone(), auth_guard)))
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMilestone {
  #[validate(length(min = 1, max = 200))]
  title: String,
  #[validate(length(min = 1, max = 2000))]
  description: String,
  due_date: DateTime<Utc>,
  #[serde(alias = "payment")]
  #[validate(range(min = 0.0))]
  amount: f64,
}

#[utoipa::path(
  post,
  path = "/{id}/milestones",
  tag = PROJECTS_TAG,
  request_body = AddMilestone,
  responses(
    (status = 201, description = "Milestone added", body = ProjectView),
    (status = 400, description = "Validation error or project already closed"),
    (status = 403, description = "Not the owner"),
    (status = 404, description = "Project not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state, user, input), fields(project_id = %id, user_id = %user.id))]
async fn add_milestone(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<AddMilestone>,
) -> ApiResult<(StatusCode, Json<ProjectView>)> {
  input.validate()?;

  let project = mutation::milestones::add(
    state.store.as_ref(),
    id,
    &Actor::from(&user),
    NewMilestone {
      title: input.title,
      description: input.description,
      due_date: input.due_date,
      amount: input.amount,
    },
    Utc::now(),
  )
  .await?;
  let view = query::projects::present(state.store.as_ref(), project).await?;

  Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMilestone {
  status: MilestoneStatus,
}

#[utoipa::path(
  put,
  path = "/{id}/milestones/{milestone_id}",
  tag = PROJECTS_TAG,
  request_body = UpdateMilestone,
  responses(
    (status = 200, description = "Milestone updated", body = ProjectView),
    (status = 400, description = "Transition not allowed in the current state"),
    (status = 403, description = "Caller may not request this status"),
    (status = 404, description = "Project or milestone not found"),
    (status = 409, description = "Project modified concurrently")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id"),
    ("milestone_id" = Uuid, Path, description = "Milestone id")
  )
)]
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn update_milestone(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path((id, milestone_id)): Path<(Uuid, Uuid)>,
  AppJson(input): AppJson<UpdateMilestone>,
) -> ApiResult<Json<ProjectView>> {
  let project = mutation::milestones::update_status(
    state.store.as_ref(),
    id,
    milestone_id,
    &Actor::from(&user),
    input.status,
    Utc::now(),
  )
  .await?;
  let view = query::projects::present(state.store.as_ref(), project).await?;

  Ok(Json(view))
}
