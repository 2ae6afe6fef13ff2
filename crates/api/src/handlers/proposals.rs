use axum::{
  extract::{Path, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  routing::{post, put},
  Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{
  router::{OpenApiRouter, UtoipaMethodRouterExt},
  routes,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
  entities::{
    project::{Attachment, ProjectView},
    proposal::ProposalStatus,
    user::User,
  },
  error::ApiResult,
  service::{
    lifecycle::{Actor, NewProposal, ProposalDecision, COVER_LETTER_MAX_CHARS, COVER_LETTER_MIN_CHARS},
    mutation, query,
  },
  AppJson, AppState,
};

use super::{auth::auth_guard, projects::PROJECTS_TAG};

/// Proposal routes, nested under a project. The `apply` and `applications`
/// paths are kept for older clients and are not part of the api document.
pub fn init_proposals_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(submit_proposal).layer(from_fn_with_state(state.clone(), auth_guard)))
    .routes(routes!(decide_proposal).layer(from_fn_with_state(state.clone(), auth_guard)))
    .route(
      "/:id/apply",
      post(submit_proposal).layer(from_fn_with_state(state.clone(), auth_guard)),
    )
    .route(
      "/:id/applications/:proposal_id",
      put(decide_proposal).layer(from_fn_with_state(state.clone(), auth_guard)),
    )
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProposal {
  #[validate(length(min = COVER_LETTER_MIN_CHARS, max = COVER_LETTER_MAX_CHARS))]
  cover_letter: String,
  #[serde(alias = "price")]
  #[validate(range(min = 0.0))]
  proposed_budget: f64,
  #[serde(default)]
  #[validate(length(max = 100))]
  estimated_time: String,
  #[serde(default)]
  attachments: Vec<Attachment>,
}

#[utoipa::path(
  post,
  path = "/{id}/proposals",
  tag = PROJECTS_TAG,
  request_body = SubmitProposal,
  responses(
    (status = 201, description = "Proposal submitted", body = ProjectView),
    (status = 400, description = "Validation error or project not open"),
    (status = 403, description = "Not a freelancer, or the project owner"),
    (status = 404, description = "Project not found"),
    (status = 409, description = "Proposal already submitted")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state, user, input), fields(project_id = %id, user_id = %user.id))]
async fn submit_proposal(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<SubmitProposal>,
) -> ApiResult<(StatusCode, Json<ProjectView>)> {
  debug!("Submit proposal to project {} with budget {}", id, input.proposed_budget);

  input.validate()?;

  let project = mutation::proposals::submit(
    state.store.as_ref(),
    id,
    &Actor::from(&user),
    NewProposal {
      cover_letter: input.cover_letter,
      proposed_budget: input.proposed_budget,
      estimated_time: input.estimated_time,
      attachments: input.attachments,
    },
    Utc::now(),
  )
  .await?;
  let view = query::projects::present(state.store.as_ref(), project).await?;

  Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecideProposal {
  /// `accepted` or `rejected`
  status: ProposalStatus,
}

#[utoipa::path(
  put,
  path = "/{id}/proposals/{proposal_id}",
  tag = PROJECTS_TAG,
  request_body = DecideProposal,
  responses(
    (status = 200, description = "Proposal decided", body = ProjectView),
    (status = 400, description = "Proposal already decided or project not open"),
    (status = 403, description = "Not the owner"),
    (status = 404, description = "Project or proposal not found"),
    (status = 409, description = "Project modified concurrently")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id"),
    ("proposal_id" = Uuid, Path, description = "Proposal id")
  )
)]
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn decide_proposal(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path((id, proposal_id)): Path<(Uuid, Uuid)>,
  AppJson(input): AppJson<DecideProposal>,
) -> ApiResult<Json<ProjectView>> {
  let decision = ProposalDecision::try_from(input.status)?;

  let project = mutation::proposals::decide(
    state.store.as_ref(),
    id,
    proposal_id,
    &Actor::from(&user),
    decision,
    Utc::now(),
  )
  .await?;
  let view = query::projects::present(state.store.as_ref(), project).await?;

  Ok(Json(view))
}
