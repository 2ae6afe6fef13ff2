use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
  entities::project::Project,
  error::{ApiError, ApiResult},
  store::Store,
};

pub mod lifecycle;
pub mod mutation;
pub mod query;

/// Loads a project and applies the deadline sweep. An expired open project is
/// written back as cancelled before it is returned.
pub(crate) async fn load_project(store: &dyn Store, id: Uuid, now: DateTime<Utc>) -> ApiResult<Project> {
  let mut project = find_project(store, id).await?;

  if lifecycle::sweep_deadline(&mut project, now) {
    debug!("Project {} passed its deadline, cancelling", id);

    match commit(store, &mut project).await {
      Ok(()) => {},
      Err(ApiError::ConcurrentModification(_)) => {
        // Lost the race against another writer, keep their document.
        project = find_project(store, id).await?;
        lifecycle::sweep_deadline(&mut project, now);
      },
      Err(err) => return Err(err),
    }
  }

  Ok(project)
}

/// Writes the project back if nobody changed it since it was loaded, bumping
/// its version.
pub(crate) async fn commit(store: &dyn Store, project: &mut Project) -> ApiResult<()> {
  let expected_version = project.version;
  project.version += 1;

  if store.replace_project(project, expected_version).await? {
    Ok(())
  } else {
    project.version = expected_version;
    Err(ApiError::ConcurrentModification(project.id.to_string()))
  }
}

async fn find_project(store: &dyn Store, id: Uuid) -> ApiResult<Project> {
  store
    .find_project(id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}
