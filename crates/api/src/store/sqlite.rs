use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{FreelancerFilter, Pagination, ProjectFilter, ProjectStore, Store, UserStore};
use crate::{
  entities::{
    project::Project,
    user::{Role, User},
  },
  error::{ApiError, ApiResult},
};

// Keeps a search needle from matching across two fields
const SEARCH_TEXT_SEPARATOR: &str = "\u{1f}";

// SQL Query Constants
const INSERT_PROJECT: &str = r#"
  INSERT INTO projects (id, owner_id, freelancer_id, status, category, budget, deadline, version, document, search_text, created_at)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;
const REPLACE_PROJECT: &str = r#"
  UPDATE projects
  SET freelancer_id = ?1, status = ?2, category = ?3, budget = ?4, deadline = ?5, version = ?6, document = ?7,
      search_text = ?8
  WHERE id = ?9 AND version = ?10
"#;
const CANCEL_EXPIRED_PROJECTS: &str = r#"
  UPDATE projects
  SET status = 'cancelled',
      version = version + 1,
      document = json_set(document, '$.status', 'cancelled', '$.version', version + 1, '$.updatedAt', ?2)
  WHERE status = 'open' AND deadline < ?1
"#;
const FIND_PROJECT: &str = "SELECT version, document FROM projects WHERE id = ?1";
const DELETE_PROJECT: &str = "DELETE FROM projects WHERE id = ?1";

const INSERT_USER: &str = r#"
  INSERT INTO users (id, email, password, role, document, created_at)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;
const UPDATE_USER: &str = "UPDATE users SET email = ?1, password = ?2, document = ?3 WHERE id = ?4";
const FIND_USER_BY_ID: &str = "SELECT password, document FROM users WHERE id = ?1";
const FIND_USER_BY_EMAIL: &str = "SELECT password, document FROM users WHERE email = ?1";

type ProjectRow = (i64, String);
type UserRow = (String, String);

/// Document store on top of SQLite. Documents are kept as JSON text, the
/// scalar columns mirror the fields used for filtering and version checks.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  pub async fn migrate(&self) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  async fn count_projects(&self, filter: &ProjectFilter) -> ApiResult<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM projects");
    push_project_filter(&mut builder, filter);

    let (count,): (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;
    Ok(count)
  }

  async fn fetch_projects(&self, filter: &ProjectFilter, pagination: Pagination) -> ApiResult<Vec<Project>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT version, document FROM projects");
    push_project_filter(&mut builder, filter);
    builder
      .push(" ORDER BY created_at DESC, id LIMIT ")
      .push_bind(pagination.limit)
      .push(" OFFSET ")
      .push_bind(pagination.offset());

    builder
      .build_query_as::<ProjectRow>()
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(decode_project)
      .collect()
  }
}

#[async_trait]
impl ProjectStore for SqliteStore {
  async fn insert_project(&self, project: &Project) -> ApiResult<()> {
    sqlx::query(INSERT_PROJECT)
      .bind(project.id)
      .bind(project.owner_id)
      .bind(project.freelancer_id)
      .bind(project.status.to_string())
      .bind(project.category.to_string())
      .bind(project.budget)
      .bind(project.deadline.timestamp_millis())
      .bind(project.version)
      .bind(serde_json::to_string(project)?)
      .bind(search_text(project))
      .bind(project.created_at.timestamp_millis())
      .execute(&self.pool)
      .await?;

    Ok(())
  }

  async fn find_project(&self, id: Uuid) -> ApiResult<Option<Project>> {
    sqlx::query_as::<_, ProjectRow>(FIND_PROJECT)
      .bind(id)
      .fetch_optional(&self.pool)
      .await?
      .map(decode_project)
      .transpose()
  }

  async fn list_projects(&self, filter: &ProjectFilter, pagination: Pagination) -> ApiResult<(Vec<Project>, i64)> {
    tokio::try_join!(self.fetch_projects(filter, pagination), self.count_projects(filter))
  }

  async fn replace_project(&self, project: &Project, expected_version: i64) -> ApiResult<bool> {
    let result = sqlx::query(REPLACE_PROJECT)
      .bind(project.freelancer_id)
      .bind(project.status.to_string())
      .bind(project.category.to_string())
      .bind(project.budget)
      .bind(project.deadline.timestamp_millis())
      .bind(project.version)
      .bind(serde_json::to_string(project)?)
      .bind(search_text(project))
      .bind(project.id)
      .bind(expected_version)
      .execute(&self.pool)
      .await?;

    Ok(result.rows_affected() == 1)
  }

  async fn delete_project(&self, id: Uuid) -> ApiResult<bool> {
    let result = sqlx::query(DELETE_PROJECT).bind(id).execute(&self.pool).await?;
    Ok(result.rows_affected() == 1)
  }

  async fn cancel_expired_projects(&self, now: DateTime<Utc>) -> ApiResult<u64> {
    let result = sqlx::query(CANCEL_EXPIRED_PROJECTS)
      .bind(now.timestamp_millis())
      .bind(now.to_rfc3339_opts(SecondsFormat::Micros, true))
      .execute(&self.pool)
      .await?;

    Ok(result.rows_affected())
  }
}

#[async_trait]
impl UserStore for SqliteStore {
  async fn insert_user(&self, user: &User) -> ApiResult<()> {
    sqlx::query(INSERT_USER)
      .bind(user.id)
      .bind(&user.email)
      .bind(&user.password)
      .bind(user.role().to_string())
      .bind(serde_json::to_string(user)?)
      .bind(user.created_at.timestamp_millis())
      .execute(&self.pool)
      .await
      .map_err(|e| map_unique_violation(e, &user.email))?;

    Ok(())
  }

  async fn find_user(&self, id: Uuid) -> ApiResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(FIND_USER_BY_ID)
      .bind(id)
      .fetch_optional(&self.pool)
      .await?
      .map(decode_user)
      .transpose()
  }

  async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(FIND_USER_BY_EMAIL)
      .bind(email)
      .fetch_optional(&self.pool)
      .await?
      .map(decode_user)
      .transpose()
  }

  async fn find_users(&self, ids: &[Uuid]) -> ApiResult<Vec<User>> {
    if ids.is_empty() {
      return Ok(vec![]);
    }

    let mut builder = QueryBuilder::<Sqlite>::new("SELECT password, document FROM users WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
      separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    builder
      .build_query_as::<UserRow>()
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(decode_user)
      .collect()
  }

  async fn update_user(&self, user: &User) -> ApiResult<()> {
    let result = sqlx::query(UPDATE_USER)
      .bind(&user.email)
      .bind(&user.password)
      .bind(serde_json::to_string(user)?)
      .bind(user.id)
      .execute(&self.pool)
      .await
      .map_err(|e| map_unique_violation(e, &user.email))?;

    match result.rows_affected() {
      0 => Err(ApiError::ResourceNotFound(user.id.to_string())),
      _ => Ok(()),
    }
  }

  async fn list_freelancers(&self, filter: &FreelancerFilter) -> ApiResult<Vec<User>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT password, document FROM users WHERE role = ");
    builder.push_bind(Role::Freelancer.to_string());

    if let Some(max) = filter.max_hourly_rate {
      builder
        .push(" AND json_extract(document, '$.hourlyRate') <= ")
        .push_bind(max);
    }
    if !filter.skills.is_empty() {
      builder.push(" AND EXISTS (SELECT 1 FROM json_each(users.document, '$.skills') AS s WHERE lower(s.value) IN (");
      let mut separated = builder.separated(", ");
      for skill in &filter.skills {
        separated.push_bind(skill.to_lowercase());
      }
      separated.push_unseparated("))");
    }
    builder.push(" ORDER BY created_at DESC");

    builder
      .build_query_as::<UserRow>()
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(decode_user)
      .collect()
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn ping(&self) -> ApiResult<()> {
    sqlx::query("SELECT 1").execute(&self.pool).await?;
    Ok(())
  }
}

fn push_project_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProjectFilter) {
  builder.push(" WHERE 1 = 1");

  if let Some(category) = filter.category {
    builder.push(" AND category = ").push_bind(category.to_string());
  }
  if let Some(status) = filter.status {
    builder.push(" AND status = ").push_bind(status.to_string());
  }
  if let Some(min) = filter.min_budget {
    builder.push(" AND budget >= ").push_bind(min);
  }
  if let Some(max) = filter.max_budget {
    builder.push(" AND budget <= ").push_bind(max);
  }
  if let Some(owner_id) = filter.owner_id {
    builder.push(" AND owner_id = ").push_bind(owner_id);
  }
  if let Some(freelancer_id) = filter.freelancer_id {
    builder.push(" AND freelancer_id = ").push_bind(freelancer_id);
  }
  if let Some(id) = filter.exclude_id {
    builder.push(" AND id <> ").push_bind(id);
  }
  if !filter.skills.is_empty() {
    builder.push(" AND EXISTS (SELECT 1 FROM json_each(projects.document, '$.skills') AS s WHERE lower(s.value) IN (");
    let mut separated = builder.separated(", ");
    for skill in &filter.skills {
      separated.push_bind(skill.to_lowercase());
    }
    separated.push_unseparated("))");
  }
  if let Some(search) = filter.search.as_deref() {
    builder
      .push(" AND instr(search_text, ")
      .push_bind(search.to_lowercase())
      .push(") > 0");
  }
}

/// Lowercased title, description and skills. SQLite's `lower()` only folds
/// ASCII, so the text is folded here the same way `ProjectFilter::matches` does.
fn search_text(project: &Project) -> String {
  let mut fields = vec![project.title.to_lowercase(), project.description.to_lowercase()];
  fields.extend(project.skills.iter().map(|skill| skill.to_lowercase()));
  fields.join(SEARCH_TEXT_SEPARATOR)
}

fn decode_project((version, document): ProjectRow) -> ApiResult<Project> {
  let mut project: Project = serde_json::from_str(&document)?;
  project.version = version;
  Ok(project)
}

fn decode_user((password, document): UserRow) -> ApiResult<User> {
  let mut user: User = serde_json::from_str(&document)?;
  user.password = password;
  Ok(user)
}

fn map_unique_violation(error: sqlx::Error, email: &str) -> ApiError {
  match &error {
    sqlx::Error::Database(db_error) if db_error.is_unique_violation() => ApiError::UserAlreadyExist(email.to_string()),
    _ => ApiError::DatabaseError(error),
  }
}
