use anyhow::{anyhow, Context};
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use secrecy::{ExposeSecret, SecretBox};
use serde::Deserialize;
use tokio::task;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
  entities::user::{
    Company, Education, Experience, InvestmentPreferences, Profile, Role, RoleDetails, SocialLinks, User,
  },
  error::{ApiError, ApiResult},
  store::Store,
};

pub const PASSWORD_MIN_CHARS: usize = 6;

#[derive(Debug, Deserialize)]
pub struct LoginParams {
  pub email: String,
  pub password: SecretBox<String>,
}

pub async fn login(store: &dyn Store, params: LoginParams) -> ApiResult<User> {
  let user = store
    .find_user_by_email(&normalize_email(&params.email))
    .await?
    .ok_or(ApiError::InvalidCredentials())?;

  verify_password(SecretBox::from(Box::new(user.password.to_owned())), params.password).await?;
  Ok(user)
}

#[derive(Debug, Deserialize)]
pub struct RegisterParams {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub password: SecretBox<String>,
  pub role: Role,
}

/// Registers a new user with an empty profile for the chosen role
///
/// # Errors
/// - InvalidInput if the role is `admin` or the password is too short
/// - UserAlreadyExist if the email is taken, ignoring case
pub async fn register(store: &dyn Store, mut params: RegisterParams, now: DateTime<Utc>) -> ApiResult<User> {
  if params.role == Role::Admin {
    return Err(ApiError::InvalidInput("The admin role cannot be self-assigned".to_string()));
  }
  ensure_password_length(&params.password)?;

  let email = normalize_email(&params.email);
  if store.find_user_by_email(&email).await?.is_some() {
    return Err(ApiError::UserAlreadyExist(email));
  }

  let password = std::mem::take(&mut params.password);
  let hashed_password = hash_password(password).await?;

  let user = User {
    id: Uuid::new_v4(),
    first_name: params.first_name.trim().to_string(),
    last_name: params.last_name.trim().to_string(),
    email,
    password: hashed_password,
    profile: Profile::default(),
    details: RoleDetails::for_role(params.role),
    is_verified: false,
    created_at: now,
    updated_at: now,
  };
  store.insert_user(&user).await?;

  info!("Registered {} {}", user.role(), user.id);

  Ok(user)
}

/// Fields that only apply to one role.
#[derive(Debug, Default)]
pub struct RoleChanges {
  pub hourly_rate: Option<f64>,
  pub experience: Option<Vec<Experience>>,
  pub education: Option<Vec<Education>>,
  pub company: Option<Company>,
  pub investment_preferences: Option<InvestmentPreferences>,
}

#[derive(Debug, Default)]
pub struct ProfileChanges {
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub email: Option<String>,
  pub password: Option<SecretBox<String>>,
  pub bio: Option<String>,
  pub skills: Option<Vec<String>>,
  pub location: Option<String>,
  pub avatar: Option<String>,
  pub social: Option<SocialLinks>,
  pub role_details: RoleChanges,
}

/// Updates the caller's own profile. The role never changes; fields of
/// another role are rejected.
pub async fn update_profile(
  store: &dyn Store,
  user: User,
  params: ProfileChanges,
  now: DateTime<Utc>,
) -> ApiResult<User> {
  let mut user = user;

  apply_role_changes(&mut user.details, params.role_details)?;

  if let Some(first_name) = params.first_name {
    user.first_name = first_name.trim().to_string();
  }
  if let Some(last_name) = params.last_name {
    user.last_name = last_name.trim().to_string();
  }
  if let Some(email) = params.email {
    user.email = normalize_email(&email);
  }
  if let Some(bio) = params.bio {
    user.profile.bio = Some(bio);
  }
  if let Some(skills) = params.skills {
    user.profile.skills = skills;
  }
  if let Some(location) = params.location {
    user.profile.location = Some(location);
  }
  if let Some(avatar) = params.avatar {
    user.profile.avatar = Some(avatar);
  }
  if let Some(social) = params.social {
    user.profile.social = social;
  }
  if let Some(password) = params.password {
    ensure_password_length(&password)?;
    user.password = hash_password(password).await?;
  }
  user.updated_at = now;

  store.update_user(&user).await?;

  Ok(user)
}

fn apply_role_changes(details: &mut RoleDetails, changes: RoleChanges) -> ApiResult<()> {
  let role = details.role();
  let RoleChanges {
    hourly_rate,
    experience,
    education,
    company,
    investment_preferences,
  } = changes;

  let freelancer_fields = [
    ("hourlyRate", hourly_rate.is_some()),
    ("experience", experience.is_some()),
    ("education", education.is_some()),
  ];
  let entrepreneur_fields = [("company", company.is_some())];
  let investor_fields = [("investmentPreferences", investment_preferences.is_some())];

  match details {
    RoleDetails::Freelancer(freelancer) => {
      reject_foreign_fields(role, entrepreneur_fields.iter().chain(&investor_fields))?;

      if let Some(rate) = hourly_rate {
        if !rate.is_finite() || rate < 0.0 {
          return Err(ApiError::InvalidInput("hourlyRate must be a non-negative number".to_string()));
        }
        freelancer.hourly_rate = Some(rate);
      }
      if let Some(experience) = experience {
        freelancer.experience = experience;
      }
      if let Some(education) = education {
        freelancer.education = education;
      }
    },
    RoleDetails::Entrepreneur(entrepreneur) => {
      reject_foreign_fields(role, freelancer_fields.iter().chain(&investor_fields))?;

      if let Some(company) = company {
        entrepreneur.company = Some(company);
      }
    },
    RoleDetails::Investor(investor) => {
      reject_foreign_fields(role, freelancer_fields.iter().chain(&entrepreneur_fields))?;

      if let Some(preferences) = investment_preferences {
        investor.investment_preferences = Some(preferences);
      }
    },
    RoleDetails::Admin => {
      reject_foreign_fields(
        role,
        freelancer_fields
          .iter()
          .chain(&entrepreneur_fields)
          .chain(&investor_fields),
      )?;
    },
  }

  Ok(())
}

fn reject_foreign_fields<'a>(role: Role, fields: impl Iterator<Item = &'a (&'static str, bool)>) -> ApiResult<()> {
  let foreign: Vec<&str> = fields.filter(|(_, present)| *present).map(|(name, _)| *name).collect();

  if foreign.is_empty() {
    Ok(())
  } else {
    Err(ApiError::InvalidInput(format!(
      "{} cannot be set for the {} role",
      foreign.join(", "),
      role
    )))
  }
}

fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}

fn ensure_password_length(password: &SecretBox<String>) -> ApiResult<()> {
  if password.expose_secret().chars().count() < PASSWORD_MIN_CHARS {
    return Err(ApiError::InvalidInput(format!(
      "Password must be at least {PASSWORD_MIN_CHARS} characters"
    )));
  }
  Ok(())
}

async fn hash_password(password: SecretBox<String>) -> ApiResult<String> {
  task::spawn_blocking(move || {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params::new(15000, 2, 1, None).map_err(|err| anyhow!("invalid argon2 params: {err}"))?;
    let argon2_config = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2_config
      .hash_password(password.expose_secret().as_bytes(), &salt)
      .map_err(|err| {
        error!("Failed to hash password: {}", err);
        ApiError::InvalidCredentials()
      })
      .map(|hash| hash.to_string())
  })
  .await
  .context("panic in hash_password()")?
}

async fn verify_password(
  expected_password_hash: SecretBox<String>,
  password_candidate: SecretBox<String>,
) -> ApiResult<()> {
  task::spawn_blocking(move || {
    let parsed_hash = PasswordHash::new(expected_password_hash.expose_secret()).map_err(|err| {
      info!("Failed to parse password hash: {}", err);
      ApiError::InvalidCredentials()
    })?;

    Argon2::default()
      .verify_password(password_candidate.expose_secret().as_bytes(), &parsed_hash)
      .map_err(|_| ApiError::InvalidCredentials())
  })
  .await
  .context("panic in verify_password()")?
}
