use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Freelancer,
  Entrepreneur,
  Investor,
  /// Kept for documents written by the legacy admin portal.
  Admin,
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Role::Freelancer => write!(f, "freelancer"),
      Role::Entrepreneur => write!(f, "entrepreneur"),
      Role::Investor => write!(f, "investor"),
      Role::Admin => write!(f, "admin"),
    }
  }
}

impl FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "freelancer" => Ok(Role::Freelancer),
      "entrepreneur" => Ok(Role::Entrepreneur),
      "investor" => Ok(Role::Investor),
      "admin" => Ok(Role::Admin),
      _ => Err(format!("'{}' is not a valid role", s)),
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SocialLinks {
  pub linkedin: Option<String>,
  pub github: Option<String>,
  pub twitter: Option<String>,
  pub website: Option<String>,
}

/// Profile fields shared by every role.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
  pub bio: Option<String>,
  pub skills: Vec<String>,
  pub location: Option<String>,
  #[serde(alias = "profilePicture")]
  pub avatar: Option<String>,
  pub social: SocialLinks,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Experience {
  pub title: String,
  pub company: String,
  pub years: Option<u32>,
  pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Education {
  pub degree: String,
  pub institution: String,
  pub year: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Company {
  pub name: String,
  pub description: Option<String>,
  pub website: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct TicketSize {
  pub min: Option<f64>,
  pub max: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct InvestmentPreferences {
  pub sectors: Vec<String>,
  pub stage_preference: Vec<String>,
  pub typical_ticket_size: Option<TicketSize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct FreelancerDetails {
  pub hourly_rate: Option<f64>,
  pub experience: Vec<Experience>,
  pub education: Vec<Education>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct EntrepreneurDetails {
  pub company: Option<Company>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct InvestorDetails {
  pub investment_preferences: Option<InvestmentPreferences>,
}

/// Role of a user together with the fields that only make sense for it.
/// Serialized inline with the user document, tagged by `role`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleDetails {
  Freelancer(FreelancerDetails),
  Entrepreneur(EntrepreneurDetails),
  Investor(InvestorDetails),
  Admin,
}

impl RoleDetails {
  pub fn for_role(role: Role) -> Self {
    match role {
      Role::Freelancer => RoleDetails::Freelancer(FreelancerDetails::default()),
      Role::Entrepreneur => RoleDetails::Entrepreneur(EntrepreneurDetails::default()),
      Role::Investor => RoleDetails::Investor(InvestorDetails::default()),
      Role::Admin => RoleDetails::Admin,
    }
  }

  pub fn role(&self) -> Role {
    match self {
      RoleDetails::Freelancer(_) => Role::Freelancer,
      RoleDetails::Entrepreneur(_) => Role::Entrepreneur,
      RoleDetails::Investor(_) => Role::Investor,
      RoleDetails::Admin => Role::Admin,
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: Uuid,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  #[serde(skip_serializing, default)]
  pub password: String,
  #[serde(flatten)]
  pub profile: Profile,
  #[serde(flatten)]
  pub details: RoleDetails,
  #[serde(default)]
  pub is_verified: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl User {
  pub fn role(&self) -> Role {
    self.details.role()
  }

  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name).trim().to_string()
  }

  pub fn hourly_rate(&self) -> Option<f64> {
    match &self.details {
      RoleDetails::Freelancer(details) => details.hourly_rate,
      _ => None,
    }
  }
}

/// Public identity of a user as embedded in project responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
  pub id: Uuid,
  pub name: String,
  pub avatar: Option<String>,
  pub skills: Vec<String>,
}

impl UserSummary {
  /// Summary for a reference whose user document no longer exists.
  pub fn missing(id: Uuid) -> Self {
    Self {
      id,
      name: String::new(),
      avatar: None,
      skills: vec![],
    }
  }
}

impl From<&User> for UserSummary {
  fn from(user: &User) -> Self {
    Self {
      id: user.id,
      name: user.full_name(),
      avatar: user.profile.avatar.clone(),
      skills: user.profile.skills.clone(),
    }
  }
}
