pub mod auth;
pub mod milestones;
pub mod projects;
pub mod proposals;
pub mod users;

/// Splits a comma separated query value, dropping blank entries.
pub(crate) fn split_list(value: Option<&str>) -> Vec<String> {
  value
    .unwrap_or_default()
    .split(',')
    .map(str::trim)
    .filter(|item| !item.is_empty())
    .map(str::to_string)
    .collect()
}
