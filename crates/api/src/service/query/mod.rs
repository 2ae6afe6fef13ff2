pub mod projects;
pub mod users;

/// Number of pages needed for `total_count` items, `limit` per page.
pub(crate) fn calculate_total_pages(total_count: i64, limit: i64) -> i64 {
  (total_count as f64 / limit as f64).ceil() as i64
}
