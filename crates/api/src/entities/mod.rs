pub mod milestone;
pub mod project;
pub mod proposal;
pub mod user;
