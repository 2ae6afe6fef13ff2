pub mod milestones;
pub mod projects;
pub mod proposals;
pub mod users;
