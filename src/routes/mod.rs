pub mod auth;
pub mod health;
pub mod me;
pub mod permission_definitions;
pub mod permission_groups;
