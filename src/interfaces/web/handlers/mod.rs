pub mod auth;
pub mod chat;
pub mod coaching;
pub mod daily_work;
pub mod dashboard;
pub mod equipment;
pub mod failures;
pub mod integrations;
pub mod maintenance;
pub mod resolved;
