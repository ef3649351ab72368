pub mod actions;
pub mod brain;
pub mod config;
pub mod derived;
pub mod integrations;
pub mod lifecycle;
pub mod llm;
pub mod oauth;
pub mod session;
pub mod store;
pub mod terminal;
pub mod vault;
