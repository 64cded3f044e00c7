pub mod agent;
pub mod banner;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod consts;
pub mod conversation;
pub mod env;
pub mod events;
pub mod llm;
pub mod logging;
pub mod spinner;
pub mod template;
