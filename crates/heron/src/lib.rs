pub mod agent;
pub mod apitest;
pub mod errors;
pub mod models;
pub mod prompts;
pub mod providers;
pub mod systems;
pub mod weather;
