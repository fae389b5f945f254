pub mod aggregate;
pub mod checker;
pub mod config;
pub mod host;
pub mod record;
pub mod render;
pub mod routes;
pub mod runner;
pub mod staging;
pub mod supervisor;
pub mod value;
pub mod web_server;
pub mod worker;
