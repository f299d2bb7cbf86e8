pub mod config;
pub mod entity;
pub mod fetch;
pub mod locations;
pub mod output;
pub mod pacer;
pub mod parser;
pub mod queue;
pub mod reconcile;
pub mod routes;
pub mod runtime;
pub mod source;
pub mod stats;
