// Library for tests to access modules

pub mod actions;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod flatten;
pub mod models;
pub mod poller;
pub mod publish;
pub mod rates;
pub mod remote;
pub mod routes;
pub mod sampler;
pub mod store;
