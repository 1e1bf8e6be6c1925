#![forbid(unsafe_code)]

pub mod cli;
pub mod cookies;
pub mod download;
pub mod embedded;
pub mod epub;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pdf;
pub mod repair;
pub mod schema;
pub mod source;
pub mod walker;
