// src/core/mod.rs

pub mod arguments;
pub mod builder;
pub mod context;
pub mod dispatcher;
pub mod parser;
pub mod preconditions;
pub mod results;
pub mod search;
pub mod services;
