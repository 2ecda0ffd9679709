//! Database layer: schema setup and row converters.

pub mod converters;
pub mod schema;
