pub mod clock;
pub mod error;
pub mod render;
pub mod routes;
pub mod service;
pub mod short_code;
