//! Logging service client module

mod http;

pub use http::HttpClient;
