//! HTTP transport: header construction and the retrying client.

pub mod headers;
pub mod http;

pub use headers::Credentials;
pub use http::{RetryPolicy, TypebotHttpClient};
