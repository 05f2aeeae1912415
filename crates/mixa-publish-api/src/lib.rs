//! Client for the Mixa publishing service REST API.

mod client;

pub use client::{MixaApiClient, DEFAULT_API_BASE};
