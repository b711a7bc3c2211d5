#![allow(unused_imports)]

pub mod client;
pub mod constants;
pub mod server;

pub use client::{json_body, TestClient};
pub use server::TestServer;
