#![allow(dead_code)]

pub const TEST_PASSWORD: &str = "Secret123!";
pub const TEST_AVATAR: &str = "https://cdn.example.com/avatars/default.png";

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
