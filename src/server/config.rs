use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Set the `Secure` attribute on auth cookies. Off only for plain-http
    /// local development.
    pub cookie_secure: bool,
    /// Base URL used when constructing share URLs returned to clients.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            cookie_secure: true,
            public_base_url: "http://localhost:3001".to_string(),
        }
    }
}
