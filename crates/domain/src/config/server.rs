use serde::{Deserialize, Serialize};

/// HTTP/WebSocket server binding and CORS/origin policy (§6.1, §6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Permit `http://localhost:*` / `http://127.0.0.1:*` regardless of
    /// `cors.allowed_origins` (§6.1 "localhost permitted in dev mode").
    #[serde(default)]
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
            dev_mode: false,
        }
    }
}

/// Origin allow-list for the WebSocket transport (`ALLOWED_ORIGINS`, §6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "d_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_allowed_origins(),
        }
    }
}

impl CorsConfig {
    pub fn is_allowed(&self, origin: &str, dev_mode: bool) -> bool {
        if dev_mode && (origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1"))
        {
            return true;
        }
        self.allowed_origins.iter().any(|o| o == origin || o == "*")
    }
}

fn d_port() -> u16 {
    3210
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_allowed_origins() -> Vec<String> {
    vec![]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token. Unset disables
    /// the admin endpoints entirely.
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "CONDUCTOR_ADMIN_TOKEN".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_mode_allows_localhost_regardless_of_list() {
        let cors = CorsConfig { allowed_origins: vec![] };
        assert!(cors.is_allowed("http://localhost:5173", true));
        assert!(!cors.is_allowed("http://localhost:5173", false));
    }

    #[test]
    fn explicit_allow_list_matches_exactly() {
        let cors = CorsConfig {
            allowed_origins: vec!["https://app.example.com".into()],
        };
        assert!(cors.is_allowed("https://app.example.com", false));
        assert!(!cors.is_allowed("https://evil.example.com", false));
    }
}
