use log::LevelFilter;
use pfas_calc_core::resolve_scenario;

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8788";
const DEFAULT_SCENARIO: &str = "worst-case";
const DEFAULT_SESSION_TTL_MS: u64 = 30 * 60 * 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: Transport,
    pub http_addr: String,
    /// Scenario id used when a request names none; always resolvable.
    pub default_scenario: String,
    pub access_key: Option<String>,
    pub session_ttl_ms: u64,
    pub log_level: LevelFilter,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let transport = match env_trimmed("PFAS_CALCD_TRANSPORT").as_deref() {
            None | Some("stdio") => Transport::Stdio,
            Some("http") => Transport::Http,
            Some(other) => {
                return Err(format!(
                    "PFAS_CALCD_TRANSPORT must be stdio or http, got {other}"
                ))
            }
        };
        let http_addr =
            env_trimmed("PFAS_CALC_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let scenario_id = env_trimmed("PFAS_CALC_DEFAULT_SCENARIO")
            .unwrap_or_else(|| DEFAULT_SCENARIO.to_string());
        let default_scenario = resolve_scenario(&scenario_id)
            .map_err(|err| format!("PFAS_CALC_DEFAULT_SCENARIO: {err}"))?
            .id
            .to_string();
        let session_ttl_ms = env_trimmed("PFAS_CALC_SESSION_TTL_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SESSION_TTL_MS)
            .clamp(1_000, 86_400_000);
        let log_level = env_trimmed("PFAS_CALC_LOG")
            .and_then(|v| v.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);

        Ok(Self {
            transport,
            http_addr,
            default_scenario,
            access_key: std::env::var("PFAS_CALC_ACCESS_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            session_ttl_ms,
            log_level,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            default_scenario: DEFAULT_SCENARIO.to_string(),
            access_key: None,
            session_ttl_ms: DEFAULT_SESSION_TTL_MS,
            log_level: LevelFilter::Info,
        }
    }
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
