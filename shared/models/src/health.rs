use serde::{Deserialize, Serialize};

/// GET /models response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelsResponse {
    pub default: String,
    pub allowed: Vec<String>,
}

/// Connectivity of each backing service, reported as "ok" or "error".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceStatus {
    pub openrouter: String,
    pub google_drive: String,
    pub google_sheets: String,
}

impl ServiceStatus {
    pub fn from_checks(openrouter: bool, google_drive: bool, google_sheets: bool) -> Self {
        let label = |ok: bool| if ok { "ok" } else { "error" }.to_string();
        Self {
            openrouter: label(openrouter),
            google_drive: label(google_drive),
            google_sheets: label(google_sheets),
        }
    }

    pub fn all_ok(&self) -> bool {
        [&self.openrouter, &self.google_drive, &self.google_sheets]
            .iter()
            .all(|status| status.as_str() == "ok")
    }
}

/// GET /healthz response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub services: ServiceStatus,
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(services: ServiceStatus, timestamp: String) -> Self {
        let status = if services.all_ok() { "healthy" } else { "degraded" };
        Self {
            status: status.to_string(),
            services,
            timestamp,
        }
    }
}
