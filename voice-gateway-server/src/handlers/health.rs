use axum::{extract::State, response::Json};
use serde::Serialize;
use std::collections::BTreeMap;
use voice_providers::Capability;

use crate::routes::{route_table, Access};
use crate::server::GatewayServer;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub timestamp: String,
    pub service: String,
    pub version: String,
    pub status: String,
}

/// Providers available for one capability
#[derive(Debug, Serialize)]
pub struct CapabilityStatus {
    pub available: bool,
    pub providers: Vec<String>,
    /// Provider used when a request names none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    #[serde(flatten)]
    pub health: HealthResponse,
    pub services: BTreeMap<String, CapabilityStatus>,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub access: Access,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

fn health_of(server: &GatewayServer, status: &str) -> HealthResponse {
    HealthResponse {
        ok: true,
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: server.config.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: status.to_string(),
    }
}

/// Service information handler
pub async fn service_info(State(server): State<GatewayServer>) -> Json<ServiceInfo> {
    let endpoints = route_table()
        .into_iter()
        .map(|entry| EndpointInfo {
            method: entry.method,
            path: entry.path,
            access: entry.effective_access(&server.config.auth),
        })
        .collect();

    Json(ServiceInfo {
        name: server.config.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Speech-to-text, translation, LLM and text-to-speech gateway for Tamil voice apps",
        endpoints,
    })
}

/// Health check handler
pub async fn health_check(State(server): State<GatewayServer>) -> Json<HealthResponse> {
    Json(health_of(&server, "healthy"))
}

/// Detailed health handler
///
/// Reports `degraded` when speech, reply or voice capabilities have no
/// registered provider.
pub async fn detailed_health(State(server): State<GatewayServer>) -> Json<DetailedHealthResponse> {
    let registry = &server.registry;
    let pipeline = &server.config.pipeline;

    let services: BTreeMap<String, CapabilityStatus> = Capability::ALL
        .into_iter()
        .map(|capability| {
            let mut providers = registry.registered(capability);
            providers.sort();
            let default = match capability {
                Capability::Stt => pipeline.default_stt,
                Capability::Translate => pipeline.translation.default,
                Capability::Tts => pipeline.default_tts,
                Capability::Llm => pipeline.default_llm,
            };
            let fallback = match capability {
                Capability::Stt => registry.stt().fallback_order().iter().map(|p| p.to_string()).collect(),
                _ => Vec::new(),
            };
            let status = CapabilityStatus {
                available: !providers.is_empty(),
                default: providers.contains(&default).then(|| default.to_string()),
                providers: providers.iter().map(|p| p.to_string()).collect(),
                fallback,
            };
            (capability.to_string(), status)
        })
        .collect();

    let degraded = [Capability::Stt, Capability::Tts, Capability::Llm]
        .iter()
        .any(|cap| !services.get(cap.as_str()).is_some_and(|s| s.available));

    Json(DetailedHealthResponse {
        health: health_of(&server, if degraded { "degraded" } else { "healthy" }),
        services,
        uptime_seconds: server.uptime_seconds(),
        active_sessions: server.sessions.len(),
    })
}
