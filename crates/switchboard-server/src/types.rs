//! Request and response types for the API

use serde::{Deserialize, Serialize};

use switchboard_core::ai::ConversationItem;

// ============================================================================
// Session Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    /// Omitted when auth is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Committed state of a session
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub agent: String,
    pub items: Vec<ConversationItem>,
}

// ============================================================================
// Chat Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub stream: bool,
    /// Used when no bearer header is sent
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    /// Agent that will handle the next turn
    pub agent: String,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub auth_enabled: bool,
    pub engine_configured: bool,
}
