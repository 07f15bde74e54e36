// Error codes carried in the `error_code` field of API error responses

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
    pub const NO_SPEECH_DETECTED: &str = "VALIDATION_1004";
}

pub mod authentication {
    pub const INVALID_CREDENTIALS: &str = "AUTH_2001";
    pub const TOKEN_EXPIRED: &str = "AUTH_2002";
    pub const TOKEN_INVALID: &str = "AUTH_2003";
}

pub mod provider {
    pub const UNKNOWN_PROVIDER: &str = "PROVIDER_3001";
    pub const VENDOR_FAILURE: &str = "PROVIDER_3002";
    pub const TRANSCRIPTION_FAILED: &str = "PROVIDER_3003";
    pub const TRANSLATION_FAILED: &str = "PROVIDER_3004";
    pub const SYNTHESIS_FAILED: &str = "PROVIDER_3005";
    pub const REPLY_FAILED: &str = "PROVIDER_3006";
}

pub mod session {
    pub const SESSION_EXPIRED: &str = "SESSION_4001";
    pub const SESSION_NOT_FOUND: &str = "SESSION_4002";
}

pub mod system {
    pub const RATE_LIMITED: &str = "SYSTEM_5001";
    pub const INTERNAL: &str = "SYSTEM_5002";
}
