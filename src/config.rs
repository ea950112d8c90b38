use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,

    // Remote model credentials
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_base_url: String,
    pub openai_base_url: String,

    // Embedding settings
    pub embedding_engine: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,

    // Generation settings
    pub generation_engine: String,
    pub generation_model: String,
    pub temperature: f32,
    pub top_k: usize,
    pub persona_name: String,
    pub persona_role: String,

    // Knowledge base
    pub profile_path: String,
    pub vector_db: String,
    pub sqlite_path: String,
    pub chroma_url: Option<String>,
    pub chroma_database: String,
    pub chroma_auth_token: Option<String>,
    pub collection_name: String,

    pub remote_timeout_seconds: u64,
    pub cors_allow_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,

            gemini_api_key: None,
            openai_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),

            // text-embedding-004 produces 768-dim vectors
            embedding_engine: "gemini".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            embedding_dimension: 768,

            generation_engine: "gemini".to_string(),
            generation_model: "gemini-2.5-flash-lite".to_string(),
            temperature: 0.3,
            top_k: 4,
            persona_name: "Rohit Singh".to_string(),
            persona_role: "a Senior Software Engineer (EXL Service, VS Code, Python, Backend)"
                .to_string(),

            profile_path: "rohit_portfolio_profile_full.md".to_string(),
            vector_db: "sqlite".to_string(),
            sqlite_path: "data/rag_store.db".to_string(),
            chroma_url: None,
            chroma_database: "default_database".to_string(),
            chroma_auth_token: None,
            collection_name: "profile_chunks".to_string(),

            remote_timeout_seconds: 60,
            cors_allow_origin: "*".to_string(),
        }
    }
}

/// Read and parse an optional environment variable.
fn parse_env<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let mut config = Config::default();

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }

        if let Some(port) = parse_env("PORT")? {
            config.port = port;
        }

        config.gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        config.openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

        if let Ok(url) = env::var("GEMINI_API_BASE_URL") {
            config.gemini_base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(url) = env::var("OPENAI_API_BASE_URL") {
            config.openai_base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(engine) = env::var("RAG_EMBEDDING_ENGINE") {
            config.embedding_engine = engine.to_lowercase();
        }

        if let Ok(model) = env::var("RAG_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }

        if let Some(dimension) = parse_env("RAG_EMBEDDING_DIMENSION")? {
            config.embedding_dimension = dimension;
        }

        if let Ok(engine) = env::var("RAG_GENERATION_ENGINE") {
            config.generation_engine = engine.to_lowercase();
        }

        if let Ok(model) = env::var("RAG_GENERATION_MODEL") {
            config.generation_model = model;
        }

        if let Some(temperature) = parse_env("RAG_TEMPERATURE")? {
            config.temperature = temperature;
        }

        if let Some(top_k) = parse_env("RAG_TOP_K")? {
            config.top_k = top_k;
        }

        if let Ok(name) = env::var("PERSONA_NAME") {
            config.persona_name = name;
        }

        if let Ok(role) = env::var("PERSONA_ROLE") {
            config.persona_role = role;
        }

        if let Ok(path) = env::var("PROFILE_PATH") {
            config.profile_path = path;
        }

        if let Ok(vector_db) = env::var("VECTOR_DB") {
            config.vector_db = vector_db;
        }

        if let Ok(path) = env::var("SQLITE_PATH") {
            config.sqlite_path = path;
        }

        config.chroma_url = env::var("CHROMA_URL").ok().filter(|u| !u.is_empty());

        if let Ok(database) = env::var("CHROMA_DATABASE") {
            config.chroma_database = database;
        }

        config.chroma_auth_token = env::var("CHROMA_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        if let Ok(name) = env::var("COLLECTION_NAME") {
            config.collection_name = name;
        }

        if let Some(timeout) = parse_env("REMOTE_TIMEOUT_SECONDS")? {
            config.remote_timeout_seconds = timeout;
        }

        if let Ok(origin) = env::var("CORS_ALLOW_ORIGIN") {
            config.cors_allow_origin = origin;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.embedding_dimension == 0 {
            return Err(AppError::Config(
                "RAG_EMBEDDING_DIMENSION must be greater than zero".to_string(),
            ));
        }

        if self.top_k == 0 {
            return Err(AppError::Config(
                "RAG_TOP_K must be greater than zero".to_string(),
            ));
        }

        // Used as a SQLite table name and a Chroma collection name
        let valid_name = !self.collection_name.is_empty()
            && self
                .collection_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(AppError::Config(format!(
                "Invalid COLLECTION_NAME: {}",
                self.collection_name
            )));
        }

        Ok(())
    }

    /// API key for the given remote engine, if one is configured.
    pub fn api_key_for(&self, engine: &str) -> Option<&str> {
        match engine {
            "gemini" => self.gemini_api_key.as_deref(),
            "openai" => self.openai_api_key.as_deref(),
            _ => None,
        }
    }

    /// Shared HTTP client for the remote model calls.
    pub fn http_client(&self) -> Result<reqwest::Client, AppError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.remote_timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
    }
}
