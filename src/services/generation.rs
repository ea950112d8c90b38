use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;

/// Error types for text generation
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Trait for remote text generation providers
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system_instruction: &str,
        temperature: f32,
    ) -> Result<String, GenerationError>;

    fn model_name(&self) -> &str;
}

/// The first-person advocate the model speaks as.
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub role: String,
}

/// Fixed refusal the model is told to use when the context lacks an answer.
pub const MISSING_DETAILS_REPLY: &str =
    "I don't have specific details on that in my current knowledge base.";

impl Persona {
    pub fn new(name: &str, role: &str) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
        }
    }

    pub fn system_instruction(&self) -> String {
        format!(
            "You are an elite AI Portfolio Agent ({name}'s AI).\n\
             **Role:** Represent {name}, {role}, to recruiters.\n\
             **Goal:** Impress the user with high-impact, business-oriented answers grounded strictly in the provided context.\n\
             **Tone:** Professional, confident, technically precise, and concise.\n\
             **Process:**\n\
             1. ANALYZE the retrieved context chunks.\n\
             2. PLAN the answer (identify key achievements, metrics, ownership/roles).\n\
             3. GENERATE a structured response (use BOLD for impact, Lists for readability).\n\
             4. NEVER mention 'retrieved context' or 'chunks' in the output. Just answer naturally.\n\
             **Constraints:**\n\
             - STRICTLY GROUNDED: Do not invent facts outside the context.\n\
             - If the info is missing, say: '{refusal}'\n",
            name = self.name,
            role = self.role,
            refusal = MISSING_DETAILS_REPLY,
        )
    }
}

pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "### RETRIEVED CONTEXT:\n{}\n\n### QUESTION:\n{}\n\n### AGENT RESPONSE:",
        context, question
    )
}

/// Persona-bound wrapper around a [`GenerationProvider`]
pub struct AnswerGenerator {
    provider: Arc<dyn GenerationProvider>,
    persona: Persona,
    temperature: f32,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn GenerationProvider>, persona: Persona, temperature: f32) -> Self {
        Self {
            provider,
            persona,
            temperature,
        }
    }

    pub async fn generate(&self, context: &str, question: &str) -> Result<String, GenerationError> {
        let prompt = build_user_prompt(context, question);
        let system_instruction = self.persona.system_instruction();

        debug!(
            "Generating answer with {} ({} chars of context)",
            self.provider.model_name(),
            context.len()
        );

        self.provider
            .generate(&prompt, &system_instruction, self.temperature)
            .await
    }
}

/// Gemini `generateContent` provider
pub struct GeminiGeneration {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiGeneration {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        info!("Initialized Gemini generation: model={}", model);

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
        }
    }

    fn build_request_body(prompt: &str, system_instruction: &str, temperature: f32) -> Value {
        json!({
            "system_instruction": {
                "parts": [{ "text": system_instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": temperature
            }
        })
    }

    /// Concatenate the text parts of the first candidate.
    fn parse_response(data: &Value) -> Result<String, GenerationError> {
        let text: String = data
            .pointer("/candidates/0/content/parts")
            .and_then(|parts| parts.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            let reason = data
                .pointer("/promptFeedback/blockReason")
                .or_else(|| data.pointer("/candidates/0/finishReason"))
                .and_then(|v| v.as_str())
                .unwrap_or("no text in response");
            return Err(GenerationError::InvalidResponse(reason.to_string()));
        }

        Ok(text)
    }
}

#[async_trait::async_trait]
impl GenerationProvider for GeminiGeneration {
    async fn generate(
        &self,
        prompt: &str,
        system_instruction: &str,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = Self::build_request_body(prompt, system_instruction, temperature);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                GenerationError::ApiError(format!("Request to Gemini API failed: {}", e))
            })?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| GenerationError::ApiError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(GenerationError::ApiError(format!(
                "Gemini returned {}: {}",
                status, body_text
            )));
        }

        let data: Value = serde_json::from_str(&body_text)
            .map_err(|e| GenerationError::InvalidResponse(format!("Invalid JSON: {}", e)))?;

        Self::parse_response(&data)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI-compatible chat completion provider
pub struct OpenAIGeneration {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIGeneration {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        let client = Client::with_config(config).with_http_client(http);

        info!("Initialized OpenAI generation: model={}", model);

        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl GenerationProvider for OpenAIGeneration {
    async fn generate(
        &self,
        prompt: &str,
        system_instruction: &str,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let build_err = |e: async_openai::error::OpenAIError| {
            GenerationError::InvalidResponse(format!("Failed to build request: {}", e))
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(temperature)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_instruction)
                    .build()
                    .map_err(build_err)?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(build_err)?
                    .into(),
            ])
            .build()
            .map_err(build_err)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GenerationError::ApiError(format!("OpenAI API error: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| GenerationError::InvalidResponse("no text in response".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory for creating generation providers
pub struct GenerationFactory;

impl GenerationFactory {
    /// Create the provider selected by `RAG_GENERATION_ENGINE`
    pub fn from_config(
        config: &Config,
        http: reqwest::Client,
    ) -> Result<Arc<dyn GenerationProvider>, GenerationError> {
        let engine = config.generation_engine.as_str();

        info!("Creating generation provider: {}", engine);

        match (engine, config.api_key_for(engine)) {
            ("gemini", Some(key)) => Ok(Arc::new(GeminiGeneration::new(
                http,
                &config.gemini_base_url,
                key,
                &config.generation_model,
            ))),
            ("openai", Some(key)) => Ok(Arc::new(OpenAIGeneration::new(
                http,
                &config.openai_base_url,
                key,
                &config.generation_model,
            ))),
            ("gemini", None) | ("openai", None) => Err(GenerationError::ConfigError(format!(
                "No API key configured for generation engine: {}",
                engine
            ))),
            _ => Err(GenerationError::ConfigError(format!(
                "Unsupported generation engine: {}. Supported: gemini, openai",
                engine
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every call; answers with a fixed reply or fails.
    pub(crate) struct FakeGeneration {
        pub calls: AtomicUsize,
        pub last_prompt: Mutex<Option<String>>,
        pub reply: Result<String, String>,
    }

    impl FakeGeneration {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
                reply: Ok(reply.to_string()),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
                reply: Err(message.to_string()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl GenerationProvider for FakeGeneration {
        async fn generate(
            &self,
            prompt: &str,
            _system_instruction: &str,
            _temperature: f32,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            self.reply
                .clone()
                .map_err(GenerationError::ApiError)
        }

        fn model_name(&self) -> &str {
            "fake-generation"
        }
    }

    #[test]
    fn test_user_prompt_layout() {
        let prompt = build_user_prompt("## Skills\nRust", "What languages?");
        assert_eq!(
            prompt,
            "### RETRIEVED CONTEXT:\n## Skills\nRust\n\n### QUESTION:\nWhat languages?\n\n### AGENT RESPONSE:"
        );
    }

    #[test]
    fn test_system_instruction_names_persona() {
        let persona = Persona::new("Ada Lovelace", "an analytical engine programmer");
        let instruction = persona.system_instruction();

        assert!(instruction.contains("Ada Lovelace's AI"));
        assert!(instruction.contains("an analytical engine programmer"));
        assert!(instruction.contains(MISSING_DETAILS_REPLY));
        assert!(instruction.contains("NEVER mention 'retrieved context'"));
    }

    #[test]
    fn test_gemini_request_body() {
        let body = GeminiGeneration::build_request_body("prompt", "system", 0.3);

        assert_eq!(body["system_instruction"]["parts"][0]["text"], "system");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(body["contents"][0]["role"], "user");
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_gemini_parse_joins_parts() {
        let data = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "**Rust** " }, { "text": "and Python." }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            GeminiGeneration::parse_response(&data).unwrap(),
            "**Rust** and Python."
        );
    }

    #[test]
    fn test_gemini_parse_blocked_prompt() {
        let data = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        match GeminiGeneration::parse_response(&data) {
            Err(GenerationError::InvalidResponse(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_answer_generator_builds_prompt() {
        let provider = Arc::new(FakeGeneration::replying("answer"));
        let generator = AnswerGenerator::new(
            provider.clone(),
            Persona::new("Rohit Singh", "an engineer"),
            0.3,
        );

        let reply = generator.generate("context", "question").await.unwrap();

        assert_eq!(reply, "answer");
        assert_eq!(provider.call_count(), 1);
        let prompt = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("### RETRIEVED CONTEXT:\ncontext"));
        assert!(prompt.contains("### QUESTION:\nquestion"));
    }

    #[test]
    fn test_factory_requires_api_key() {
        let config = Config::default();
        let result = GenerationFactory::from_config(&config, reqwest::Client::new());
        assert!(matches!(result, Err(GenerationError::ConfigError(_))));
    }

    #[test]
    fn test_factory_builds_openai() {
        let config = Config {
            generation_engine: "openai".to_string(),
            generation_model: "gpt-4o-mini".to_string(),
            openai_api_key: Some("sk-test".to_string()),
            ..Config::default()
        };
        let provider = GenerationFactory::from_config(&config, reqwest::Client::new()).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o-mini");
    }
}
