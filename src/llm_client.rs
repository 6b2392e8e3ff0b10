use std::env;
use std::sync::Arc;

use anyhow::Context;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client as AsyncOpenAiClient};
use async_trait::async_trait;
use tracing::instrument;

pub type SharedLlmClient = Arc<dyn LlmClient>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Canned replies for offline runs and tests; never calls out.
#[derive(Debug, Default, Clone)]
pub struct EchoLlmClient;

#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(format!(
            "[offline assistant]\nNo language model is configured; echoing the prompt.\n{prompt}"
        ))
    }
}

impl EchoLlmClient {
    pub fn shared() -> SharedLlmClient {
        Arc::new(Self)
    }
}

/// OpenAI-compatible client; works against OpenAI, vLLM, or any compatible
/// HTTP backend. The low default temperature keeps answers grounded in the
/// retrieved context rather than inventive.
pub struct OpenAiLlmClient {
    client: AsyncOpenAiClient<OpenAIConfig>,
    model: String,
    system_prompt: String,
    temperature: f32,
}

impl OpenAiLlmClient {
    const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    const DEFAULT_TEMPERATURE: f32 = 0.3;
    const DEFAULT_SYSTEM_PROMPT: &'static str =
        "You are a friendly and helpful AI assistant for customer support. Respond politely and clearly.";

    pub fn shared_from_env() -> anyhow::Result<SharedLlmClient> {
        let client = Self::from_env()?;
        Ok(Arc::new(client))
    }

    fn from_env() -> anyhow::Result<Self> {
        let config = Self::build_config_from_env()?;
        let model =
            env::var("DESKMIND_LLM_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string());
        let system_prompt = env::var("DESKMIND_SYSTEM_PROMPT")
            .unwrap_or_else(|_| Self::DEFAULT_SYSTEM_PROMPT.to_string());
        let temperature = env::var("DESKMIND_LLM_TEMPERATURE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(Self::DEFAULT_TEMPERATURE);

        Ok(Self {
            client: AsyncOpenAiClient::with_config(config),
            model,
            system_prompt,
            temperature,
        })
    }

    fn build_config_from_env() -> anyhow::Result<OpenAIConfig> {
        let api_key = env::var("OPENAI_API_KEY")
            .or_else(|_| env::var("DESKMIND_LLM_API_KEY"))
            .context("Set OPENAI_API_KEY (or DESKMIND_LLM_API_KEY) to use the OpenAI client")?;

        let mut config = OpenAIConfig::new().with_api_key(api_key);

        if let Ok(base_url) =
            env::var("OPENAI_BASE_URL").or_else(|_| env::var("DESKMIND_LLM_BASE_URL"))
        {
            config = config.with_api_base(base_url);
        }

        Ok(config)
    }

    #[instrument(level = "debug", skip_all)]
    async fn chat(&self, prompt: &str) -> anyhow::Result<String> {
        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(&self.system_prompt)
            .build()?;
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(vec![system_message.into(), user_message.into()])
            .build()?;

        let response = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .context("LLM response did not contain any choices")?;

        let output = choice
            .message
            .content
            .clone()
            .unwrap_or_else(|| String::from("[empty LLM response]"));

        Ok(output)
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.chat(prompt).await
    }
}

/// Attempt to build an OpenAI-compatible client, optionally falling back to
/// the echo client when no credentials are configured.
pub fn build_llm_client_from_env(default_to_echo: bool) -> anyhow::Result<SharedLlmClient> {
    match OpenAiLlmClient::shared_from_env() {
        Ok(client) => Ok(client),
        Err(err) if default_to_echo => {
            tracing::warn!(?err, "Falling back to EchoLlmClient");
            Ok(EchoLlmClient::shared())
        }
        Err(err) => Err(err),
    }
}
