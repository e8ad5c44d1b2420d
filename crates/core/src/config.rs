use crate::chunking::ChunkingConfig;
use crate::error::ConfigError;
use crate::models::GenerationOptions;
use crate::prompt::PromptTemplate;
use serde::Deserialize;
use std::fmt;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const API_KEY_VAR: &str = "MISTRAL_API_KEY";
pub const SECONDARY_TOKEN_VAR: &str = "HF_TOKEN";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RagConfig {
    pub emb_model_id: String,
    pub llm_model_id: String,
    pub template: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_persist_directory")]
    pub persist_directory: PathBuf,
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    #[serde(default = "default_data_folder")]
    pub data_folder: PathBuf,
    #[serde(default)]
    pub data_urls: Vec<Url>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: Url,
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub random_seed: u64,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_max_tokens() -> u32 {
    512
}

fn default_k() -> usize {
    4
}

fn default_chunk_size() -> usize {
    1_000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_persist_directory() -> PathBuf {
    PathBuf::from("vectorstore")
}

fn default_collection_name() -> String {
    "documents".to_string()
}

fn default_data_folder() -> PathBuf {
    PathBuf::from("data")
}

fn default_api_base_url() -> Url {
    Url::parse(DEFAULT_API_BASE_URL).expect("default api base url is valid")
}

fn default_embedding_batch_size() -> usize {
    32
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl RagConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("emb_model_id", &self.emb_model_id)?;
        require_non_empty("llm_model_id", &self.llm_model_id)?;
        require_non_empty("collection_name", &self.collection_name)?;

        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(invalid("temperature", "must be a finite number >= 0"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens", "must be greater than 0"));
        }
        if self.k == 0 {
            return Err(invalid("k", "must be greater than 0"));
        }
        if self.embedding_batch_size == 0 {
            return Err(invalid("embedding_batch_size", "must be greater than 0"));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(invalid("request_timeout_secs", "must be greater than 0"));
        }
        if self
            .collection_name
            .chars()
            .any(|c| std::path::is_separator(c) || c == '.')
        {
            return Err(invalid(
                "collection_name",
                "must not contain path separators or dots",
            ));
        }

        if self.chunk_size == 0 {
            return Err(invalid("chunk_size", "must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(invalid("chunk_overlap", "must be smaller than chunk_size"));
        }
        self.prompt_template()?;

        Ok(())
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    pub fn prompt_template(&self) -> Result<PromptTemplate, ConfigError> {
        PromptTemplate::parse(&self.template)
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.llm_model_id.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            random_seed: self.random_seed,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn require_non_empty(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(key, "must not be empty"));
    }
    Ok(())
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secondary_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field(
                "secondary_token",
                &self.secondary_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Interactive,
    Never,
}

pub fn resolve_credentials(mode: PromptMode) -> Result<Credentials, ConfigError> {
    let interactive = mode == PromptMode::Interactive && std::io::stdin().is_terminal();
    resolve_credentials_with(|name| std::env::var(name).ok(), prompt_hidden, interactive)
}

pub fn resolve_credentials_with<F, P>(
    lookup: F,
    mut prompt: P,
    interactive: bool,
) -> Result<Credentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    P: FnMut(&str) -> Result<String, std::io::Error>,
{
    let api_key = match non_empty(lookup(API_KEY_VAR)) {
        Some(key) => key,
        None if interactive => non_empty(Some(prompt(API_KEY_VAR)?))
            .ok_or_else(|| ConfigError::MissingCredential(API_KEY_VAR.to_string()))?,
        None => return Err(ConfigError::MissingCredential(API_KEY_VAR.to_string())),
    };

    let secondary_token = match non_empty(lookup(SECONDARY_TOKEN_VAR)) {
        Some(token) => Some(token),
        None if interactive => non_empty(Some(prompt(SECONDARY_TOKEN_VAR)?)),
        None => {
            tracing::debug!(variable = SECONDARY_TOKEN_VAR, "secondary token not set");
            None
        }
    };

    Ok(Credentials {
        api_key,
        secondary_token,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn prompt_hidden(name: &str) -> Result<String, std::io::Error> {
    rpassword::prompt_password(format!("Enter the value for {name}: "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
emb_model_id: mistral-embed
llm_model_id: open-mistral-7b
template: "Context:\n{context}\n\nQuestion: {question}"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = RagConfig::from_yaml(MINIMAL).expect("config should parse");
        assert_eq!(config.k, 4);
        assert_eq!(config.chunk_size, 1_000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.collection_name, "documents");
        assert_eq!(config.api_base_url.as_str(), "https://api.mistral.ai/v1");
        assert!(config.data_urls.is_empty());
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.generation_options().random_seed, 0);
    }

    #[test]
    fn full_config_is_read() {
        let raw = r#"
emb_model_id: mistral-embed
llm_model_id: mistral-small-latest
temperature: 0.2
max_tokens: 256
k: 2
chunk_size: 500
chunk_overlap: 50
persist_directory: store
collection_name: manuals
data_folder: pdfs
data_urls:
  - https://example.com/files/manual.pdf
template: "{context} / {question}"
port: 8080
"#;
        let config = RagConfig::from_yaml(raw).expect("config should parse");
        assert_eq!(config.k, 2);
        assert_eq!(config.persist_directory, PathBuf::from("store"));
        assert_eq!(config.data_urls.len(), 1);
        assert_eq!(config.generation_options().max_tokens, 256);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = format!("{MINIMAL}\nretriever: mmr\n");
        let error = RagConfig::from_yaml(&raw).expect_err("unknown key must fail");
        assert!(matches!(error, ConfigError::Parse(_)));
        assert!(error.to_string().contains("retriever"));
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let raw = "emb_model_id: mistral-embed\ntemplate: \"{context}{question}\"\n";
        let error = RagConfig::from_yaml(raw).expect_err("missing llm_model_id must fail");
        assert!(error.to_string().contains("llm_model_id"));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let raw = format!("{MINIMAL}\nchunk_size: 100\nchunk_overlap: 100\n");
        let error = RagConfig::from_yaml(&raw).expect_err("overlap >= size must fail");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                key: "chunk_overlap",
                ..
            }
        ));
    }

    #[test]
    fn template_without_question_placeholder_is_rejected() {
        let raw = "emb_model_id: e\nllm_model_id: l\ntemplate: \"only {context}\"\n";
        let error = RagConfig::from_yaml(raw).expect_err("template must mention question");
        assert!(matches!(error, ConfigError::Template(_)));
    }

    #[test]
    fn zero_k_is_rejected() {
        let raw = format!("{MINIMAL}\nk: 0\n");
        assert!(RagConfig::from_yaml(&raw).is_err());
    }

    fn no_prompt(name: &str) -> Result<String, std::io::Error> {
        panic!("unexpected prompt for {name}")
    }

    #[test]
    fn credentials_come_from_lookup() {
        let credentials = resolve_credentials_with(
            |name| match name {
                API_KEY_VAR => Some("secret".to_string()),
                SECONDARY_TOKEN_VAR => Some("  ".to_string()),
                _ => None,
            },
            no_prompt,
            false,
        )
        .expect("api key is present");

        assert_eq!(credentials.api_key, "secret");
        assert_eq!(credentials.secondary_token, None);
        assert!(!format!("{credentials:?}").contains("secret"));
    }

    #[test]
    fn missing_api_key_fails_when_not_interactive() {
        let error =
            resolve_credentials_with(|_| None, no_prompt, false).expect_err("no key, no prompt");
        match error {
            ConfigError::MissingCredential(name) => assert_eq!(name, API_KEY_VAR),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unset_credentials_go_through_the_hidden_prompt() {
        let mut asked = Vec::new();
        let credentials = resolve_credentials_with(
            |_| None,
            |name| {
                asked.push(name.to_string());
                Ok(match name {
                    API_KEY_VAR => "typed-key\n".to_string(),
                    _ => String::new(),
                })
            },
            true,
        )
        .expect("prompted key is accepted");

        assert_eq!(credentials.api_key, "typed-key");
        assert_eq!(credentials.secondary_token, None);
        assert_eq!(asked, vec![API_KEY_VAR, SECONDARY_TOKEN_VAR]);
    }

    #[test]
    fn empty_prompted_api_key_is_missing() {
        let error = resolve_credentials_with(|_| None, |_| Ok(String::new()), true)
            .expect_err("blank key");
        assert!(matches!(error, ConfigError::MissingCredential(name) if name == API_KEY_VAR));
    }
}
