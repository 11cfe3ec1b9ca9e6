use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Matches `${NAME}` or `$NAME` where NAME is `[A-Za-z0-9_]+`.
static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)").unwrap());

#[async_trait]
pub trait UtcpVariablesConfig: Send + Sync {
    async fn load(&self) -> Result<HashMap<String, String>>;
    async fn get(&self, key: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct UtcpClientConfig {
    pub variables: HashMap<String, String>,
    pub providers_file_path: Option<PathBuf>,
    pub load_variables_from: Vec<Arc<dyn UtcpVariablesConfig>>,
    /// Total attempts for a transient transport failure = `max_retries + 1`.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: u32,
    pub connection_timeout_ms: u64,
}

impl Default for UtcpClientConfig {
    fn default() -> Self {
        Self {
            variables: HashMap::new(),
            providers_file_path: None,
            load_variables_from: Vec::new(),
            max_retries: 3,
            retry_delay_ms: 1000,
            backoff_multiplier: 2,
            connection_timeout_ms: 30_000,
        }
    }
}

impl UtcpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_providers_file(mut self, path: PathBuf) -> Self {
        self.providers_file_path = Some(path);
        self
    }

    pub fn with_variable(mut self, key: String, value: String) -> Self {
        self.variables.insert(key, value);
        self
    }

    pub fn with_variables(mut self, vars: HashMap<String, String>) -> Self {
        self.variables.extend(vars);
        self
    }

    pub fn retry_policy(&self) -> crate::transports::retry::RetryPolicy {
        crate::transports::retry::RetryPolicy {
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            backoff_multiplier: self.backoff_multiplier,
        }
    }

    pub async fn get_variable(&self, key: &str) -> Option<String> {
        // Check inline variables first
        if let Some(val) = self.variables.get(key) {
            return Some(val.clone());
        }

        // Check variable loaders
        for loader in &self.load_variables_from {
            if let Ok(val) = loader.get(key).await {
                return Some(val);
            }
        }

        // Check environment variables
        std::env::var(key).ok()
    }

    /// Resolve every `${NAME}` / `$NAME` placeholder in `text`, leaving any
    /// name that cannot be resolved untouched in the output.
    pub async fn substitute_string(&self, text: &str) -> String {
        if !text.contains('$') {
            return text.to_string();
        }

        let mut names = Vec::new();
        for caps in VARIABLE_PATTERN.captures_iter(text) {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string());
            if let Some(name) = name {
                names.push(name);
            }
        }

        let mut resolved = HashMap::new();
        for name in names {
            if resolved.contains_key(&name) {
                continue;
            }
            if let Some(value) = self.get_variable(&name).await {
                resolved.insert(name, value);
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in VARIABLE_PATTERN.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            out.push_str(&text[last..whole.start()]);
            match resolved.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        out.push_str(&text[last..]);
        out
    }

    /// Recursively substitute every string field of a JSON value. Sequences
    /// are walked element-wise, mappings value-wise, atoms pass through.
    pub async fn substitute_value(&self, value: &mut serde_json::Value) {
        match value {
            serde_json::Value::String(s) => {
                *s = self.substitute_string(s).await;
            }
            serde_json::Value::Array(items) => {
                for item in items.iter_mut() {
                    Box::pin(self.substitute_value(item)).await;
                }
            }
            serde_json::Value::Object(map) => {
                for (_, v) in map.iter_mut() {
                    Box::pin(self.substitute_value(v)).await;
                }
            }
            _ => {}
        }
    }
}

// DotEnv variable loader implementation
pub struct DotEnvLoader {
    file_path: PathBuf,
}

impl DotEnvLoader {
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }
}

#[async_trait]
impl UtcpVariablesConfig for DotEnvLoader {
    async fn load(&self) -> Result<HashMap<String, String>> {
        let contents = tokio::fs::read_to_string(&self.file_path).await?;
        let mut vars = HashMap::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                vars.insert(
                    key.trim().to_string(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
        }

        Ok(vars)
    }

    async fn get(&self, key: &str) -> Result<String> {
        let vars = self.load().await?;
        vars.get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Variable {} not found", key))
    }
}
