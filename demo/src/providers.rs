//! Provider endpoints the demo knows how to call.
//!
//! Each provider gets its own credential, read from its own environment
//! variable, and its own auth header shape. The HTTP client never sees any
//! of this; it just receives headers.

use clap::ValueEnum;
use privacy_http::{ClientError, HttpClient, HttpResponse};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderId {
    Openai,
    Deepseek,
    Xai,
    Gemini,
    Anthropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// The key goes verbatim into the named header.
    ApiKeyHeader(&'static str),
}

#[derive(Debug)]
pub struct Provider {
    pub id: ProviderId,
    pub name: &'static str,
    pub base_url: &'static str,
    pub key_env: &'static str,
    pub auth: Auth,
    pub completion_path: &'static str,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

pub const PROVIDERS: &[Provider] = &[
    Provider {
        id: ProviderId::Openai,
        name: "OpenAI",
        base_url: "https://api.openai.com/v1",
        key_env: "OPENAI_API_KEY",
        auth: Auth::Bearer,
        completion_path: "/chat/completions",
        extra_headers: &[],
    },
    Provider {
        id: ProviderId::Deepseek,
        name: "DeepSeek",
        base_url: "https://api.deepseek.com",
        key_env: "DEEPSEEK_API_KEY",
        auth: Auth::Bearer,
        completion_path: "/chat/completions",
        extra_headers: &[],
    },
    Provider {
        id: ProviderId::Xai,
        name: "xAI",
        base_url: "https://api.x.ai/v1",
        key_env: "XAI_API_KEY",
        auth: Auth::Bearer,
        completion_path: "/chat/completions",
        extra_headers: &[],
    },
    Provider {
        id: ProviderId::Gemini,
        name: "Gemini",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        key_env: "GEMINI_API_KEY",
        auth: Auth::Bearer,
        completion_path: "/chat/completions",
        extra_headers: &[],
    },
    Provider {
        id: ProviderId::Anthropic,
        name: "Anthropic",
        base_url: "https://api.anthropic.com/v1",
        key_env: "ANTHROPIC_API_KEY",
        auth: Auth::ApiKeyHeader("x-api-key"),
        completion_path: "/messages",
        extra_headers: &[("anthropic-version", "2023-06-01")],
    },
];

impl Provider {
    pub fn lookup(id: ProviderId) -> Option<&'static Provider> {
        PROVIDERS.iter().find(|p| p.id == id)
    }

    fn base<'a>(&'a self, base_override: Option<&'a str>) -> &'a str {
        base_override.unwrap_or(self.base_url).trim_end_matches('/')
    }

    pub fn models_url(&self, base_override: Option<&str>) -> String {
        format!("{}/models", self.base(base_override))
    }

    pub fn completion_url(&self, base_override: Option<&str>) -> String {
        format!("{}{}", self.base(base_override), self.completion_path)
    }

    /// Credential plus any fixed headers this provider requires.
    pub fn headers(&self, key: &str) -> Vec<(&'static str, String)> {
        let mut headers = match self.auth {
            Auth::Bearer => vec![("Authorization", format!("Bearer {key}"))],
            Auth::ApiKeyHeader(name) => vec![(name, key.to_string())],
        };
        headers.extend(self.extra_headers.iter().map(|(k, v)| (*k, v.to_string())));
        headers
    }

    pub fn completion_body(&self, model: &str, prompt: &str) -> Value {
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if self.id == ProviderId::Anthropic {
            body["max_tokens"] = json!(1024);
        }
        body
    }

    pub fn list_models(
        &self,
        client: &HttpClient,
        base_override: Option<&str>,
        key: &str,
    ) -> Result<HttpResponse, ClientError> {
        let headers = self.headers(key);
        client.get(&self.models_url(base_override), &borrowed(&headers))
    }

    pub fn complete(
        &self,
        client: &HttpClient,
        base_override: Option<&str>,
        key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<HttpResponse, ClientError> {
        let mut headers = self.headers(key);
        headers.push(("Content-Type", "application/json".to_string()));
        let body = self.completion_body(model, prompt).to_string();
        client.post(&self.completion_url(base_override), &borrowed(&headers), body)
    }
}

pub fn borrowed<'a>(headers: &'a [(&'a str, String)]) -> Vec<(&'a str, &'a str)> {
    headers.iter().map(|(k, v)| (*k, v.as_str())).collect()
}
