//! Command-line demonstration of the blocking HTTP client.
//!
//! Lists models or requests a completion from several AI providers, or sends
//! a raw GET/POST, printing the status and body of each response.

mod providers;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use privacy_http::{ClientConfig, ClientError, HttpClient, HttpResponse};
use tracing_subscriber::EnvFilter;

use providers::{Provider, ProviderId, PROVIDERS};

#[derive(Parser)]
#[command(name = "privacy-http-demo")]
#[command(about = "Call provider REST endpoints through the blocking HTTP client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Deadline for each request, e.g. "30s" or "1500ms"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Maximum redirects to follow
    #[arg(long, global = true)]
    max_redirects: Option<usize>,

    /// JSON file with client configuration; flags above take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Send every provider call to this base URL (e.g. the mock server)
    #[arg(long, global = true, env = "PROVIDER_BASE_URL")]
    base_url: Option<String>,

    /// Use this key for every provider instead of the per-provider variables
    #[arg(long, global = true, env = "PROVIDER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List models from every provider with a configured key
    Models {
        /// Only query this provider
        #[arg(long, value_enum)]
        provider: Option<ProviderId>,
    },

    /// Ask one provider for a chat completion
    Complete {
        #[arg(long, value_enum)]
        provider: ProviderId,

        #[arg(long)]
        model: String,

        #[arg(long)]
        prompt: String,
    },

    /// Send a GET to an arbitrary URL
    Get {
        url: String,

        /// Extra header, "Name: value"; repeatable
        #[arg(short = 'H', long = "header", value_parser = parse_header_arg)]
        headers: Vec<(String, String)>,
    },

    /// Send a POST to an arbitrary URL
    Post {
        url: String,

        /// Extra header, "Name: value"; repeatable
        #[arg(short = 'H', long = "header", value_parser = parse_header_arg)]
        headers: Vec<(String, String)>,

        /// Raw request body
        #[arg(short, long, default_value = "")]
        data: String,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every call completed at the transport level.
fn run(cli: Cli) -> Result<bool> {
    let client = HttpClient::new(client_config(&cli)?)?;
    let base = cli.base_url.as_deref();

    let ok = match cli.command {
        Command::Models { provider } => {
            let selected: Vec<&Provider> = match provider {
                Some(id) => vec![lookup(id)?],
                None => PROVIDERS.iter().collect(),
            };
            let mut ok = true;
            let mut attempted = 0;
            for provider in selected {
                let Some(key) = api_key(provider, cli.api_key.as_deref()) else {
                    tracing::warn!(provider = provider.name, env = provider.key_env, "no API key, skipping");
                    continue;
                };
                attempted += 1;
                ok &= report(provider.name, provider.list_models(&client, base, &key));
            }
            if attempted == 0 {
                return Err(anyhow!("no provider has an API key configured"));
            }
            ok
        }
        Command::Complete {
            provider,
            model,
            prompt,
        } => {
            let provider = lookup(provider)?;
            let key = api_key(provider, cli.api_key.as_deref())
                .with_context(|| format!("{} is not set", provider.key_env))?;
            report(
                provider.name,
                provider.complete(&client, base, &key, &model, &prompt),
            )
        }
        Command::Get { url, headers } => {
            let headers: Vec<(&str, &str)> =
                headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            report(&url, client.get(&url, &headers))
        }
        Command::Post { url, headers, data } => {
            let headers: Vec<(&str, &str)> =
                headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            report(&url, client.post(&url, &headers, data))
        }
    };
    Ok(ok)
}

fn client_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(timeout) = cli.timeout {
        config.timeout = timeout;
    }
    if let Some(max_redirects) = cli.max_redirects {
        config.max_redirects = max_redirects;
    }
    Ok(config)
}

fn load_config(path: &Path) -> Result<ClientConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    ClientConfig::from_json_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn lookup(id: ProviderId) -> Result<&'static Provider> {
    Provider::lookup(id).ok_or_else(|| anyhow!("unknown provider {id:?}"))
}

fn api_key(provider: &Provider, shared: Option<&str>) -> Option<String> {
    shared
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var(provider.key_env).ok())
        .filter(|key| !key.is_empty())
}

/// Print one outcome. Returns false on a transport failure.
fn report(label: &str, result: Result<HttpResponse, ClientError>) -> bool {
    match result {
        Ok(response) => {
            println!("{label}: HTTP {}", response.status);
            println!("{}", render_body(&response));
            true
        }
        Err(err) => {
            eprintln!("{label}: {err}");
            false
        }
    }
}

fn render_body(response: &HttpResponse) -> String {
    serde_json::from_slice::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| response.text().into_owned())
}

fn parse_header_arg(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn header_arg_is_split_and_trimmed() {
        assert_eq!(
            parse_header_arg("Authorization:  Bearer X ").unwrap(),
            ("Authorization".to_string(), "Bearer X".to_string())
        );
        assert_eq!(
            parse_header_arg("x-url: http://a:b").unwrap(),
            ("x-url".to_string(), "http://a:b".to_string())
        );
        assert!(parse_header_arg("no-colon").is_err());
        assert!(parse_header_arg(": value").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "privacy-http-demo",
            "--timeout",
            "1500ms",
            "--max-redirects",
            "2",
            "get",
            "http://localhost:3000/echo",
            "-H",
            "x-a: 1",
        ]);
        let config = client_config(&cli).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_redirects, 2);
        match cli.command {
            Command::Get { url, headers } => {
                assert_eq!(url, "http://localhost:3000/echo");
                assert_eq!(headers, vec![("x-a".to_string(), "1".to_string())]);
            }
            _ => panic!("expected get"),
        }
    }

    #[test]
    fn config_file_is_loaded_then_overridden() {
        let path = std::env::temp_dir().join(format!("privacy-http-demo-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"timeout":"5s","max_redirects":1,"default_headers":{"x-team":"demo"}}"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "privacy-http-demo",
            "--config",
            path.to_str().unwrap(),
            "--max-redirects",
            "3",
            "models",
        ]);
        let config = client_config(&cli).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_redirects, 3);
        assert_eq!(
            config.default_headers,
            BTreeMap::from([("x-team".to_string(), "demo".to_string())])
        );
    }

    #[test]
    fn shared_key_wins_over_environment() {
        let provider = Provider::lookup(ProviderId::Openai).unwrap();
        assert_eq!(api_key(provider, Some("shared")), Some("shared".to_string()));
    }

    #[test]
    fn json_bodies_are_pretty_printed() {
        let response = HttpResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: r#"{"id":"m1"}"#.into(),
        };
        assert_eq!(render_body(&response), "{\n  \"id\": \"m1\"\n}");

        let text = HttpResponse {
            body: "plain".into(),
            ..response
        };
        assert_eq!(render_body(&text), "plain");
    }
}
