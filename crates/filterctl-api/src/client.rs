// Command gateway HTTP client
//
// Routers are driven through a small HTTP gateway that accepts a batch of CLI
// commands and returns the textual output of each. This module owns the wire
// format and classifies failures; command rendering lives in filterctl-core.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::runner::{CommandRunner, output_indicates_error};
use crate::transport::TransportConfig;

#[derive(Serialize)]
struct CommandRequest<'a> {
    commands: &'a [String],
}

#[derive(Deserialize)]
struct CommandResponse {
    #[serde(default)]
    results: Vec<CommandResult>,
}

#[derive(Deserialize)]
struct CommandResult {
    command: String,
    #[serde(default)]
    output: String,
}

/// HTTP client for a router's command gateway.
///
/// Every request is a `POST {base}/api/v1/commands` carrying
/// `{"commands": [...]}` with HTTP Basic credentials. The gateway answers
/// `{"results": [{"command", "output"}]}` in request order.
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    timeout_secs: u64,
}

impl GatewayClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(
        base_url: Url,
        username: String,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            username,
            password,
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn commands_url(&self) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/v1/commands"))?)
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }

    /// Send a batch of commands and return the raw output of each.
    ///
    /// Router-side errors in any output are reported as
    /// [`Error::CommandRejected`] for the first offending command.
    pub async fn execute(&self, commands: &[String]) -> Result<Vec<String>, Error> {
        let url = self.commands_url()?;
        debug!(count = commands.len(), "POST {}", url);
        for command in commands {
            trace!(command = %command, "queued router command");
        }

        let resp = self
            .http
            .post(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .json(&CommandRequest { commands })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("gateway refused credentials (HTTP {})", status.as_u16()),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Gateway {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = resp.text().await.map_err(|e| self.map_send_error(e))?;
        let parsed: CommandResponse = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })?;

        if parsed.results.len() != commands.len() {
            warn!(
                expected = commands.len(),
                got = parsed.results.len(),
                "gateway returned a different number of results"
            );
            return Err(Error::Gateway {
                status: status.as_u16(),
                message: format!(
                    "expected {} results, got {}",
                    commands.len(),
                    parsed.results.len()
                ),
            });
        }

        let mut outputs = Vec::with_capacity(parsed.results.len());
        for result in parsed.results {
            if output_indicates_error(&result.output) {
                debug!(command = %result.command, output = %result.output, "router rejected command");
                return Err(Error::CommandRejected {
                    command: result.command,
                    output: result.output.trim().to_owned(),
                });
            }
            outputs.push(result.output);
        }
        Ok(outputs)
    }
}

impl CommandRunner for GatewayClient {
    async fn run(&self, command: &str) -> Result<String, Error> {
        let mut outputs = self.execute(&[command.to_owned()]).await?;
        Ok(outputs.pop().unwrap_or_default())
    }

    async fn run_batch(&self, commands: &[String]) -> Result<Vec<String>, Error> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        self.execute(commands).await
    }
}
