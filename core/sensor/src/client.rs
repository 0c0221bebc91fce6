//! HTTP client for the doorstate daemon.
//!
//! Claims are submitted form-encoded, the same way the embedded sensor
//! boards talk to the daemon, so that both paths exercise the same
//! decoding on the server side.

use reqwest::Response;
use serde_json::Value;

use doorstate_core::{ClaimValidator, DoorState, OpeningPeriod, Result as CoreResult};
use doorstate_protocol::{DoorClaim, StatusReply};

pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Signs a claim with the shared key and submits it.
    pub async fn submit_claim(
        &self,
        validator: &ClaimValidator,
        time: i64,
        state: DoorState,
    ) -> Result<StatusReply, String> {
        let claim = signed_claim(validator, time, state)?;
        let response = self
            .http
            .post(format!("{}/door/", self.base))
            .form(&claim)
            .send()
            .await
            .map_err(|err| format!("Failed to reach daemon: {}", err))?;
        decode_reply(response).await
    }

    pub async fn status(&self) -> Result<StatusReply, String> {
        let response = self
            .http
            .get(format!("{}/door/", self.base))
            .send()
            .await
            .map_err(|err| format!("Failed to reach daemon: {}", err))?;
        decode_reply(response).await
    }

    /// Fetches the opening periods overlapping the given range. Bounds
    /// are optional; the daemon fills in its defaults.
    pub async fn history(
        &self,
        from: Option<i64>,
        to: Option<i64>,
    ) -> Result<Vec<OpeningPeriod>, String> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(from) = from {
            query.push(("from", from.to_string()));
        }
        if let Some(to) = to {
            query.push(("to", to.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/door/all/", self.base))
            .query(&query)
            .send()
            .await
            .map_err(|err| format!("Failed to reach daemon: {}", err))?;

        if !response.status().is_success() {
            return Err(error_text(response).await);
        }
        response
            .json::<Vec<OpeningPeriod>>()
            .await
            .map_err(|err| format!("Failed to decode history: {}", err))
    }
}

fn signed_claim(
    validator: &ClaimValidator,
    time: i64,
    state: DoorState,
) -> CoreResult<DoorClaim> {
    let time = time.to_string();
    let digest = validator.sign(&time, state.as_str())?;
    Ok(DoorClaim {
        time: Some(time),
        state: Some(state.as_str().to_string()),
        hmac: Some(digest),
    })
}

async fn decode_reply(response: Response) -> Result<StatusReply, String> {
    if !response.status().is_success() {
        return Err(error_text(response).await);
    }
    response
        .json::<StatusReply>()
        .await
        .map_err(|err| format!("Failed to decode reply: {}", err))
}

/// Renders the daemon's per-field error map, falling back to the raw
/// body when the response is not in that shape.
async fn error_text(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(fields)) if !fields.is_empty() => {
            let rendered: Vec<String> = fields
                .iter()
                .map(|(field, message)| match message {
                    Value::String(text) => format!("{}: {}", field, text),
                    other => format!("{}: {}", field, other),
                })
                .collect();
            format!("Daemon rejected the request ({}): {}", status, rendered.join("; "))
        }
        _ => format!("Daemon rejected the request ({}): {}", status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_claim_fills_every_field() {
        let validator = ClaimValidator::new(b"sensor test key".to_vec());
        let claim = signed_claim(&validator, 1700000000, DoorState::Opened).expect("claim");

        assert_eq!(claim.time.as_deref(), Some("1700000000"));
        assert_eq!(claim.state.as_deref(), Some("opened"));
        let digest = claim.hmac.expect("digest");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn base_url_loses_its_trailing_slash() {
        let client = ApiClient::new("http://127.0.0.1:8888/");
        assert_eq!(client.base, "http://127.0.0.1:8888");
    }
}
