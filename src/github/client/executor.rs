//! Retrying request execution.
//!
//! Transient failures (5xx statuses and requests that never got a response) are retried with a linear
//! backoff; everything else is final on the first attempt. A `2xx` GraphQL response carrying an `errors`
//! array is *not* a success: it is reported as [`FetchError::Query`] straight away.

use log::{debug, trace, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use repominer_lib::repominer_trace_time;

use crate::config::RetryPolicy;
use crate::github::client::transport::{ApiRequest, RawResponse, Transport};
use crate::nested;
use crate::repominer_error::FetchError;

/// Issues [`ApiRequest`]s through a [`Transport`] under a [`RetryPolicy`].
pub struct RequestExecutor<T: Transport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        RequestExecutor { transport, policy }
    }

    /// Returns the validated payload of `request`: the `data` member for GraphQL requests, the whole body
    /// for REST ones.
    #[repominer_trace_time]
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_failure = String::new();

        for attempt in 1..=max_attempts {
            match self.transport.send(request).await {
                Ok(response) if response.status >= 500 => {
                    last_failure = format!("status {}", response.status);
                }
                Ok(response) if response.status >= 300 => {
                    debug!("[{}] was rejected with status {}", request, response.status);
                    return Err(FetchError::Rejected {
                        request: request.to_string(),
                        status: response.status,
                        body: response.body,
                    });
                }
                Ok(response) => return validate(request, response),
                Err(e) => {
                    trace!("Error = {:?}", e);
                    last_failure = format!("{:#}", e);
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.delay_for(attempt);
                warn!(
                    "Attempt {}/{} for [{}] failed ({}). Retrying in {:?}...",
                    attempt, max_attempts, request, last_failure, delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        warn!("Giving up on [{}] after {} attempt(s).", request, max_attempts);

        Err(FetchError::RetriesExhausted {
            request: request.to_string(),
            attempts: max_attempts,
            last_failure,
        })
    }

    /// [`execute`](Self::execute), then decodes the payload into `D`.
    pub async fn execute_as<D: DeserializeOwned>(&self, request: &ApiRequest) -> Result<D, FetchError> {
        let payload = self.execute(request).await?;

        serde_json::from_value(payload).map_err(|e| {
            trace!("Error = {:?}", e);
            FetchError::Decode {
                request: request.to_string(),
                nested: nested!(e),
            }
        })
    }
}

/// Result-validity predicate for successful statuses.
fn validate(request: &ApiRequest, response: RawResponse) -> Result<Value, FetchError> {
    let mut body: Value = serde_json::from_str(&response.body).map_err(|e| {
        trace!("Raw response = {}", response.body);
        FetchError::Decode {
            request: request.to_string(),
            nested: nested!(e),
        }
    })?;

    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages = errors
                .iter()
                .map(|error| match error.get("message").and_then(Value::as_str) {
                    Some(message) => message.to_string(),
                    None => error.to_string(),
                })
                .collect();

            return Err(FetchError::Query {
                request: request.to_string(),
                messages,
            });
        }
    }

    if !request.is_graphql() {
        return Ok(body);
    }

    match body.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(FetchError::Decode {
            request: request.to_string(),
            nested: anyhow::anyhow!("GraphQL response without a `data` member"),
        }),
    }
}
