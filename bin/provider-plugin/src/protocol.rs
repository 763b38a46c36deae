//! Host protocol
//!
//! One JSON object per line on stdin, one response per line on stdout. A
//! request names its operation in `op` and carries a host-chosen `id` that
//! is echoed back, so responses may be written out of order.

use provider_core::{ApplyRequest, ApplyResult, Block, Diagnostics, Plan, ProviderError, ResourceRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Json,
    #[serde(flatten)]
    pub op: Op,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Schema,
    Plan {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        prior: Json,
        #[serde(default)]
        config: Json,
    },
    Apply {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        prior: Json,
        #[serde(default)]
        planned: Json,
        #[serde(default)]
        config: Json,
    },
    Read {
        #[serde(rename = "type")]
        type_name: String,
        state: Json,
    },
    Import {
        #[serde(rename = "type")]
        type_name: String,
        import_id: String,
    },
    ReadDataSource {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        config: Json,
    },
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Schema => "schema",
            Op::Plan { .. } => "plan",
            Op::Apply { .. } => "apply",
            Op::Read { .. } => "read",
            Op::Import { .. } => "import",
            Op::ReadDataSource { .. } => "read_data_source",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Schema { schema: Json },
    Plan { plan: Plan },
    Applied(ApplyResult),
    Failed { diagnostics: Diagnostics },
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Json,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    /// Response to a line that could not be parsed as a request
    pub fn malformed(err: &serde_json::Error) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(&ProviderError::Internal(format!("malformed request: {err}")));
        Self {
            id: Json::Null,
            outcome: Outcome::Failed { diagnostics },
        }
    }
}

/// Run one request against the registry.
pub async fn handle(registry: &ResourceRegistry, request: Request, cancel: CancellationToken) -> Response {
    let op = request.op.name();
    debug!(id = %request.id, op, "Handling request");

    let outcome = match dispatch(registry, request.op, cancel).await {
        Ok(outcome) => outcome,
        Err(err) => {
            info!(id = %request.id, op, error = %err, "Request failed");
            let mut diagnostics = Diagnostics::new();
            diagnostics.error(&err);
            Outcome::Failed { diagnostics }
        }
    };

    Response { id: request.id, outcome }
}

async fn dispatch(registry: &ResourceRegistry, op: Op, cancel: CancellationToken) -> provider_core::Result<Outcome> {
    match op {
        Op::Schema => Ok(Outcome::Schema {
            schema: registry.describe(),
        }),
        Op::Plan { type_name, prior, config } => {
            let schema = registry.resource_schema(&type_name)?;
            let prior = optional_block(&schema, &prior)?;
            let config = schema.decode(&config)?;
            let plan = registry.plan(&type_name, prior.as_ref(), &config, cancel).await?;
            Ok(Outcome::Plan { plan })
        }
        Op::Apply {
            type_name,
            prior,
            planned,
            config,
        } => {
            let schema = registry.resource_schema(&type_name)?;
            let request = ApplyRequest {
                prior: optional_block(&schema, &prior)?,
                planned: optional_block(&schema, &planned)?,
                config: schema.decode(&config)?,
            };
            Ok(Outcome::Applied(registry.apply(&type_name, request, cancel).await?))
        }
        Op::Read { type_name, state } => {
            let schema = registry.resource_schema(&type_name)?;
            let state = schema.decode(&state)?;
            Ok(Outcome::Applied(registry.read(&type_name, state, cancel).await?))
        }
        Op::Import { type_name, import_id } => {
            Ok(Outcome::Applied(registry.import(&type_name, &import_id, cancel).await?))
        }
        Op::ReadDataSource { type_name, config } => {
            let schema = registry.data_source_schema(&type_name)?;
            let config = schema.decode(&config)?;
            Ok(Outcome::Applied(registry.read_data_source(&type_name, config, cancel).await?))
        }
    }
}

/// `null` means the side is absent (no prior state, or a delete plan).
fn optional_block(schema: &provider_core::Schema, json: &Json) -> provider_core::Result<Option<Block>> {
    if json.is_null() {
        return Ok(None);
    }
    schema.decode(json).map(Some)
}
