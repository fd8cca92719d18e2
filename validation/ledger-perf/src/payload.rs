//! Request body builders, one per operation kind.
//!
//! Builders are validated against the run configuration when they are
//! constructed; `build` itself cannot fail.

use serde_json::{json, Map, Value};

use crate::config::{ContractOptions, RunConfig, TokenOptions};
use crate::error::{PerfError, PerfResult};

pub const ROUTE_CONTRACT_INVOKE: &str = "contracts/invoke";
pub const ROUTE_PRIVATE_MESSAGE: &str = "messages/private";
pub const ROUTE_TOKEN_MINT: &str = "tokens/mint";
pub const ROUTE_TRANSFER: &str = "transfer";

/// Message header tag, `<prefix>_<id>`.
pub fn tag(prefix: &str, id: u64) -> String {
    format!("{}_{}", prefix, id)
}

/// Where a contract invocation is directed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractLocation {
    Ethereum { address: String },
    Fabric { channel: String, chaincode: String },
}

/// Builds `contracts/invoke` bodies.
#[derive(Debug, Clone)]
pub struct ContractInvokeBuilder {
    location: ContractLocation,
}

impl ContractInvokeBuilder {
    pub fn ethereum(config: &RunConfig) -> PerfResult<Self> {
        let opts = contract_options(config)?;
        let address = required(&opts.address, "contract.address")?;
        Ok(Self {
            location: ContractLocation::Ethereum { address },
        })
    }

    pub fn fabric(config: &RunConfig) -> PerfResult<Self> {
        let opts = contract_options(config)?;
        let channel = required(&opts.channel, "contract.channel")?;
        let chaincode = required(&opts.chaincode, "contract.chaincode")?;
        Ok(Self {
            location: ContractLocation::Fabric { channel, chaincode },
        })
    }

    pub fn location(&self) -> &ContractLocation {
        &self.location
    }

    pub fn build(&self, id: u64, idempotency_key: &str) -> Value {
        match &self.location {
            ContractLocation::Ethereum { address } => json!({
                "location": { "address": address },
                "method": {
                    "name": "set",
                    "params": [
                        {
                            "name": "newValue",
                            "schema": {
                                "type": "integer",
                                "details": { "type": "uint256" }
                            }
                        }
                    ],
                    "returns": []
                },
                "input": { "newValue": id },
                "idempotencyKey": idempotency_key
            }),
            ContractLocation::Fabric { channel, chaincode } => json!({
                "location": { "channel": channel, "chaincode": chaincode },
                "method": {
                    "name": "CreateAsset",
                    "params": [
                        {
                            "name": "name",
                            "schema": {
                                "type": "string",
                                "details": { "type": "string" }
                            }
                        }
                    ],
                    "returns": []
                },
                "input": { "name": id.to_string() },
                "idempotencyKey": idempotency_key
            }),
        }
    }
}

/// Builds `tokens/mint` bodies.
#[derive(Debug, Clone)]
pub struct TokenMintBuilder {
    pool: String,
    recipient: String,
    amount: String,
    tag_prefix: String,
}

impl TokenMintBuilder {
    pub fn new(config: &RunConfig, tag_prefix: &str) -> PerfResult<Self> {
        let TokenOptions {
            pool,
            recipient_address,
            amount,
        } = config
            .token
            .clone()
            .ok_or_else(|| PerfError::config("token options are required for token_mint"))?;
        if pool.is_empty() {
            return Err(PerfError::config("token.pool must not be empty"));
        }
        if recipient_address.is_empty() {
            return Err(PerfError::config("token.recipient_address must not be empty"));
        }
        Ok(Self {
            pool,
            recipient: recipient_address,
            amount,
            tag_prefix: tag_prefix.to_string(),
        })
    }

    pub fn build(&self, id: u64, idempotency_key: &str) -> Value {
        json!({
            "pool": self.pool,
            "amount": self.amount,
            "to": self.recipient,
            "message": {
                "data": [
                    { "value": format!("MintTokenPerformanceTest-{}", id) }
                ],
                "header": { "tag": tag(&self.tag_prefix, id) }
            },
            "idempotencyKey": idempotency_key
        })
    }
}

/// Builds `messages/private` bodies.
#[derive(Debug, Clone)]
pub struct PrivateMessageBuilder {
    recipient: String,
    tag_prefix: String,
}

impl PrivateMessageBuilder {
    pub fn new(config: &RunConfig, tag_prefix: &str) -> PerfResult<Self> {
        let recipient = required(&config.recipient, "recipient")?;
        Ok(Self {
            recipient,
            tag_prefix: tag_prefix.to_string(),
        })
    }

    pub fn build(&self, id: u64, idempotency_key: &str) -> Value {
        json!({
            "data": [
                { "value": { "privateID": id.to_string() } }
            ],
            "group": {
                "members": [
                    { "identity": self.recipient }
                ]
            },
            "header": { "tag": tag(&self.tag_prefix, id) },
            "idempotencyKey": idempotency_key
        })
    }
}

/// One transfer between two parties.
#[derive(Debug, Clone)]
pub struct Transfer<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub value: u64,
    pub idempotency_key: &'a str,
}

/// Builds `transfer` bodies.
#[derive(Debug, Clone, Default)]
pub struct TransferBuilder {
    options: Option<Map<String, Value>>,
}

impl TransferBuilder {
    pub fn new(options: Option<Map<String, Value>>) -> Self {
        Self { options }
    }

    pub fn build(&self, transfer: &Transfer<'_>) -> Value {
        let mut body = json!({
            "from": transfer.from,
            "to": transfer.to,
            "value": transfer.value,
            "idempotencyKey": transfer.idempotency_key
        });
        if let Some(options) = &self.options {
            body["options"] = Value::Object(options.clone());
        }
        body
    }
}

fn contract_options(config: &RunConfig) -> PerfResult<&ContractOptions> {
    config
        .contract
        .as_ref()
        .ok_or_else(|| PerfError::config("contract options are required"))
}

fn required(value: &Option<String>, field: &str) -> PerfResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(PerfError::config(format!("{} is required", field))),
    }
}
