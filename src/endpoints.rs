// Adding an endpoint means adding a row to ALLOWED_ENDPOINTS, never a new branch

use axum::http::Method;

/// Longest accepted path parameter. Covers bech32 and hex identifiers.
pub const MAX_PARAM_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Compared byte for byte, case-sensitive.
    Literal(&'static str),
    /// Identifier made of ASCII letters and digits. The name is for logs.
    Param(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedMethod {
    Get,
    Post,
}

impl AllowedMethod {
    pub fn as_method(self) -> Method {
        match self {
            AllowedMethod::Get => Method::GET,
            AllowedMethod::Post => Method::POST,
        }
    }

    fn matches(self, method: &Method) -> bool {
        match self {
            AllowedMethod::Get => *method == Method::GET,
            AllowedMethod::Post => *method == Method::POST,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Account,
    Pool,
    PoolMetadata,
    AddressUtxos,
    ProtocolParameters,
    SubmitTx,
}

impl EndpointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointKind::Account => "account",
            EndpointKind::Pool => "pool",
            EndpointKind::PoolMetadata => "pool_metadata",
            EndpointKind::AddressUtxos => "address_utxos",
            EndpointKind::ProtocolParameters => "protocol_parameters",
            EndpointKind::SubmitTx => "submit_tx",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedEndpoint {
    pub kind: EndpointKind,
    pub method: AllowedMethod,
    pub segments: &'static [Segment],
}

impl AllowedEndpoint {
    pub fn is_submission(&self) -> bool {
        self.kind == EndpointKind::SubmitTx
    }

    fn matches(&self, method: &Method, segments: &[&str]) -> bool {
        self.method.matches(method)
            && self.segments.len() == segments.len()
            && self
                .segments
                .iter()
                .zip(segments)
                .all(|(rule, actual)| match rule {
                    Segment::Literal(literal) => literal == actual,
                    Segment::Param(_) => is_valid_param(actual),
                })
    }
}

use Segment::{Literal, Param};

pub static ALLOWED_ENDPOINTS: &[AllowedEndpoint] = &[
    AllowedEndpoint {
        kind: EndpointKind::Account,
        method: AllowedMethod::Get,
        segments: &[Literal("accounts"), Param("stake_address")],
    },
    AllowedEndpoint {
        kind: EndpointKind::Pool,
        method: AllowedMethod::Get,
        segments: &[Literal("pools"), Param("pool_id")],
    },
    AllowedEndpoint {
        kind: EndpointKind::PoolMetadata,
        method: AllowedMethod::Get,
        segments: &[Literal("pools"), Param("pool_id"), Literal("metadata")],
    },
    AllowedEndpoint {
        kind: EndpointKind::AddressUtxos,
        method: AllowedMethod::Get,
        segments: &[Literal("addresses"), Param("address"), Literal("utxos")],
    },
    AllowedEndpoint {
        kind: EndpointKind::ProtocolParameters,
        method: AllowedMethod::Get,
        segments: &[Literal("epochs"), Literal("latest"), Literal("parameters")],
    },
    AllowedEndpoint {
        kind: EndpointKind::SubmitTx,
        method: AllowedMethod::Post,
        segments: &[Literal("tx"), Literal("submit")],
    },
];

fn is_valid_param(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_PARAM_LEN
        && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// A whitelisted request, with the path to send upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedEndpoint {
    pub rule: &'static AllowedEndpoint,
    pub upstream_path: String,
}

#[derive(Debug, Clone)]
pub struct EndpointFilter {
    rules: &'static [AllowedEndpoint],
    path_prefix: String,
}

impl EndpointFilter {
    pub fn new(path_prefix: impl Into<String>) -> Self {
        Self {
            rules: ALLOWED_ENDPOINTS,
            path_prefix: path_prefix.into(),
        }
    }

    pub fn check(&self, method: &Method, path: &str) -> Option<MatchedEndpoint> {
        let path = if self.path_prefix.is_empty() {
            path
        } else {
            path.strip_prefix(self.path_prefix.as_str())?
        };

        // "/a//b" and "/a/" yield empty segments and never match
        let segments: Vec<&str> = path.strip_prefix('/')?.split('/').collect();

        self.rules
            .iter()
            .find(|rule| rule.matches(method, &segments))
            .map(|rule| MatchedEndpoint {
                rule,
                upstream_path: path.to_string(),
            })
    }
}

impl Default for EndpointFilter {
    fn default() -> Self {
        Self::new("")
    }
}
