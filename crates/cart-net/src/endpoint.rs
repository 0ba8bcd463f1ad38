//! RPC endpoints and their classification.
//!
//! Endpoints are either *public* (one of the ledger's documented shared
//! hosts, subject to the published rate limits) or *custom* (user-provided
//! infrastructure with no client-side limiting).

use std::fmt;

/// Known public RPC host prefixes; requests against these are rate limited.
pub const PUBLIC_HOST_PREFIXES: &[&str] = &[
    "https://api.mainnet-beta.solana.com",
    "https://api.devnet.solana.com",
    "https://api.testnet.solana.com",
];

/// Endpoint classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// A documented public host, subject to shared rate limits
    Public,
    /// User-provided infrastructure; no client-side limiting
    Custom,
}

/// One RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Base URL for JSON-RPC POSTs
    pub url: String,
    /// Classification derived from the URL
    pub kind: EndpointKind,
}

impl Endpoint {
    /// Creates an endpoint, classifying it by URL.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = if PUBLIC_HOST_PREFIXES
            .iter()
            .any(|prefix| url.starts_with(prefix))
        {
            EndpointKind::Public
        } else {
            EndpointKind::Custom
        };
        Self { url, kind }
    }

    /// Returns true for public endpoints.
    pub fn is_public(&self) -> bool {
        self.kind == EndpointKind::Public
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Well-known networks and their default endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// Main network
    Mainnet,
    /// Developer network
    #[default]
    Devnet,
    /// Test network
    Testnet,
    /// Local validator
    Localnet,
}

impl Network {
    /// Returns the default RPC URL for this network.
    pub fn default_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::Localnet => "http://127.0.0.1:8899",
        }
    }

    /// Parses a network name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(Network::Mainnet),
            "devnet" => Some(Network::Devnet),
            "testnet" => Some(Network::Testnet),
            "localnet" => Some(Network::Localnet),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Localnet => "localnet",
        };
        write!(f, "{name}")
    }
}
