//! Network configuration for the signing bridge.
//!
//! Provides chain parameters for the Ethereum side and the replica endpoint for
//! the Internet Computer side, for each supported deployment.

use serde::{Deserialize, Serialize};

/// Network type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Sepolia,
    Goerli,
}

/// Ethereum network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EthereumConfig {
    /// Chain ID used for EIP-155 replay protection
    pub chain_id: u64,
    /// Human readable network name
    pub name: &'static str,
}

impl EthereumConfig {
    /// Ethereum mainnet configuration.
    pub const fn mainnet() -> Self {
        Self {
            chain_id: 1,
            name: "mainnet",
        }
    }

    /// Ethereum Sepolia testnet configuration.
    pub const fn sepolia() -> Self {
        Self {
            chain_id: 11155111,
            name: "sepolia",
        }
    }

    /// Ethereum Goerli testnet configuration.
    pub const fn goerli() -> Self {
        Self {
            chain_id: 5,
            name: "goerli",
        }
    }
}

/// Internet Computer endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternetComputerConfig {
    /// Replica (boundary node) URL
    pub url: String,
    /// Fetch the root key from the replica instead of using the mainnet key.
    ///
    /// Only safe against a local replica.
    pub fetch_root_key: bool,
}

impl InternetComputerConfig {
    /// Public Internet Computer boundary nodes.
    pub fn mainnet() -> Self {
        Self {
            url: "https://icp-api.io".to_string(),
            fetch_root_key: false,
        }
    }

    /// Local replica started by `dfx start`.
    pub fn local() -> Self {
        Self {
            url: "http://127.0.0.1:4943".to_string(),
            fetch_root_key: true,
        }
    }
}

/// Complete network configuration for the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfig {
    /// Network type
    pub network_type: NetworkType,
    /// Ethereum side
    pub ethereum: EthereumConfig,
    /// Internet Computer side
    pub internet_computer: InternetComputerConfig,
}

impl NetworkConfig {
    /// Create mainnet configuration.
    pub fn mainnet() -> Self {
        NetworkConfigBuilder::mainnet().build()
    }

    /// Create Sepolia configuration.
    pub fn sepolia() -> Self {
        NetworkConfigBuilder::sepolia().build()
    }

    /// Create Goerli configuration.
    pub fn goerli() -> Self {
        NetworkConfigBuilder::goerli().build()
    }

    /// Create configuration from network type.
    pub fn from_network_type(network_type: NetworkType) -> Self {
        NetworkConfigBuilder::from_network_type(network_type).build()
    }
}

/// Builder for custom network configurations.
#[derive(Debug, Clone)]
pub struct NetworkConfigBuilder {
    network_type: NetworkType,
    ethereum: EthereumConfig,
    internet_computer: InternetComputerConfig,
}

impl NetworkConfigBuilder {
    /// Start with mainnet defaults.
    pub fn mainnet() -> Self {
        Self {
            network_type: NetworkType::Mainnet,
            ethereum: EthereumConfig::mainnet(),
            internet_computer: InternetComputerConfig::mainnet(),
        }
    }

    /// Start with Sepolia defaults.
    pub fn sepolia() -> Self {
        Self {
            network_type: NetworkType::Sepolia,
            ethereum: EthereumConfig::sepolia(),
            internet_computer: InternetComputerConfig::mainnet(),
        }
    }

    /// Start with Goerli defaults.
    pub fn goerli() -> Self {
        Self {
            network_type: NetworkType::Goerli,
            ethereum: EthereumConfig::goerli(),
            internet_computer: InternetComputerConfig::mainnet(),
        }
    }

    /// Start with the defaults of the given network type.
    pub fn from_network_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Sepolia => Self::sepolia(),
            NetworkType::Goerli => Self::goerli(),
        }
    }

    /// Override the Ethereum chain ID.
    pub const fn chain_id(mut self, chain_id: u64) -> Self {
        self.ethereum.chain_id = chain_id;
        self
    }

    /// Override the replica URL.
    pub fn replica_url(mut self, url: impl Into<String>) -> Self {
        self.internet_computer.url = url.into();
        self
    }

    /// Override whether the root key is fetched from the replica.
    pub const fn fetch_root_key(mut self, fetch: bool) -> Self {
        self.internet_computer.fetch_root_key = fetch;
        self
    }

    /// Point the Internet Computer side at a local replica.
    pub fn local_replica(mut self) -> Self {
        self.internet_computer = InternetComputerConfig::local();
        self
    }

    /// Build the network configuration.
    pub fn build(self) -> NetworkConfig {
        NetworkConfig {
            network_type: self.network_type,
            ethereum: self.ethereum,
            internet_computer: self.internet_computer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_config() {
        let config = NetworkConfig::mainnet();
        assert_eq!(config.ethereum.chain_id, 1);
        assert_eq!(config.network_type, NetworkType::Mainnet);
        assert!(!config.internet_computer.fetch_root_key);
    }

    #[test]
    fn test_goerli_config() {
        let config = NetworkConfig::goerli();
        assert_eq!(config.ethereum.chain_id, 5);
        assert_eq!(config.ethereum.name, "goerli");
    }

    #[test]
    fn test_from_network_type() {
        let config = NetworkConfig::from_network_type(NetworkType::Sepolia);
        assert_eq!(config.ethereum.chain_id, 11155111);
    }

    #[test]
    fn test_custom_config_builder() {
        let config = NetworkConfigBuilder::goerli()
            .chain_id(1337)
            .local_replica()
            .build();

        assert_eq!(config.ethereum.chain_id, 1337);
        assert_eq!(config.internet_computer.url, "http://127.0.0.1:4943");
        assert!(config.internet_computer.fetch_root_key);
        assert_eq!(config.network_type, NetworkType::Goerli);
    }

    #[test]
    fn test_replica_override_keeps_root_key_policy() {
        let config = NetworkConfigBuilder::mainnet()
            .replica_url("https://ic0.app")
            .build();

        assert_eq!(config.internet_computer.url, "https://ic0.app");
        assert!(!config.internet_computer.fetch_root_key);
    }
}
