use crate::Settings;
use account::{AccountConfig, MessageSigning};
use config::{NetworkConfig, NetworkConfigBuilder, NetworkType};
use serde::{Deserialize, Serialize};
use session::{LoginOptions, SessionConfig};
use std::{path::Path, time::Duration};

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ethereum network the bridge signs for
    pub network: NetworkType,

    /// Upstream Ethereum RPC endpoint url
    pub rpc_url: String,

    /// Chain id override for the network preset
    #[serde(default)]
    pub chain_id: Option<u64>,

    /// How `personal_sign` and `eth_sign` are served
    #[serde(default)]
    pub message_signing: MessageSigning,

    pub signer: SignerConfig,

    pub session: SessionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Principal of the signer canister
    pub canister_id: String,

    /// Replica url, defaults to the Internet Computer mainnet boundary nodes
    #[serde(default)]
    pub replica_url: Option<String>,

    /// Trust the replica's root key (local replicas only)
    #[serde(default)]
    pub fetch_root_key: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Identity provider endpoint; a PEM key file for the CLI
    pub identity_provider: String,

    /// Log out after this many seconds without requests
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;

        Ok(config)
    }

    /// Network preset with the overrides from this file applied.
    pub fn network_config(&self) -> NetworkConfig {
        let mut builder = NetworkConfigBuilder::from_network_type(self.network);
        if let Some(chain_id) = self.chain_id {
            builder = builder.chain_id(chain_id);
        }
        if let Some(url) = &self.signer.replica_url {
            builder = builder.replica_url(url.clone());
        }
        if let Some(fetch) = self.signer.fetch_root_key {
            builder = builder.fetch_root_key(fetch);
        }
        builder.build()
    }

    pub fn settings(&self) -> Settings {
        let network = self.network_config();

        Settings {
            chain_id: network.ethereum.chain_id,
            account: AccountConfig {
                chain_id: Some(network.ethereum.chain_id),
                message_signing: self.message_signing,
            },
            session: SessionConfig {
                login: LoginOptions {
                    identity_provider: self.session.identity_provider.clone(),
                },
                idle_timeout: self.session.idle_timeout_secs.map(Duration::from_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
network = "goerli"
rpc_url = "https://goerli.infura.io/v3/key"
message_signing = "remote"

[signer]
canister_id = "rrkah-fqaaa-aaaaa-aaaaq-cai"
replica_url = "http://127.0.0.1:4943"
fetch_root_key = true

[session]
identity_provider = "identity.pem"
idle_timeout_secs = 600
"#;

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(EXAMPLE).unwrap();

        assert_eq!(config.network, NetworkType::Goerli);
        assert_eq!(config.message_signing, MessageSigning::Remote);
        assert_eq!(config.signer.fetch_root_key, Some(true));
        assert_eq!(config.session.idle_timeout_secs, Some(600));
    }

    #[test]
    fn test_network_overrides() {
        let mut config: Config = toml::from_str(EXAMPLE).unwrap();
        config.chain_id = Some(1337);

        let network = config.network_config();
        assert_eq!(network.ethereum.chain_id, 1337);
        assert_eq!(network.internet_computer.url, "http://127.0.0.1:4943");
        assert!(network.internet_computer.fetch_root_key);
    }

    #[test]
    fn test_settings() {
        let config: Config = toml::from_str(EXAMPLE).unwrap();
        let settings = config.settings();

        assert_eq!(settings.chain_id, 5);
        assert_eq!(settings.account.chain_id, Some(5));
        assert_eq!(settings.session.idle_timeout, Some(Duration::from_secs(600)));
        assert_eq!(settings.session.login.identity_provider, "identity.pem");
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str(
            r#"
network = "mainnet"
rpc_url = "http://localhost:8545"

[signer]
canister_id = "rrkah-fqaaa-aaaaa-aaaaq-cai"

[session]
identity_provider = "identity.pem"
"#,
        )
        .unwrap();

        assert_eq!(config.message_signing, MessageSigning::Passthrough);
        let network = config.network_config();
        assert_eq!(network.ethereum.chain_id, 1);
        assert_eq!(network.internet_computer.url, "https://icp-api.io");
        assert_eq!(config.settings().session.idle_timeout, None);
    }
}
