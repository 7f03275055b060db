//! Market-contract registry and asset decimals
//!
//! Protocol deployments (market contracts plus the selector table of that
//! version) and token decimals are plain values handed to the classifier and
//! normalizer at construction. The built-in tables cover Compound V2 and V3
//! on Ethereum mainnet; any other registry can be loaded from JSON.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{LendscoreError, LendscoreResult};
use crate::models::{normalize_address, ActionKind};

/// `0x` + 8 hex characters
pub const SELECTOR_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketContract {
    /// Symbolic market name, e.g. "cUSDC"
    pub name: String,
    pub address: String,
}

impl MarketContract {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }
}

/// One protocol version: its markets and the selectors its markets accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDeployment {
    pub version: String,
    pub markets: Vec<MarketContract>,
    /// Function selector (`0x` + 8 hex) to action
    pub selectors: BTreeMap<String, ActionKind>,
}

/// Resolved registry entry for a destination address
#[derive(Debug, Clone, Copy)]
pub struct MarketRef<'a> {
    pub deployment: &'a ProtocolDeployment,
    pub market: &'a MarketContract,
}

impl<'a> MarketRef<'a> {
    pub fn version(&self) -> &'a str {
        &self.deployment.version
    }

    pub fn name(&self) -> &'a str {
        &self.market.name
    }

    /// Selector must already be lower-cased.
    pub fn action_for(&self, selector: &str) -> Option<ActionKind> {
        self.deployment.selectors.get(selector).copied()
    }
}

#[derive(Debug, Clone)]
pub struct MarketRegistry {
    deployments: Vec<ProtocolDeployment>,
    /// lower-cased address -> (deployment index, market index)
    by_address: HashMap<String, (usize, usize)>,
}

impl MarketRegistry {
    /// Build a registry, lower-casing addresses and selectors.
    ///
    /// Fails on malformed selectors and on an address listed twice.
    pub fn new(deployments: Vec<ProtocolDeployment>) -> LendscoreResult<Self> {
        let mut normalized = Vec::with_capacity(deployments.len());
        let mut by_address = HashMap::new();

        for (d_idx, deployment) in deployments.into_iter().enumerate() {
            let mut selectors = BTreeMap::new();
            for (selector, action) in deployment.selectors {
                let selector = selector.trim().to_lowercase();
                if !is_valid_selector(&selector) {
                    return Err(LendscoreError::InvalidSelector {
                        version: deployment.version.clone(),
                        selector,
                    });
                }
                selectors.insert(selector, action);
            }

            let mut markets = Vec::with_capacity(deployment.markets.len());
            for (m_idx, market) in deployment.markets.into_iter().enumerate() {
                let address = normalize_address(&market.address);
                if by_address.insert(address.clone(), (d_idx, m_idx)).is_some() {
                    return Err(LendscoreError::Registry(format!(
                        "address {} is registered more than once",
                        address
                    )));
                }
                markets.push(MarketContract {
                    name: market.name,
                    address,
                });
            }

            normalized.push(ProtocolDeployment {
                version: deployment.version,
                markets,
                selectors,
            });
        }

        tracing::debug!(
            deployments = normalized.len(),
            markets = by_address.len(),
            "Market registry built"
        );

        Ok(Self {
            deployments: normalized,
            by_address,
        })
    }

    /// Compound V2 cToken markets and the Compound V3 USDC comet.
    pub fn compound() -> Self {
        let v2 = ProtocolDeployment {
            version: "compound-v2".to_string(),
            markets: vec![
                MarketContract::new("cDAI", "0x5d3a536E4D6DbD6114cc1Ead35777bAB948E3643"),
                MarketContract::new("cUSDC", "0x39AA39c021dfbaE8faC545936693aC917d5E7563"),
                MarketContract::new("cUSDT", "0xf650C3d88D12dB855b8bf7D11Be6C55A4e07dCC9"),
                MarketContract::new("cETH", "0x4Ddc2D193948926D02f9B1fE9e1daa0718270ED5"),
                MarketContract::new("cWBTC", "0xC11b1268C1A384e55C48c2391d8d480264A3A7F4"),
                MarketContract::new("cWBTC2", "0xccF4429DB6322D5C611ee964527D42E5d685DD6a"),
                MarketContract::new("cZRX", "0xB3319f5D18Bc0D84dD1b4825Dcde5d5f7266d407"),
                MarketContract::new("cBAT", "0x6C8c6b02E7b2BE14d4fA6022Dfd6d75921D90E4E"),
                MarketContract::new("cREP", "0x158079Ee67Fce2f58472A96584A73C7Ab9AC95c1"),
                MarketContract::new("cSAI", "0xF5DCe57282A584D2746FaF1593d3121Fcac444dC"),
                MarketContract::new("cCOMP", "0x70e36f6BF80a52b3B46b3aF8e106CC0ed743E8e4"),
            ],
            selectors: selector_table(&[
                ("0xa0712d68", ActionKind::Supply),      // mint(uint256)
                ("0xdb006a75", ActionKind::Redeem),      // redeem(uint256)
                ("0x852a12e3", ActionKind::Redeem),      // redeemUnderlying(uint256)
                ("0xc5ebeaec", ActionKind::Borrow),      // borrow(uint256)
                ("0x0e752702", ActionKind::Repay),       // repayBorrow(uint256)
                ("0x2608f818", ActionKind::Repay),       // repayBorrowBehalf(address,uint256)
                ("0xf5e3c462", ActionKind::Liquidation), // liquidateBorrow(address,uint256,address)
            ]),
        };

        let v3 = ProtocolDeployment {
            version: "compound-v3".to_string(),
            markets: vec![MarketContract::new(
                "cUSDCv3",
                "0xc3d688B66703497DAA19211EEdff47f25384cdc3",
            )],
            selectors: selector_table(&[
                ("0xf2b9fdb8", ActionKind::Supply),   // supply(address,uint256)
                ("0xf3fef3a3", ActionKind::Withdraw), // withdraw(address,uint256)
                ("0x4b8a3529", ActionKind::Borrow),
                ("0x1ededc91", ActionKind::Repay),
            ]),
        };

        Self::new(vec![v2, v3]).expect("built-in Compound registry is well-formed")
    }

    pub fn lookup(&self, address: &str) -> Option<MarketRef<'_>> {
        let (d_idx, m_idx) = *self.by_address.get(&normalize_address(address))?;
        let deployment = &self.deployments[d_idx];
        Some(MarketRef {
            deployment,
            market: &deployment.markets[m_idx],
        })
    }

    pub fn contains(&self, address: &str) -> bool {
        self.by_address.contains_key(&normalize_address(address))
    }

    pub fn deployments(&self) -> &[ProtocolDeployment] {
        &self.deployments
    }

    pub fn market_count(&self) -> usize {
        self.by_address.len()
    }
}

fn selector_table(entries: &[(&str, ActionKind)]) -> BTreeMap<String, ActionKind> {
    entries
        .iter()
        .map(|(selector, action)| (selector.to_string(), *action))
        .collect()
}

fn is_valid_selector(selector: &str) -> bool {
    selector.len() == SELECTOR_LEN
        && selector.starts_with("0x")
        && selector[2..].chars().all(|c| c.is_ascii_hexdigit())
}

// =============================================================================
// Asset decimals
// =============================================================================

/// Token decimals used to turn raw base units into whole tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTable {
    #[serde(default = "default_stablecoins")]
    pub stablecoins: Vec<String>,
    #[serde(default = "default_stablecoin_decimals")]
    pub stablecoin_decimals: u32,
    #[serde(default = "default_decimals")]
    pub default_decimals: u32,
    /// Per-asset overrides, keyed by upper-case symbol
    #[serde(default = "default_overrides")]
    pub overrides: BTreeMap<String, u32>,
}

impl Default for AssetTable {
    fn default() -> Self {
        Self {
            stablecoins: default_stablecoins(),
            stablecoin_decimals: default_stablecoin_decimals(),
            default_decimals: default_decimals(),
            overrides: default_overrides(),
        }
    }
}

fn default_stablecoins() -> Vec<String> {
    vec!["USDC".to_string(), "USDT".to_string()]
}

fn default_stablecoin_decimals() -> u32 {
    6
}

fn default_decimals() -> u32 {
    18
}

fn default_overrides() -> BTreeMap<String, u32> {
    BTreeMap::from([("WBTC".to_string(), 8)])
}

impl AssetTable {
    pub fn decimals_for(&self, symbol: &str) -> u32 {
        let symbol = symbol.trim().to_uppercase();
        if let Some(decimals) = self.overrides.get(&symbol) {
            return *decimals;
        }
        if self
            .stablecoins
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&symbol))
        {
            return self.stablecoin_decimals;
        }
        self.default_decimals
    }
}

// =============================================================================
// JSON registry files
// =============================================================================

/// On-disk registry format: `{ "deployments": [...], "assets": {...} }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFile {
    pub deployments: Vec<ProtocolDeployment>,
    #[serde(default)]
    pub assets: AssetTable,
}

impl RegistryFile {
    pub fn from_json(json: &str) -> LendscoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build(self) -> LendscoreResult<(MarketRegistry, AssetTable)> {
        if self.deployments.is_empty() {
            return Err(LendscoreError::Registry(
                "registry has no deployments".to_string(),
            ));
        }
        Ok((MarketRegistry::new(self.deployments)?, self.assets))
    }
}
