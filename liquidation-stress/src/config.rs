//! Chain/asset registry and estimator configuration.
//!
//! Everything here is plain data handed to the [`PanelBuilder`](crate::panel::PanelBuilder)
//! and [`StressCurveGenerator`](crate::stress::StressCurveGenerator) at construction time.

use crate::{
    error::{ConfigError, StressError},
    kernel::Bandwidth,
    panel::SeriesKey,
    stress::{Horizon, ShockGrid},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::path::Path;

/// Topic 0 of the Aave V3 `LiquidationCall` event.
pub const LIQUIDATION_CALL_TOPIC: &str =
    "0xe413a321e8681d831f4dbccbca790d2952b56f977908e45be37335533e005286";

/// Lending pool deployment on a single chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainConfig {
    /// Lowercase chain name, eg/ "ethereum".
    pub name: SmolStr,
    pub pool_address: SmolStr,
    /// Block height at which the pool was deployed.
    pub start_block: u64,
    /// Base URL of the Etherscan-compatible explorer API.
    pub api_base: SmolStr,
    pub chain_id: u64,
}

/// How daily closing prices are obtained for an asset.
///
/// Stablecoins are usually configured with [`PriceStrategy::Fixed`] or
/// [`PriceStrategy::MarketOrFixed`] so the constant price is an explicit choice rather than a
/// silent special case inside price loading.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceStrategy {
    /// Market closes for the exchange pair are required.
    Market { pair: SmolStr },
    /// Market closes when any are available for the series, otherwise a constant price.
    MarketOrFixed { pair: SmolStr, fallback: f64 },
    /// Constant price, market data is never consulted.
    Fixed { price: f64 },
}

impl PriceStrategy {
    pub fn pair(&self) -> Option<&str> {
        match self {
            PriceStrategy::Market { pair } | PriceStrategy::MarketOrFixed { pair, .. } => {
                Some(pair.as_str())
            }
            PriceStrategy::Fixed { .. } => None,
        }
    }

    pub fn fixed_price(&self) -> Option<f64> {
        match self {
            PriceStrategy::Market { .. } => None,
            PriceStrategy::MarketOrFixed { fallback, .. } => Some(*fallback),
            PriceStrategy::Fixed { price } => Some(*price),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssetConfig {
    /// Uppercase asset symbol, eg/ "ETH".
    pub symbol: SmolStr,
    pub price: PriceStrategy,
}

/// Immutable chain and asset tables.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Registry {
    pub chains: Vec<ChainConfig>,
    pub assets: Vec<AssetConfig>,
}

impl Registry {
    /// Aave V3 pool deployments and the assets tracked across them.
    pub fn aave_v3() -> Self {
        let chain = |name: &str, pool: &str, start_block, api_base: &str, chain_id| ChainConfig {
            name: SmolStr::new(name),
            pool_address: SmolStr::new(pool),
            start_block,
            api_base: SmolStr::new(api_base),
            chain_id,
        };

        let shared_pool = "0x794a61358D6845594F94dc1DB02A252b5b4814aD";

        Self {
            chains: vec![
                chain(
                    "ethereum",
                    "0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2",
                    16_291_127,
                    "https://api.etherscan.io/v2",
                    1,
                ),
                chain(
                    "optimism",
                    shared_pool,
                    4_365_693,
                    "https://api-optimistic.etherscan.io/v2",
                    10,
                ),
                chain(
                    "arbitrum",
                    shared_pool,
                    7_740_000,
                    "https://api.arbiscan.io/v2",
                    42_161,
                ),
                chain(
                    "polygon",
                    shared_pool,
                    25_825_996,
                    "https://api.polygonscan.com/v2",
                    137,
                ),
                chain(
                    "avalanche",
                    shared_pool,
                    11_970_000,
                    "https://api.snowtrace.io/v2",
                    43_114,
                ),
                chain(
                    "base",
                    "0xA238Dd80C259a72e81d7e4664a9801593F98d1c5",
                    2_357_200,
                    "https://api.basescan.org/v2",
                    8_453,
                ),
            ],
            assets: vec![
                AssetConfig {
                    symbol: SmolStr::new("ETH"),
                    price: PriceStrategy::Market {
                        pair: SmolStr::new("ETHUSDT"),
                    },
                },
                AssetConfig {
                    symbol: SmolStr::new("BTC"),
                    price: PriceStrategy::Market {
                        pair: SmolStr::new("BTCUSDT"),
                    },
                },
                AssetConfig {
                    symbol: SmolStr::new("USDC"),
                    price: PriceStrategy::MarketOrFixed {
                        pair: SmolStr::new("USDCUSDT"),
                        fallback: 1.0,
                    },
                },
                AssetConfig {
                    symbol: SmolStr::new("USDT"),
                    price: PriceStrategy::Fixed { price: 1.0 },
                },
            ],
        }
    }

    pub fn chain(&self, name: &str) -> Option<&ChainConfig> {
        self.chains
            .iter()
            .find(|chain| chain.name.eq_ignore_ascii_case(name))
    }

    pub fn asset(&self, symbol: &str) -> Option<&AssetConfig> {
        self.assets
            .iter()
            .find(|asset| asset.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Ensure both halves of a [`SeriesKey`] are configured.
    pub fn check(&self, key: &SeriesKey) -> Result<&AssetConfig, ConfigError> {
        self.chain(&key.chain)
            .ok_or_else(|| ConfigError::UnknownChain(key.chain.clone()))?;
        self.asset(&key.asset)
            .ok_or_else(|| ConfigError::UnknownAsset(key.asset.clone()))
    }

    /// Every configured chain × asset combination, in declaration order.
    pub fn series_keys(&self) -> Vec<SeriesKey> {
        self.chains
            .iter()
            .flat_map(|chain| {
                self.assets
                    .iter()
                    .map(move |asset| SeriesKey::new(&chain.name, &asset.symbol))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(chain) = self
            .chains
            .iter()
            .map(|chain| chain.name.to_ascii_lowercase())
            .duplicates()
            .next()
        {
            return Err(ConfigError::DuplicateChain(SmolStr::new(chain)));
        }

        if let Some(asset) = self
            .assets
            .iter()
            .map(|asset| asset.symbol.to_ascii_uppercase())
            .duplicates()
            .next()
        {
            return Err(ConfigError::DuplicateAsset(SmolStr::new(asset)));
        }

        for asset in &self.assets {
            match asset.price.fixed_price() {
                Some(price) if !(price.is_finite() && price > 0.0) => {
                    return Err(ConfigError::InvalidFixedPrice(asset.symbol.clone()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::aave_v3()
    }
}

/// Quantity regressed against the price shock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Number of liquidation events per day.
    #[default]
    Count,
    /// Liquidated USD value per day.
    NotionalUsd,
}

/// Inclusive `start..=end` shock grid in fixed steps.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GridConfig {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            start: -0.30,
            end: 0.10,
            step: 0.01,
        }
    }
}

/// Response horizon together with the bandwidth of its own estimator.
///
/// Smaller bandwidths follow the data more closely (less bias, more variance); larger
/// bandwidths average over a wider range of returns (more bias, less variance).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct HorizonConfig {
    pub days: u32,
    pub bandwidth: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StressConfig {
    pub grid: GridConfig,
    pub horizons: Vec<HorizonConfig>,
    /// Multiplier applied to the weighted standard error, 1.96 gives a two-sided ~95% band.
    pub band_multiplier: f64,
    /// Points whose effective sample size falls below this are flagged as low confidence.
    pub min_effective_sample_size: f64,
    pub response: Response,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            horizons: vec![
                HorizonConfig {
                    days: 1,
                    bandwidth: 0.012,
                },
                HorizonConfig {
                    days: 7,
                    bandwidth: 0.020,
                },
            ],
            band_multiplier: 1.96,
            min_effective_sample_size: 5.0,
            response: Response::Count,
        }
    }
}

impl StressConfig {
    pub fn grid(&self) -> Result<ShockGrid, ConfigError> {
        ShockGrid::stepped(self.grid.start, self.grid.end, self.grid.step)
    }

    /// Validated `(Horizon, Bandwidth)` pairs in configuration order.
    pub fn horizons(&self) -> Result<Vec<(Horizon, Bandwidth)>, ConfigError> {
        if self.horizons.is_empty() {
            return Err(ConfigError::InvalidHorizon(
                "at least one horizon is required".to_string(),
            ));
        }

        let mut out: Vec<(Horizon, Bandwidth)> = Vec::with_capacity(self.horizons.len());
        for horizon in &self.horizons {
            let parsed = Horizon::new(horizon.days)?;
            if out.iter().any(|(existing, _)| *existing == parsed) {
                return Err(ConfigError::InvalidHorizon(format!(
                    "duplicate horizon {parsed}"
                )));
            }
            out.push((parsed, Bandwidth::new(horizon.bandwidth)?));
        }
        Ok(out)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid()?;
        self.horizons()?;
        if !(self.band_multiplier.is_finite() && self.band_multiplier >= 0.0) {
            return Err(ConfigError::InvalidBandMultiplier(self.band_multiplier));
        }
        if !(self.min_effective_sample_size.is_finite() && self.min_effective_sample_size >= 0.0) {
            return Err(ConfigError::InvalidMinEffectiveSampleSize(
                self.min_effective_sample_size,
            ));
        }
        Ok(())
    }
}

/// Complete run configuration as read from a JSON file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub registry: Registry,
    pub stress: StressConfig,
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self, StressError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry.validate()?;
        self.stress.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_check() {
        struct TestCase {
            input: SeriesKey,
            expected: Result<&'static str, ConfigError>,
        }

        let registry = Registry::aave_v3();

        let tests = vec![
            TestCase {
                // TC0: configured chain & asset
                input: SeriesKey::new("ethereum", "ETH"),
                expected: Ok("ETH"),
            },
            TestCase {
                // TC1: case-insensitive lookup
                input: SeriesKey::new("Base", "usdc"),
                expected: Ok("USDC"),
            },
            TestCase {
                // TC2: unknown chain
                input: SeriesKey::new("solana", "ETH"),
                expected: Err(ConfigError::UnknownChain(SmolStr::new("solana"))),
            },
            TestCase {
                // TC3: unknown asset
                input: SeriesKey::new("polygon", "DOGE"),
                expected: Err(ConfigError::UnknownAsset(SmolStr::new("DOGE"))),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = registry.check(&test.input).map(|asset| asset.symbol.as_str());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_registry_series_keys_cover_every_pair() {
        let registry = Registry::aave_v3();
        let keys = registry.series_keys();
        assert_eq!(keys.len(), registry.chains.len() * registry.assets.len());
        assert_eq!(keys[0], SeriesKey::new("ethereum", "ETH"));
    }

    #[test]
    fn test_stablecoin_price_strategies() {
        let registry = Registry::aave_v3();
        let usdt = registry.asset("USDT").unwrap();
        assert_eq!(usdt.price.pair(), None);
        assert_eq!(usdt.price.fixed_price(), Some(1.0));

        let usdc = registry.asset("USDC").unwrap();
        assert_eq!(usdc.price.pair(), Some("USDCUSDT"));
        assert_eq!(usdc.price.fixed_price(), Some(1.0));

        let eth = registry.asset("ETH").unwrap();
        assert_eq!(eth.price.fixed_price(), None);
    }

    #[test]
    fn test_stress_config_validate() {
        struct TestCase {
            input: StressConfig,
            expected: Result<(), ConfigError>,
        }

        let tests = vec![
            TestCase {
                // TC0: defaults are valid
                input: StressConfig::default(),
                expected: Ok(()),
            },
            TestCase {
                // TC1: non-positive bandwidth
                input: StressConfig {
                    horizons: vec![HorizonConfig {
                        days: 1,
                        bandwidth: 0.0,
                    }],
                    ..StressConfig::default()
                },
                expected: Err(ConfigError::InvalidBandwidth(0.0)),
            },
            TestCase {
                // TC2: zero-day horizon
                input: StressConfig {
                    horizons: vec![HorizonConfig {
                        days: 0,
                        bandwidth: 0.01,
                    }],
                    ..StressConfig::default()
                },
                expected: Err(ConfigError::InvalidHorizon(
                    "horizon must span at least one day".to_string(),
                )),
            },
            TestCase {
                // TC3: negative band multiplier
                input: StressConfig {
                    band_multiplier: -1.0,
                    ..StressConfig::default()
                },
                expected: Err(ConfigError::InvalidBandMultiplier(-1.0)),
            },
            TestCase {
                // TC4: duplicate horizon
                input: StressConfig {
                    horizons: vec![
                        HorizonConfig {
                            days: 7,
                            bandwidth: 0.01,
                        },
                        HorizonConfig {
                            days: 7,
                            bandwidth: 0.02,
                        },
                    ],
                    ..StressConfig::default()
                },
                expected: Err(ConfigError::InvalidHorizon(
                    "duplicate horizon 7d".to_string(),
                )),
            },
            TestCase {
                // TC5: negative effective sample size threshold
                input: StressConfig {
                    min_effective_sample_size: -1.0,
                    ..StressConfig::default()
                },
                expected: Err(ConfigError::InvalidMinEffectiveSampleSize(-1.0)),
            },
            TestCase {
                // TC6: zero threshold disables flagging explicitly
                input: StressConfig {
                    min_effective_sample_size: 0.0,
                    ..StressConfig::default()
                },
                expected: Ok(()),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.validate();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_stress_config_rejects_nan_threshold() {
        let config = StressConfig {
            min_effective_sample_size: f64::NAN,
            ..StressConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMinEffectiveSampleSize(value)) if value.is_nan()
        ));
    }

    #[test]
    fn test_registry_rejects_repeated_entries() {
        let mut repeated_chain = Registry::aave_v3();
        let mut chain = repeated_chain.chains[0].clone();
        chain.name = SmolStr::new("Ethereum");
        repeated_chain.chains.push(chain);
        assert_eq!(
            repeated_chain.validate(),
            Err(ConfigError::DuplicateChain(SmolStr::new("ethereum")))
        );

        let mut repeated_asset = Registry::aave_v3();
        repeated_asset.assets.push(AssetConfig {
            symbol: SmolStr::new("usdt"),
            price: PriceStrategy::Fixed { price: 1.0 },
        });
        assert_eq!(
            repeated_asset.validate(),
            Err(ConfigError::DuplicateAsset(SmolStr::new("USDT")))
        );

        assert_eq!(Registry::aave_v3().validate(), Ok(()));
    }

    #[test]
    fn test_config_deserialises_with_defaults() {
        let raw = r#"{
            "stress": {
                "band_multiplier": 1.0,
                "response": "notional_usd"
            },
            "registry": {
                "chains": [],
                "assets": [
                    { "symbol": "DAI", "price": { "kind": "fixed", "price": 1.0 } }
                ]
            }
        }"#;

        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.stress.band_multiplier, 1.0);
        assert_eq!(config.stress.response, Response::NotionalUsd);
        assert_eq!(config.stress.grid, GridConfig::default());
        assert_eq!(
            config.registry.assets[0].price,
            PriceStrategy::Fixed { price: 1.0 }
        );
        assert!(config.validate().is_ok());
    }
}
