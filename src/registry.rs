//! # Token / Pool Registry
//!
//! Static catalog of known tokens and candidate pool pairs, loaded once at
//! startup from two small CSV files. A missing token file falls back to the
//! built-in list; a missing pool file just means the arbitrage scan has no
//! candidates. Only structurally broken lines are fatal.

use std::collections::HashMap;
use std::path::Path;

use bigdecimal::BigDecimal;
use std::str::FromStr;
use tracing::{info, warn};

use crate::errors::ConfigError;
use crate::types::{TokenKey, FEE_TIERS};

pub const DEFAULT_TOKENS_FILE: &str = "tokens.csv";
pub const DEFAULT_POOLS_FILE: &str = "pools.csv";

/// Symbols routed through when a direct pool is missing: the gas token
/// plus the major stablecoins.
const INTERMEDIATE_SYMBOLS: [&str; 3] = ["GALA", "GUSDC", "GUSDT"];

#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub symbol: String,
    pub key: TokenKey,
    pub decimals: u8,
    pub description: String,
}

/// A candidate pool pair from the pool table, with the liquidity observed
/// when the table was compiled. Liquidity here only pre-filters scan
/// candidates; live snapshots are authoritative.
#[derive(Debug, Clone)]
pub struct PoolCandidate {
    pub token0: TokenKey,
    pub token1: TokenKey,
    pub fee: u32,
    pub observed_liquidity: BigDecimal,
}

impl PoolCandidate {
    pub fn contains(&self, token: &TokenKey) -> bool {
        &self.token0 == token || &self.token1 == token
    }
}

#[derive(Debug)]
pub struct Registry {
    by_key: HashMap<TokenKey, TokenInfo>,
    by_symbol: HashMap<String, TokenKey>,
    pools: Vec<PoolCandidate>,
}

impl Registry {
    /// Loads `tokens.csv` and `pools.csv` from the working directory.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(Path::new(DEFAULT_TOKENS_FILE), Path::new(DEFAULT_POOLS_FILE))
    }

    pub fn load(tokens_path: &Path, pools_path: &Path) -> Result<Self, ConfigError> {
        let tokens = match std::fs::read_to_string(tokens_path) {
            Ok(content) => parse_token_table(&content, &tokens_path.display().to_string())?,
            Err(e) => {
                warn!(
                    target: "registry",
                    file = %tokens_path.display(),
                    error = %e,
                    "Token table unreadable, using built-in defaults"
                );
                builtin_tokens()
            }
        };

        let mut by_key = HashMap::new();
        let mut by_symbol = HashMap::new();
        for token in tokens {
            by_symbol.insert(token.symbol.clone(), token.key.clone());
            by_key.insert(token.key.clone(), token);
        }

        let pools = match std::fs::read_to_string(pools_path) {
            Ok(content) => parse_pool_table(&content, &pools_path.display().to_string())?,
            Err(e) => {
                warn!(
                    target: "registry",
                    file = %pools_path.display(),
                    error = %e,
                    "Pool table unreadable, arbitrage scanning will find no paths"
                );
                Vec::new()
            }
        };

        info!(
            target: "registry",
            tokens = by_key.len(),
            pools = pools.len(),
            "Registry loaded"
        );

        Ok(Self { by_key, by_symbol, pools })
    }

    pub fn from_parts(tokens: Vec<TokenInfo>, pools: Vec<PoolCandidate>) -> Self {
        let mut by_key = HashMap::new();
        let mut by_symbol = HashMap::new();
        for token in tokens {
            by_symbol.insert(token.symbol.clone(), token.key.clone());
            by_key.insert(token.key.clone(), token);
        }
        Self { by_key, by_symbol, pools }
    }

    pub fn token_by_key(&self, key: &TokenKey) -> Option<&TokenInfo> {
        self.by_key.get(key)
    }

    pub fn token_by_symbol(&self, symbol: &str) -> Option<&TokenInfo> {
        self.by_symbol.get(symbol).and_then(|k| self.by_key.get(k))
    }

    pub fn all_pools(&self) -> &[PoolCandidate] {
        &self.pools
    }

    pub fn pools_for_token(&self, key: &TokenKey) -> Vec<&PoolCandidate> {
        self.pools.iter().filter(|p| p.contains(key)).collect()
    }

    pub fn pools_above_liquidity(&self, threshold: &BigDecimal) -> Vec<&PoolCandidate> {
        self.pools
            .iter()
            .filter(|p| &p.observed_liquidity > threshold)
            .collect()
    }

    /// Well-known tokens worth routing through on a two-hop fallback,
    /// excluding the swap's own endpoints.
    pub fn intermediates(&self, exclude: &[&TokenKey]) -> Vec<TokenKey> {
        INTERMEDIATE_SYMBOLS
            .iter()
            .filter_map(|sym| self.by_symbol.get(*sym))
            .filter(|key| !exclude.contains(key))
            .cloned()
            .collect()
    }
}

fn builtin_tokens() -> Vec<TokenInfo> {
    let defaults: [(&str, u8, &str); 6] = [
        ("GALA", 8, "Gala games utility token"),
        ("GUSDC", 6, "Bridged USDC"),
        ("GUSDT", 6, "Bridged USDT"),
        ("GWETH", 18, "Bridged wrapped ether"),
        ("GWBTC", 8, "Bridged wrapped bitcoin"),
        ("SILK", 8, "Silk in-game currency"),
    ];
    defaults
        .iter()
        .map(|(symbol, decimals, description)| TokenInfo {
            symbol: symbol.to_string(),
            key: TokenKey::from_symbol(symbol),
            decimals: *decimals,
            description: description.to_string(),
        })
        .collect()
}

/// `symbol,tokenKey,decimals,description` with a header row. The
/// description is free text and may itself contain commas.
fn parse_token_table(content: &str, file: &str) -> Result<Vec<TokenInfo>, ConfigError> {
    let mut tokens = Vec::new();
    for (idx, line) in content.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.splitn(4, ',').collect();
        if fields.len() < 4 {
            return Err(ConfigError::MalformedCsv {
                file: file.to_string(),
                line: idx + 1,
                expected: 4,
                got: fields.len(),
            });
        }
        let symbol = fields[0].trim().to_string();
        let key: TokenKey = match fields[1].trim().parse() {
            Ok(key) => key,
            // A bare symbol in the key column expands with the template.
            Err(_) => TokenKey::from_symbol(fields[1].trim()),
        };
        let decimals: u8 = fields[2].trim().parse().map_err(|e| ConfigError::InvalidValue {
            name: "tokens.csv decimals",
            reason: format!("line {}: {}", idx + 1, e),
        })?;
        tokens.push(TokenInfo {
            symbol,
            key,
            decimals,
            description: fields[3].trim().to_string(),
        });
    }
    Ok(tokens)
}

/// `token0Symbol,token1Symbol,fee,liquidity` with a header row.
fn parse_pool_table(content: &str, file: &str) -> Result<Vec<PoolCandidate>, ConfigError> {
    let mut pools = Vec::new();
    for (idx, line) in content.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 4 {
            return Err(ConfigError::MalformedCsv {
                file: file.to_string(),
                line: idx + 1,
                expected: 4,
                got: fields.len(),
            });
        }
        let fee: u32 = fields[2].trim().parse().map_err(|e| ConfigError::InvalidValue {
            name: "pools.csv fee",
            reason: format!("line {}: {}", idx + 1, e),
        })?;
        if !FEE_TIERS.contains(&fee) {
            return Err(ConfigError::InvalidValue {
                name: "pools.csv fee",
                reason: format!("line {}: {} is not one of {:?}", idx + 1, fee, FEE_TIERS),
            });
        }
        let observed_liquidity =
            BigDecimal::from_str(fields[3].trim()).map_err(|e| ConfigError::InvalidValue {
                name: "pools.csv liquidity",
                reason: format!("line {}: {}", idx + 1, e),
            })?;
        pools.push(PoolCandidate {
            token0: TokenKey::from_symbol(fields[0].trim()),
            token1: TokenKey::from_symbol(fields[1].trim()),
            fee,
            observed_liquidity,
        });
    }
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKENS: &str = "symbol,tokenKey,decimals,description\n\
        GALA,GALA|Unit|none|none,8,Gala utility token\n\
        GUSDC,GUSDC|Unit|none|none,6,Bridged USDC, Circle issued\n";

    const POOLS: &str = "token0Symbol,token1Symbol,fee,liquidity\n\
        GALA,GUSDC,3000,250000\n\
        GALA,GUSDC,10000,1200\n";

    #[test]
    fn token_table_parses_and_indexes() {
        let tokens = parse_token_table(TOKENS, "tokens.csv").unwrap();
        let reg = Registry::from_parts(tokens, Vec::new());
        assert_eq!(reg.token_by_symbol("GALA").unwrap().decimals, 8);
        // Description keeps its embedded comma.
        assert_eq!(
            reg.token_by_symbol("GUSDC").unwrap().description,
            "Bridged USDC, Circle issued"
        );
        let key: TokenKey = "GALA|Unit|none|none".parse().unwrap();
        assert_eq!(reg.token_by_key(&key).unwrap().symbol, "GALA");
    }

    #[test]
    fn pool_table_filters_by_liquidity() {
        let pools = parse_pool_table(POOLS, "pools.csv").unwrap();
        let reg = Registry::from_parts(builtin_tokens(), pools);
        assert_eq!(reg.all_pools().len(), 2);
        assert_eq!(reg.pools_above_liquidity(&BigDecimal::from(2000)).len(), 1);
        let gala = TokenKey::from_symbol("GALA");
        assert_eq!(reg.pools_for_token(&gala).len(), 2);
    }

    #[test]
    fn short_line_is_a_config_error() {
        let bad = "token0Symbol,token1Symbol,fee,liquidity\nGALA,GUSDC,3000\n";
        assert!(matches!(
            parse_pool_table(bad, "pools.csv"),
            Err(ConfigError::MalformedCsv { line: 2, .. })
        ));
    }

    #[test]
    fn unknown_fee_tier_is_rejected() {
        let bad = "token0Symbol,token1Symbol,fee,liquidity\nGALA,GUSDC,1234,1\n";
        assert!(parse_pool_table(bad, "pools.csv").is_err());
    }

    #[test]
    fn intermediates_exclude_endpoints() {
        let reg = Registry::from_parts(builtin_tokens(), Vec::new());
        let gala = TokenKey::from_symbol("GALA");
        let mids = reg.intermediates(&[&gala]);
        assert!(!mids.contains(&gala));
        assert!(mids.contains(&TokenKey::from_symbol("GUSDC")));
    }
}
