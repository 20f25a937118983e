//! Balance partitioning and intent derivation, including the literal
//! DCA / gas-starvation scenarios and the boundary behaviors around the
//! preferred and gas tokens.

mod common;

use std::sync::Arc;

use common::{asset, dec, key, test_config, MockTransport};
use gswap_agent::balances::BalanceManager;
use gswap_agent::config::Config;
use gswap_agent::types::{TradeReason, TradeIntent};

fn manager_with(config: Config, assets: Vec<(&str, &str)>) -> BalanceManager {
    let transport = Arc::new(MockTransport::new());
    transport.set_assets(assets.into_iter().map(|(s, q)| asset(s, q)).collect());
    BalanceManager::new(transport, Arc::new(config))
}

fn silk_config() -> Config {
    Config {
        preferred_token: key("SILK"),
        preferred_token_name: "$SILK".to_string(),
        ..test_config()
    }
}

fn reasons(intents: &[TradeIntent]) -> Vec<TradeReason> {
    intents.iter().map(|i| i.reason).collect()
}

#[tokio::test]
async fn dca_happy_path_orders_dca_before_excess_gas() {
    // preferred SILK, gas GALA, min 100, pct 10%: {GALA:150, SILK:0,
    // GUSDC:50} derives GUSDC→SILK 5 then GALA→SILK (150−100)·0.10·½.
    let manager = manager_with(
        silk_config(),
        vec![("GALA", "150"), ("SILK", "0"), ("GUSDC", "50")],
    );
    let summary = manager.fetch_summary().await.unwrap();
    assert_eq!(summary.gas, dec("150"));
    assert_eq!(summary.preferred, dec("0"));
    assert_eq!(summary.others.len(), 1);

    let intents = manager.derive_intents(&summary);
    assert_eq!(
        reasons(&intents),
        vec![TradeReason::DcaToPreferred, TradeReason::SpendExcessGas]
    );

    assert_eq!(intents[0].source, key("GUSDC"));
    assert_eq!(intents[0].target, key("SILK"));
    assert_eq!(intents[0].amount, dec("5"));

    assert_eq!(intents[1].source, key("GALA"));
    assert_eq!(intents[1].target, key("SILK"));
    assert_eq!(intents[1].amount, dec("2.5"));
}

#[tokio::test]
async fn gas_starvation_emits_refills_before_dca_and_keeps_small_amounts() {
    let manager = manager_with(
        silk_config(),
        vec![
            ("GALA", "40"),
            ("SILK", "0"),
            ("GUSDC", "50"),
            ("GWBTC", "0.0001"),
        ],
    );
    let summary = manager.fetch_summary().await.unwrap();
    let intents = manager.derive_intents(&summary);

    assert_eq!(
        reasons(&intents),
        vec![
            TradeReason::RefillGas,
            TradeReason::RefillGas,
            TradeReason::DcaToPreferred,
            TradeReason::DcaToPreferred,
        ]
    );

    assert_eq!(intents[0].source, key("GUSDC"));
    assert_eq!(intents[0].target, key("GALA"));
    assert_eq!(intents[0].amount, dec("5"));

    // 0.0001 × 10% = 1e-5: above the dust floor, so it survives.
    assert_eq!(intents[1].source, key("GWBTC"));
    assert_eq!(intents[1].amount, dec("0.00001"));

    assert_eq!(intents[2].source, key("GUSDC"));
    assert_eq!(intents[2].target, key("SILK"));
    assert_eq!(intents[3].source, key("GWBTC"));
    assert_eq!(intents[3].target, key("SILK"));
}

#[tokio::test]
async fn preferred_equal_to_gas_never_spends_excess() {
    // Default config: preferred == gas == GALA, balance far above 2×min.
    let manager = manager_with(test_config(), vec![("GALA", "100000"), ("GUSDC", "7")]);
    let summary = manager.fetch_summary().await.unwrap();
    let intents = manager.derive_intents(&summary);
    assert!(intents
        .iter()
        .all(|i| i.reason != TradeReason::SpendExcessGas));
}

#[tokio::test]
async fn no_other_tokens_and_healthy_gas_derives_nothing() {
    let manager = manager_with(test_config(), vec![("GALA", "150")]);
    let summary = manager.fetch_summary().await.unwrap();
    assert!(summary.others.is_empty());
    assert!(manager.derive_intents(&summary).is_empty());
}

#[tokio::test]
async fn dust_amounts_are_dropped() {
    let manager = manager_with(silk_config(), vec![("GALA", "150"), ("GUSDC", "0.000001")]);
    let summary = manager.fetch_summary().await.unwrap();
    let intents = manager.derive_intents(&summary);
    // 0.000001 × 10% = 1e-7 < the 1e-6 dust floor: only the excess-gas
    // intent survives.
    assert_eq!(reasons(&intents), vec![TradeReason::SpendExcessGas]);
}

#[tokio::test]
async fn partition_is_disjoint_and_exhaustive_over_the_fetch() {
    let manager = manager_with(
        silk_config(),
        vec![("GALA", "10"), ("SILK", "20"), ("GUSDC", "30"), ("GWETH", "40")],
    );
    let summary = manager.fetch_summary().await.unwrap();
    assert_eq!(summary.total_token_count, 4);
    assert_eq!(summary.preferred, dec("20"));
    assert_eq!(summary.gas, dec("10"));
    let other_keys: Vec<_> = summary.others.iter().map(|o| o.token.clone()).collect();
    assert_eq!(other_keys, vec![key("GUSDC"), key("GWETH")]);
}
