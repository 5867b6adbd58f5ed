use chrono::{Duration, Utc};
use solwatch_connector::storage::AddressStore;
use solwatch_node::storage::SledAddressStore;
use std::collections::HashSet;

const ADDR_A: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
const ADDR_B: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

fn open() -> anyhow::Result<(tempfile::TempDir, SledAddressStore)> {
    let dir = tempfile::tempdir()?;
    let db = sled::open(dir.path())?;
    Ok((dir, SledAddressStore::new(db)))
}

#[tokio::test]
async fn test_active_addresses_respects_window() -> anyhow::Result<()> {
    let (_dir, store) = open()?;
    let now = Utc::now();
    store.touch("SOL", "mainnet", ADDR_A, now).await?;
    store
        .touch("SOL", "mainnet", ADDR_B, now - Duration::hours(2))
        .await?;

    let active = store
        .active_addresses("SOL", "mainnet", now - Duration::hours(1))
        .await?;

    assert_eq!(active, HashSet::from([ADDR_A.to_string()]));
    Ok(())
}

#[tokio::test]
async fn test_touch_refreshes_query_time() -> anyhow::Result<()> {
    let (_dir, store) = open()?;
    let now = Utc::now();
    store
        .touch("SOL", "mainnet", ADDR_B, now - Duration::hours(2))
        .await?;
    store.touch("SOL", "mainnet", ADDR_B, now).await?;

    let active = store
        .active_addresses("SOL", "mainnet", now - Duration::minutes(1))
        .await?;

    assert_eq!(active, HashSet::from([ADDR_B.to_string()]));
    Ok(())
}

#[tokio::test]
async fn test_networks_are_isolated() -> anyhow::Result<()> {
    let (_dir, store) = open()?;
    let now = Utc::now();
    store.touch("SOL", "devnet", ADDR_A, now).await?;
    store.touch("SOL", "mainnet", ADDR_B, now).await?;

    let since = now - Duration::minutes(1);
    assert_eq!(
        store.active_addresses("SOL", "devnet", since).await?,
        HashSet::from([ADDR_A.to_string()])
    );
    assert_eq!(
        store.active_addresses("SOL", "mainnet", since).await?,
        HashSet::from([ADDR_B.to_string()])
    );
    assert!(store.active_addresses("SOL", "testnet", since).await?.is_empty());
    Ok(())
}
