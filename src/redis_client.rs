use redis::aio::ConnectionManager;
use redis::RedisResult;

/// Creates a `ConnectionManager` that auto-reconnects on failure.
///
/// `ConnectionManager` is cheaply cloneable; every clone shares the same
/// multiplexed connection, so the counter source and the history store
/// can share one when they point at the same server.
pub async fn connect(url: &str) -> RedisResult<ConnectionManager> {
    let client = redis::Client::open(url)?;
    ConnectionManager::new(client).await
}
