//! Chunk cache interaction: transparency, partial hits, and corruption
//! recovery.

use std::sync::Arc;

use cart_client::{ClientError, FetchOptions, PublishOptions};
use cart_store::ChunkCache;
use cart_tests::TestCluster;
use tempfile::TempDir;

#[tokio::test(start_paused = true)]
async fn cache_is_transparent() {
    let cluster = TestCluster::start().await.unwrap();
    let blob: Vec<u8> = (0..500u32).map(|i| (i % 241) as u8).collect();

    let receipt = cluster
        .client
        .publish(
            &cluster.publisher,
            &blob,
            PublishOptions {
                chunk_size: 64,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Uncached fetch.
    let plain = cluster
        .client
        .fetch(&receipt.content_id, FetchOptions::default())
        .await
        .unwrap()
        .unwrap();

    // Pre-populate a cache with the correct chunk payloads.
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(ChunkCache::open(dir.path()).unwrap());
    let chunks: Vec<(u32, Vec<u8>)> = blob
        .chunks(64)
        .enumerate()
        .map(|(i, part)| (i as u32, part.to_vec()))
        .collect();
    cache.put_chunks(&receipt.content_id, &chunks).unwrap();

    let cached_client = cluster.another_client().with_cache(cache.clone());
    let cached = cached_client
        .fetch(&receipt.content_id, FetchOptions::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(plain.bytes, cached.bytes);
    assert_eq!(cached.bytes, blob);
    // Every chunk came from the cache.
    assert_eq!(cache.stats().hits as usize, chunks.len());
}

#[tokio::test(start_paused = true)]
async fn partial_cache_hits_fill_from_ledger() {
    let cluster = TestCluster::start().await.unwrap();
    let blob: Vec<u8> = (0..300u32).map(|i| (i % 199) as u8).collect();

    let receipt = cluster
        .client
        .publish(
            &cluster.publisher,
            &blob,
            PublishOptions {
                chunk_size: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Only chunks 0 and 3 are cached.
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(ChunkCache::open(dir.path()).unwrap());
    cache
        .put_chunk(&receipt.content_id, 0, &blob[..50])
        .unwrap();
    cache
        .put_chunk(&receipt.content_id, 3, &blob[150..200])
        .unwrap();

    let client = cluster.another_client().with_cache(cache);
    let fetched = client
        .fetch(&receipt.content_id, FetchOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.bytes, blob);
}

#[tokio::test(start_paused = true)]
async fn corrupt_cached_chunk_surfaces_integrity_and_recovers() {
    let cluster = TestCluster::start().await.unwrap();
    let blob: Vec<u8> = (0..200u32).map(|i| (i % 127) as u8).collect();

    let receipt = cluster
        .client
        .publish(
            &cluster.publisher,
            &blob,
            PublishOptions {
                chunk_size: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Cache all chunks, then flip one byte in chunk 0.
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(ChunkCache::open(dir.path()).unwrap());
    let mut corrupted = blob[..50].to_vec();
    corrupted[10] ^= 0xff;
    cache.put_chunk(&receipt.content_id, 0, &corrupted).unwrap();
    for (i, part) in blob.chunks(50).enumerate().skip(1) {
        cache
            .put_chunk(&receipt.content_id, i as u32, part)
            .unwrap();
    }

    let client = cluster.another_client().with_cache(cache.clone());
    let err = client
        .fetch(&receipt.content_id, FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Integrity { .. }));

    // The poisoned entries were invalidated.
    assert!(cache
        .get_all_chunks(&receipt.content_id)
        .unwrap()
        .is_empty());

    // A subsequent fetch recovers from the ledger.
    let fetched = client
        .fetch(&receipt.content_id, FetchOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.bytes, blob);
}

#[tokio::test(start_paused = true)]
async fn unverified_fetch_trusts_the_cache() {
    let cluster = TestCluster::start().await.unwrap();
    let blob = b"trusting blob".to_vec();

    let receipt = cluster
        .client
        .publish(
            &cluster.publisher,
            &blob,
            PublishOptions {
                chunk_size: 8,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let dir = TempDir::new().unwrap();
    let cache = Arc::new(ChunkCache::open(dir.path()).unwrap());
    let client = cluster.another_client().with_cache(cache);

    let fetched = client
        .fetch(
            &receipt.content_id,
            FetchOptions {
                verify: false,
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.bytes, blob);
}
