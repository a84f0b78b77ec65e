//! Integration tests for per-item serialization

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use mlib_common::events::CatalogEvent;
use mlib_meta::{ImageCandidate, ImageKind, RefreshContext};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use helpers::{service, settled_movie, MemoryRepository, SetProbe, StaticProvider};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_item_refreshes_are_serialized() {
    let repo = MemoryRepository::new();
    let service = Arc::new(service(repo.clone(), SetProbe::missing(&[])));
    let id = service.register(settled_movie("Ikiru")).await;
    let provider = Arc::new(StaticProvider::new(None).with_delay(Duration::from_millis(20)));

    let mut join_set = JoinSet::new();
    for _ in 0..5 {
        let service = Arc::clone(&service);
        let provider = Arc::clone(&provider);
        join_set.spawn(async move {
            service
                .refresh(id, &RefreshContext::scheduled(), provider.as_ref(), &CancellationToken::new())
                .await
        });
    }

    while let Some(result) = join_set.join_next().await {
        let outcome = result.expect("Task panicked").expect("Refresh failed");
        assert!(outcome.is_refreshed());
    }

    assert_eq!(provider.calls(), 5);
    assert_eq!(provider.max_per_item(), 1, "Two refreshes of one item overlapped");
    assert_eq!(repo.save_count(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_items_refresh_in_parallel() {
    let repo = MemoryRepository::new();
    let service = Arc::new(service(repo.clone(), SetProbe::missing(&[])));
    let provider = Arc::new(StaticProvider::new(None).with_delay(Duration::from_millis(200)));

    let mut ids = Vec::new();
    for name in ["Ran", "Kagemusha", "Yojimbo", "Sanjuro"] {
        ids.push(service.register(settled_movie(name)).await);
    }

    let mut join_set = JoinSet::new();
    for id in ids {
        let service = Arc::clone(&service);
        let provider = Arc::clone(&provider);
        join_set.spawn(async move {
            service
                .refresh(id, &RefreshContext::scheduled(), provider.as_ref(), &CancellationToken::new())
                .await
        });
    }

    let all = async {
        while let Some(result) = join_set.join_next().await {
            result.expect("Task panicked").expect("Refresh failed");
        }
    };
    tokio::time::timeout(Duration::from_secs(5), all)
        .await
        .expect("Refreshes did not finish");

    assert_eq!(provider.calls(), 4);
    assert!(
        provider.max_in_flight() >= 2,
        "Distinct items never overlapped (max in flight {})",
        provider.max_in_flight()
    );
    assert_eq!(provider.max_per_item(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_image_batches_and_refreshes_do_not_lose_updates() {
    let repo = MemoryRepository::new();
    let service = Arc::new(service(repo.clone(), SetProbe::missing(&[])));
    let id = service.register(settled_movie("Rashomon")).await;
    let provider = Arc::new(StaticProvider::new(None).with_delay(Duration::from_millis(5)));

    let mut join_set = JoinSet::new();
    for i in 0..10 {
        let images_service = Arc::clone(&service);
        join_set.spawn(async move {
            images_service
                .add_images(
                    id,
                    ImageKind::Backdrop,
                    vec![ImageCandidate::remote(format!("https://img.example/{}.jpg", i))],
                    &CancellationToken::new(),
                )
                .await
                .map(|_| ())
        });

        let refresh_service = Arc::clone(&service);
        let provider = Arc::clone(&provider);
        join_set.spawn(async move {
            refresh_service
                .refresh(id, &RefreshContext::scheduled(), provider.as_ref(), &CancellationToken::new())
                .await
                .map(|_| ())
        });
    }

    while let Some(result) = join_set.join_next().await {
        result.expect("Task panicked").expect("Operation failed");
    }

    let item = service.snapshot(id).await.unwrap();
    let slots: Vec<usize> = item
        .images
        .images(ImageKind::Backdrop)
        .iter()
        .map(|r| r.slot_index)
        .collect();
    assert_eq!(slots, (0..10).collect::<Vec<_>>());
    assert_eq!(repo.stored(id).unwrap().images.count(ImageKind::Backdrop), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_image_events_carry_committed_counts() {
    let repo = MemoryRepository::new();
    let service = Arc::new(service(repo.clone(), SetProbe::missing(&[])));
    let id = service.register(settled_movie("Dersu Uzala")).await;
    let mut events = service.event_bus().subscribe();

    let mut join_set = JoinSet::new();
    for i in 0..10 {
        let service = Arc::clone(&service);
        join_set.spawn(async move {
            service
                .add_images(
                    id,
                    ImageKind::Screenshot,
                    vec![ImageCandidate::remote(format!("https://img.example/s{}.jpg", i))],
                    &CancellationToken::new(),
                )
                .await
        });
    }
    while let Some(result) = join_set.join_next().await {
        assert!(result.expect("Task panicked").expect("Add failed"));
    }

    let mut counts = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CatalogEvent::ImagesChanged { count, .. } = event {
            counts.push(count);
        }
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=10).collect::<Vec<_>>());
}
