//! Filter state scheduling: search debounce, page-advance prefetch, prefetch
//! discard under filter changes, and TTL garbage collection.

mod support;

use std::sync::Arc;
use std::time::Duration;

use lampo::{CacheConfig, FetchStatus, ListFilter, Session};

use support::{StubBackend, drain, session_sources, users};

fn session_with(backend: &Arc<StubBackend>) -> Session {
    Session::new(CacheConfig::default(), session_sources(backend))
}

#[tokio::test(start_paused = true)]
async fn rapid_keystrokes_trigger_exactly_one_fetch() {
    let backend = StubBackend::new(users(30));
    let session = session_with(&backend);
    let filters = session.users().filters();

    filters.mount();
    drain().await;
    let baseline = backend.list_calls();

    filters.set_search("a");
    tokio::time::advance(Duration::from_millis(100)).await;
    filters.set_search("ab");
    tokio::time::advance(Duration::from_millis(100)).await;
    filters.set_search("abc");
    drain().await;
    tokio::time::advance(Duration::from_millis(500)).await;
    drain().await;

    assert_eq!(backend.list_calls(), baseline + 1);
    let seen = backend.seen_filters();
    let last = seen.last().expect("a fetch was issued");
    assert_eq!(last.search.as_deref(), Some("abc"));
    assert_eq!(last.page, 1);

    let state = filters.state();
    assert_eq!(state.raw_search, "abc");
    assert_eq!(state.debounced_search, "abc");
}

#[tokio::test(start_paused = true)]
async fn keystrokes_across_the_quiescence_window_trigger_two_fetches() {
    let backend = StubBackend::new(users(30));
    let session = session_with(&backend);
    let filters = session.users().filters();

    filters.mount();
    drain().await;
    let baseline = backend.list_calls();

    filters.set_search("a");
    drain().await;
    tokio::time::advance(Duration::from_millis(600)).await;
    drain().await;

    filters.set_search("ab");
    drain().await;
    tokio::time::advance(Duration::from_millis(600)).await;
    drain().await;

    assert_eq!(backend.list_calls(), baseline + 2);
    let seen = backend.seen_filters();
    let searches: Vec<Option<String>> = seen[seen.len() - 2..]
        .iter()
        .map(|filter| filter.search.clone())
        .collect();
    assert_eq!(
        searches,
        vec![Some("a".to_string()), Some("ab".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn page_advance_prefetches_the_next_page() {
    let backend = StubBackend::new(users(30));
    let session = session_with(&backend);
    let filters = session.users().filters();

    filters.mount();
    drain().await;

    filters.set_page(2);
    drain().await;

    let seen = backend.seen_filters();
    assert!(seen.iter().any(|filter| filter.page == 2));
    assert!(seen.iter().any(|filter| filter.page == 3));

    // The warmed page is cached but nothing is reading it.
    let page3 = ListFilter::new(3, 10, None);
    assert!(session.users().store().peek(&page3).is_some());
    assert_eq!(session.users().store().reader_count(&page3), 0);

    let visible = filters.data().expect("page 2 payload");
    assert_eq!(visible.page, 2);
    assert_eq!(visible.items[0].id, "u-11");
}

#[tokio::test(start_paused = true)]
async fn hover_prefetch_warms_an_arbitrary_page() {
    let backend = StubBackend::new(users(50));
    let session = session_with(&backend);
    let filters = session.users().filters();

    filters.mount();
    drain().await;

    filters.prefetch_page(5);
    drain().await;

    let page5 = ListFilter::new(5, 10, None);
    let entry = session.users().store().peek(&page5).expect("warmed entry");
    assert_eq!(entry.value.expect("payload").items[0].id, "u-41");
}

#[tokio::test(start_paused = true)]
async fn late_prefetch_lands_under_its_own_key_and_is_never_rendered() {
    let backend = StubBackend::new(users(30));
    let config = CacheConfig {
        debounce_ms: 50,
        ..Default::default()
    };
    let session = Session::new(config, session_sources(&backend));
    let filters = session.users().filters();

    filters.mount();
    drain().await;

    backend.set_list_delay(Duration::from_millis(100));
    filters.set_page(2);
    drain().await;
    filters.set_search("user 1");
    drain().await;

    // The search commits while the page-3 prefetch is still in flight.
    tokio::time::advance(Duration::from_millis(50)).await;
    drain().await;
    tokio::time::advance(Duration::from_millis(50)).await;
    drain().await;

    let active = filters.current_filter();
    assert_eq!(active.search.as_deref(), Some("user 1"));
    assert_eq!(active.page, 1);
    // The late prefetch result landed under its own stale key, not the
    // active one, which is still loading.
    assert_eq!(filters.status(), FetchStatus::Loading);
    let page3 = ListFilter::new(3, 10, None);
    assert!(session.users().store().peek(&page3).expect("page 3").value.is_some());

    tokio::time::advance(Duration::from_millis(50)).await;
    drain().await;

    let page = filters.data().expect("search payload");
    assert!(
        page.items
            .iter()
            .all(|item| item.name.to_lowercase().contains("user 1"))
    );
}

#[tokio::test(start_paused = true)]
async fn reader_free_entries_are_swept_after_their_ttl() {
    let backend = StubBackend::new(users(5));
    let session = session_with(&backend);
    let filters = session.users().filters();

    filters.mount();
    drain().await;
    assert_eq!(session.users().store().len(), 1);

    filters.unmount();
    tokio::time::advance(Duration::from_secs(700)).await;
    drain().await;

    assert!(session.users().store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn mounted_entries_survive_the_sweeper() {
    let backend = StubBackend::new(users(5));
    let session = session_with(&backend);
    let filters = session.users().filters();

    filters.mount();
    drain().await;

    tokio::time::advance(Duration::from_secs(700)).await;
    drain().await;

    assert_eq!(session.users().store().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unmount_cancels_the_pending_debounce() {
    let backend = StubBackend::new(users(5));
    let session = session_with(&backend);
    let filters = session.users().filters();

    filters.mount();
    drain().await;
    let baseline = backend.list_calls();

    filters.set_search("zz");
    filters.unmount();
    tokio::time::advance(Duration::from_secs(2)).await;
    drain().await;

    assert_eq!(backend.list_calls(), baseline);
    let state = filters.state();
    assert_eq!(state.raw_search, "zz");
    assert_eq!(state.debounced_search, "");
}

#[tokio::test(start_paused = true)]
async fn search_before_mount_never_schedules_a_timer() {
    let backend = StubBackend::new(users(5));
    let session = session_with(&backend);
    let filters = session.users().filters();

    filters.set_search("early");
    tokio::time::advance(Duration::from_secs(2)).await;
    drain().await;

    assert_eq!(backend.list_calls(), 0);
    assert_eq!(filters.state().raw_search, "early");
    assert_eq!(filters.state().debounced_search, "");
}

#[tokio::test(start_paused = true)]
async fn page_size_change_resets_to_the_first_page() {
    let backend = StubBackend::new(users(30));
    let session = session_with(&backend);
    let filters = session.users().filters();

    filters.mount();
    drain().await;
    filters.set_page(3);
    drain().await;

    filters.set_page_size(20);
    drain().await;

    let filter = filters.current_filter();
    assert_eq!(filter.page, 1);
    assert_eq!(filter.page_size, 20);

    let visible = filters.data().expect("resized payload");
    assert_eq!(visible.items.len(), 20);
    assert_eq!(visible.total_pages, 2);
}
