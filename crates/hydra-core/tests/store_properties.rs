use std::sync::Arc;
use std::time::{Duration, Instant};

use rstest::rstest;
use serde_json::{Value, json};

use hydra_core::codec::identity;
use hydra_core::config::StoreConfig;
use hydra_core::domain::TerminalKind;
use hydra_core::ports::{IdGenerator, SystemClock, UlidGenerator};
use hydra_core::{
    Document, DocumentReader, DocumentWriter, InMemoryDocumentStore, PipelineStatus, Query,
    Status, StoreBuilder, StoreError,
};

async fn store_keeping(number_to_keep: u64) -> InMemoryDocumentStore {
    StoreBuilder::new(StoreConfig::default())
        .with_status(PipelineStatus::new(number_to_keep))
        .build()
        .await
        .unwrap()
}

async fn run_through(store: &InMemoryDocumentStore, doc: &mut Document, kind: TerminalKind) {
    store.insert(doc).await.unwrap();
    let claimed = store.get_and_tag(&Query::new(), "tag").await.unwrap().unwrap();
    store.mark(&claimed, "tag", kind).await.unwrap();
}

#[tokio::test]
async fn null_fields_are_not_stored() {
    let store = store_keeping(10).await;
    let mut doc = Document::new();
    doc.put_content_field("field", "value");
    doc.put_content_field("nullfield", Value::Null);
    let id = store.insert(&mut doc).await.unwrap();

    let stored = store.get_document_by_id(id, false).await.unwrap().unwrap();
    assert!(stored.content_fields().contains_key("field"));
    assert!(!stored.content_fields().contains_key("nullfield"));

    let mut edited = stored.clone();
    edited.put_content_field("field", Value::Null);
    store.update(&edited).await.unwrap();

    let stored = store.get_document_by_id(id, false).await.unwrap().unwrap();
    assert!(stored.content_fields().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_hand_out_one_document_once() {
    let store = store_keeping(10).await;
    store.insert(&mut Document::new()).await.unwrap();

    let mut handles = Vec::new();
    for n in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .get_and_tag(&Query::new(), &format!("worker-{n}"))
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[rstest]
#[case(1, 1)]
#[case(3, 4)]
#[case(5, 10)]
#[tokio::test]
async fn history_never_exceeds_number_to_keep(#[case] keep: u64, #[case] extra: u64) {
    let store = store_keeping(keep).await;
    for n in 0..keep + extra {
        let mut doc = Document::new();
        doc.put_content_field("n", n);
        run_through(&store, &mut doc, TerminalKind::Processed).await;
    }

    assert_eq!(store.inactive_size().await.unwrap() as u64, keep);
    assert_eq!(store.active_size().await.unwrap(), 0);
}

#[tokio::test]
async fn rollover_keeps_the_newest_documents() {
    let store = store_keeping(2).await;
    let mut ids = Vec::new();
    for _ in 0..4 {
        let mut doc = Document::new();
        run_through(&store, &mut doc, TerminalKind::Processed).await;
        ids.push(doc.id().unwrap());
    }

    for old in &ids[..2] {
        assert!(store.get_document_by_id(*old, true).await.unwrap().is_none());
    }
    for kept in &ids[2..] {
        assert!(store.get_document_by_id(*kept, true).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn tail_sees_every_transition_in_order() {
    let store = store_keeping(100).await;
    let mut it = store.inactive_iterator().await.unwrap();

    let kinds = [
        TerminalKind::Processed,
        TerminalKind::Failed,
        TerminalKind::Processed,
        TerminalKind::Discarded,
        TerminalKind::Failed,
        TerminalKind::Processed,
    ];
    let mut ids = Vec::new();
    for (n, kind) in kinds.iter().enumerate() {
        let mut doc = Document::new();
        doc.put_content_field("n", n);
        run_through(&store, &mut doc, *kind).await;
        ids.push(doc.id().unwrap());
    }

    for (n, kind) in kinds.iter().enumerate() {
        let doc = tokio::time::timeout(Duration::from_secs(5), it.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.id(), Some(ids[n]));
        assert_eq!(doc.status(), kind.status());
        assert_eq!(doc.content_field("n"), Some(&json!(n)));
    }
    assert!(!it.has_error());
}

#[tokio::test]
async fn tail_wakes_up_for_later_transitions() {
    let store = store_keeping(10).await;
    let mut it = store.inactive_iterator().await.unwrap();

    let producer = {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut doc = Document::new();
            doc.put_content_field("late", true);
            run_through(&store, &mut doc, TerminalKind::Discarded).await;
        })
    };

    assert!(tokio::time::timeout(Duration::from_secs(5), it.has_next())
        .await
        .unwrap());
    let doc = it.next().await.unwrap();
    assert_eq!(doc.status(), Status::Discarded);
    assert_eq!(doc.content_field("late"), Some(&json!(true)));
    producer.await.unwrap();
}

#[tokio::test]
async fn tail_starts_at_the_current_end() {
    let store = store_keeping(10).await;
    let mut before = Document::new();
    run_through(&store, &mut before, TerminalKind::Processed).await;

    let mut it = store.inactive_iterator().await.unwrap();
    let mut after = Document::new();
    run_through(&store, &mut after, TerminalKind::Failed).await;

    let doc = tokio::time::timeout(Duration::from_secs(5), it.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.id(), after.id());
}

#[tokio::test]
async fn interrupting_an_idle_tail_stops_it_without_error() {
    let store = store_keeping(10).await;
    let mut it = store.inactive_iterator().await.unwrap();
    let interrupter = it.interrupter();

    let started = Instant::now();
    let waiter = tokio::spawn(async move {
        let next = it.next().await;
        (next, it.has_error(), it.is_interrupted())
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    interrupter.interrupt();

    let (next, has_error, interrupted) = tokio::time::timeout(Duration::from_secs(10), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(next.is_none());
    assert!(!has_error);
    assert!(interrupted);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interrupting_a_waiting_has_next_returns_false() {
    let store = store_keeping(10).await;
    let mut it = store.inactive_iterator().await.unwrap();
    let interrupter = it.interrupter();

    let started = Instant::now();
    let waiter = tokio::spawn(async move {
        let more = it.has_next().await;
        (more, it.next().await, it.has_error(), it.is_interrupted())
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    interrupter.interrupt();
    // the feeder notices the store going away only after the interrupt
    drop(store);

    let (more, next, has_error, interrupted) =
        tokio::time::timeout(Duration::from_secs(10), waiter)
            .await
            .unwrap()
            .unwrap();
    assert!(!more);
    assert!(next.is_none());
    assert!(!has_error);
    assert!(interrupted);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn interrupted_tail_never_reports_an_error_later() {
    let store = store_keeping(10).await;
    let mut it = store.inactive_iterator().await.unwrap();
    it.interrupt();

    let mut doc = Document::new();
    run_through(&store, &mut doc, TerminalKind::Processed).await;
    drop(store);

    assert!(it.next().await.is_none());
    assert!(!it.has_next().await);
    assert!(!it.has_error());
    assert!(it.error().is_none());
}

#[test]
fn generated_ids_survive_both_external_forms() {
    let id = UlidGenerator::new(SystemClock).generate_document_id();

    let from_json = identity::from_json(&identity::to_json(&id).unwrap()).unwrap();
    let from_primitive = identity::from_primitive(&identity::to_primitive(&id)).unwrap();

    assert_eq!(from_json, id);
    assert_eq!(from_primitive, id);
    assert_eq!(id.to_string().parse::<hydra_core::DocumentId>().unwrap(), id);
}

#[tokio::test]
async fn fetched_tag_can_be_removed_independently() {
    let store = store_keeping(10).await;
    let mut doc = Document::new();
    doc.put_content_field("body", "text");
    let id = store.insert(&mut doc).await.unwrap();

    let mut claimed = store.get_and_tag(&Query::new(), "t").await.unwrap().unwrap();
    assert!(claimed.was_fetched_by("t"));
    let stored = store.get_document_by_id(id, false).await.unwrap().unwrap();
    assert_eq!(stored.fetched_tags(), vec!["t".to_string()]);

    assert!(claimed.remove_fetched("t"));
    store.update(&claimed).await.unwrap();

    let stored = store.get_document_by_id(id, false).await.unwrap().unwrap();
    assert!(!stored.was_fetched_by("t"));
    assert_eq!(stored.content_field("body"), Some(&json!("text")));
}

#[tokio::test]
async fn oversize_documents_are_rejected_whole() {
    let config = StoreConfig {
        max_document_bytes: 1024,
        ..StoreConfig::default()
    };
    let store = StoreBuilder::new(config)
        .with_status(PipelineStatus::new(10))
        .build()
        .await
        .unwrap();

    let mut big = Document::new();
    big.put_content_field("blob", "x".repeat(2048));
    let err = store.insert(&mut big).await.unwrap_err();
    assert!(matches!(err, StoreError::DocumentTooLarge { limit: 1024, .. }));
    assert!(big.id().is_none());
    assert_eq!(store.active_size().await.unwrap(), 0);

    let mut small = Document::new();
    small.put_content_field("blob", "x");
    let id = store.insert(&mut small).await.unwrap();
    small.put_content_field("blob", "x".repeat(2048));
    assert!(matches!(
        store.update(&small).await,
        Err(StoreError::DocumentTooLarge { .. })
    ));
    let stored = store.get_document_by_id(id, false).await.unwrap().unwrap();
    assert_eq!(stored.content_field("blob"), Some(&json!("x")));
}

#[tokio::test]
async fn large_documents_under_the_limit_are_kept_intact() {
    let store = store_keeping(10).await;
    let payload = "y".repeat(1024 * 1024);
    let mut doc = Document::new();
    doc.put_content_field("payload", payload.clone());
    run_through(&store, &mut doc, TerminalKind::Processed).await;

    let done = store
        .get_document_by_id(doc.id().unwrap(), true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.content_field("payload"), Some(&json!(payload)));
}

#[tokio::test]
async fn finished_documents_keep_edits_and_claim_history() {
    let store = store_keeping(10).await;
    let mut doc = Document::new();
    doc.put_content_field("stage_in", 1);
    store.insert(&mut doc).await.unwrap();

    let mut claimed = store.get_and_tag(&Query::new(), "tika").await.unwrap().unwrap();
    claimed.put_content_field("stage_out", "parsed");
    claimed.put_content_field("stage_in", Value::Null);
    store.mark_processed(&claimed, "tika").await.unwrap();

    let done = store
        .get_document_by_id(doc.id().unwrap(), true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status(), Status::Processed);
    assert_eq!(done.content_field("stage_out"), Some(&json!("parsed")));
    assert!(!done.content_fields().contains_key("stage_in"));
    assert!(done.was_fetched_by("tika"));
    assert!(done.metadata()["processed"].get("tika").is_some());
}

#[tokio::test]
async fn status_counts_mix_is_reflected_in_history() {
    let store = Arc::new(store_keeping(20).await);
    let mut it = store.inactive_iterator().await.unwrap();

    let plan = [(TerminalKind::Processed, 3), (TerminalKind::Failed, 2), (TerminalKind::Discarded, 1)];
    for (kind, count) in plan {
        for _ in 0..count {
            run_through(&store, &mut Document::new(), kind).await;
        }
    }

    let (mut processed, mut failed, mut discarded) = (0, 0, 0);
    for _ in 0..6 {
        let doc = tokio::time::timeout(Duration::from_secs(5), it.next())
            .await
            .unwrap()
            .unwrap();
        match doc.status() {
            Status::Processed => processed += 1,
            Status::Failed => failed += 1,
            Status::Discarded => discarded += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!((processed, failed, discarded), (3, 2, 1));
    assert_eq!(store.inactive_size().await.unwrap(), 6);
}
