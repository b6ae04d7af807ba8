//! End-to-end produce-replicate-consume suites over the in-memory log.

use plexlog_core::entry::LogRecord;
use plexlog_core::{
    ConsumerHandle, Demultiplexer, LogError, LogIndex, Multiplexer, StreamError, StreamId,
    StreamTag,
};
use plexlog_testkit::fixtures::{self, DEFAULT_TAG, INT_STREAM, JSON_TAG, STRING_STREAM};
use plexlog_testkit::harness::Harness;
use plexlog_testkit::init_tracing;
use plexlog_testkit::{generators, validators};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

/// Drain iterators starting at `from` until `n` entries have been seen.
async fn collect_n<T: Send + 'static>(
    consumer: &ConsumerHandle<T>,
    from: LogIndex,
    n: usize,
) -> Vec<(LogIndex, T)> {
    let mut out = Vec::new();
    let mut cursor = from;
    while out.len() < n {
        let iter = tokio::time::timeout(WAIT, consumer.wait_for_iterator(cursor))
            .await
            .expect("wait timed out")
            .expect("wait failed");
        cursor = iter.range().1;
        out.extend(iter);
    }
    out
}

#[tokio::test]
async fn test_interleaved_streams_demultiplex_independently() {
    init_tracing();

    // Populate the log first so a single replay batch carries everything
    // and each stream's first wait observes its full sequence.
    let spec = fixtures::two_stream_spec();
    let log = Arc::new(plexlog_core::log::MemoryLog::new());
    let mux = Multiplexer::new(Arc::clone(&spec), log.clone());
    let ints = mux.get_stream::<i64>(INT_STREAM).unwrap();
    let strings = mux.get_stream::<String>(STRING_STREAM).unwrap();

    assert_eq!(ints.insert(&10).await.unwrap(), LogIndex::new(1));
    assert_eq!(strings.insert(&"a".to_string()).await.unwrap(), LogIndex::new(2));
    assert_eq!(ints.insert(&20).await.unwrap(), LogIndex::new(3));
    assert_eq!(ints.insert(&30).await.unwrap(), LogIndex::new(4));

    let demux = Demultiplexer::new(spec, log);
    demux.listen();

    let int_consumer = demux.get_stream::<i64>(INT_STREAM).unwrap();
    let iter = tokio::time::timeout(WAIT, int_consumer.wait_for_iterator(LogIndex::new(1)))
        .await
        .unwrap()
        .unwrap();
    let collected: Vec<_> = iter.collect();
    assert_eq!(
        collected,
        vec![
            (LogIndex::new(1), 10),
            (LogIndex::new(3), 20),
            (LogIndex::new(4), 30),
        ]
    );

    let string_consumer = demux.get_stream::<String>(STRING_STREAM).unwrap();
    let iter = tokio::time::timeout(WAIT, string_consumer.wait_for_iterator(LogIndex::new(1)))
        .await
        .unwrap()
        .unwrap();
    let collected: Vec<_> = iter.collect();
    assert_eq!(collected, vec![(LogIndex::new(2), "a".to_string())]);

    demux.shutdown().await;
}

#[tokio::test]
async fn test_per_stream_order_under_concurrent_producers() {
    init_tracing();
    let harness = Harness::new();

    const PER_STREAM: usize = 100;
    let int_values = generators::int_sequence(1, PER_STREAM);
    let string_values = generators::string_sequence("s", PER_STREAM);

    let ints = harness.mux.get_stream::<i64>(INT_STREAM).unwrap();
    let strings = harness.mux.get_stream::<String>(STRING_STREAM).unwrap();

    let int_task = {
        let values = int_values.clone();
        tokio::spawn(async move {
            for value in &values {
                ints.insert(value).await.unwrap();
            }
        })
    };
    let string_task = {
        let values = string_values.clone();
        tokio::spawn(async move {
            for value in &values {
                strings.insert(value).await.unwrap();
            }
        })
    };
    int_task.await.unwrap();
    string_task.await.unwrap();

    let int_consumer = harness.demux.get_stream::<i64>(INT_STREAM).unwrap();
    let string_consumer = harness.demux.get_stream::<String>(STRING_STREAM).unwrap();

    let int_entries = collect_n(&int_consumer, LogIndex::new(1), PER_STREAM).await;
    let string_entries = collect_n(&string_consumer, LogIndex::new(1), PER_STREAM).await;

    // Each stream's values appear exactly in its producer's insertion
    // order, regardless of how the two producers interleaved in the log.
    validators::assert_strictly_increasing(&int_entries);
    validators::assert_strictly_increasing(&string_entries);
    validators::assert_values_in_order(&int_entries, &int_values);
    validators::assert_values_in_order(&string_entries, &string_values);

    // Indexes are disjoint across streams and together cover the whole
    // log exactly once.
    validators::assert_disjoint_full_cover(
        &[
            int_entries.iter().map(|(i, _)| *i).collect(),
            string_entries.iter().map(|(i, _)| *i).collect(),
        ],
        (2 * PER_STREAM) as u64,
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_wait_liveness_across_idle_periods() {
    init_tracing();
    let harness = Harness::new();
    let consumer = harness.demux.get_stream::<i64>(INT_STREAM).unwrap();
    let producer = harness.mux.get_stream::<i64>(INT_STREAM).unwrap();

    let wait = tokio::spawn(async move { consumer.wait_for_iterator(LogIndex::new(1)).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    producer.insert(&7).await.unwrap();

    let iter = tokio::time::timeout(WAIT, wait).await.unwrap().unwrap().unwrap();
    assert_eq!(iter.collect::<Vec<_>>(), vec![(LogIndex::new(1), 7)]);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_cancels_all_pending_waits() {
    init_tracing();
    let harness = Harness::new();
    let int_consumer = harness.demux.get_stream::<i64>(INT_STREAM).unwrap();
    let string_consumer = harness.demux.get_stream::<String>(STRING_STREAM).unwrap();

    let int_wait =
        tokio::spawn(async move { int_consumer.wait_for_iterator(LogIndex::new(1)).await });
    let string_wait =
        tokio::spawn(async move { string_consumer.wait_for_iterator(LogIndex::new(1)).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    harness.shutdown().await;

    assert_eq!(int_wait.await.unwrap().unwrap_err(), StreamError::Cancelled);
    assert_eq!(string_wait.await.unwrap().unwrap_err(), StreamError::Cancelled);

    // Waits issued after shutdown fail immediately as well.
    let late = harness.demux.get_stream::<i64>(INT_STREAM).unwrap();
    assert_eq!(
        late.wait_for_iterator(LogIndex::new(1)).await.unwrap_err(),
        StreamError::Cancelled
    );
}

#[tokio::test]
async fn test_replay_reconstructs_identical_sequences() {
    init_tracing();
    let harness = Harness::new();
    let ints = harness.mux.get_stream::<i64>(INT_STREAM).unwrap();
    let strings = harness.mux.get_stream::<String>(STRING_STREAM).unwrap();

    for round in 0..10 {
        ints.insert(&round).await.unwrap();
        strings.insert(&format!("r{round}")).await.unwrap();
    }

    let first = harness.demux.get_stream::<i64>(INT_STREAM).unwrap();
    let first_entries = collect_n(&first, LogIndex::new(1), 10).await;

    // A second consumer replaying the same log from the start observes
    // the exact same per-stream sequence; decoding is a pure function of
    // the entries and the shared specification.
    let replayed = harness.attach_consumer();
    let second = replayed.get_stream::<i64>(INT_STREAM).unwrap();
    let second_entries = collect_n(&second, LogIndex::new(1), 10).await;
    assert_eq!(first_entries, second_entries);

    replayed.shutdown().await;
    harness.shutdown().await;
}

#[tokio::test]
async fn test_unknown_stream_entry_stops_consumer() {
    init_tracing();
    let harness = Harness::with_spec(fixtures::int_only_spec());
    let producer = harness.mux.get_stream::<i64>(INT_STREAM).unwrap();
    producer.insert(&1).await.unwrap();

    // A writer operating under a wider specification than this reader.
    let rogue = LogRecord::new(StreamId::new(42), StreamTag::new(1), bytes::Bytes::from_static(b"x"));
    harness.log.append_raw(rogue.encode_frame().unwrap()).unwrap();

    let consumer = harness.demux.get_stream::<i64>(INT_STREAM).unwrap();
    let mut cursor = LogIndex::new(1);
    let err = loop {
        match tokio::time::timeout(WAIT, consumer.wait_for_iterator(cursor)).await.unwrap() {
            Ok(iter) => cursor = iter.range().1,
            Err(err) => break err,
        }
    };
    assert_eq!(err, StreamError::UnknownStream { stream_id: StreamId::new(42) });
    assert!(harness.demux.fault().unwrap().is_fatal_decode());
}

#[tokio::test]
async fn test_unknown_tag_entry_stops_consumer() {
    init_tracing();
    let harness = Harness::with_spec(fixtures::int_only_spec());

    let rogue = LogRecord::new(INT_STREAM, StreamTag::new(99), bytes::Bytes::from_static(b"x"));
    harness.log.append_raw(rogue.encode_frame().unwrap()).unwrap();

    let consumer = harness.demux.get_stream::<i64>(INT_STREAM).unwrap();
    let err = tokio::time::timeout(WAIT, consumer.wait_for_iterator(LogIndex::new(1)))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(err, StreamError::UnknownTag { stream_id: INT_STREAM, tag: StreamTag::new(99) });
}

#[tokio::test]
async fn test_entries_decode_by_their_own_embedded_tag() {
    init_tracing();
    let harness = Harness::new();
    let strings = harness.mux.get_stream::<String>(STRING_STREAM).unwrap();
    strings.insert(&"via-bincode".to_string()).await.unwrap();

    // A writer serializing the same stream under its JSON evolution tag;
    // the consumer must pick the codec from the entry, not the write tag.
    let json = LogRecord::new(STRING_STREAM, JSON_TAG, bytes::Bytes::from_static(b"\"via-json\""));
    harness.log.append_raw(json.encode_frame().unwrap()).unwrap();

    let consumer = harness.demux.get_stream::<String>(STRING_STREAM).unwrap();
    let entries = collect_n(&consumer, LogIndex::new(1), 2).await;
    assert_eq!(
        entries,
        vec![
            (LogIndex::new(1), "via-bincode".to_string()),
            (LogIndex::new(2), "via-json".to_string()),
        ]
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_undecodable_payload_stops_consumer() {
    init_tracing();
    let harness = Harness::with_spec(fixtures::int_only_spec());

    // Registered stream and tag, but bytes no i64 encoding produces.
    let garbage = LogRecord::new(INT_STREAM, DEFAULT_TAG, bytes::Bytes::from_static(b"xx"));
    harness.log.append_raw(garbage.encode_frame().unwrap()).unwrap();

    let consumer = harness.demux.get_stream::<i64>(INT_STREAM).unwrap();
    let err = tokio::time::timeout(WAIT, consumer.wait_for_iterator(LogIndex::new(1)))
        .await
        .unwrap()
        .unwrap_err();
    assert!(
        matches!(err, StreamError::Codec { stream_id, tag, .. }
            if stream_id == INT_STREAM && tag == DEFAULT_TAG),
        "expected codec failure, got {err}"
    );
    assert!(harness.demux.fault().unwrap().is_fatal_decode());
}

#[tokio::test]
async fn test_leadership_loss_rejects_inserts_but_not_reads() {
    init_tracing();
    let harness = Harness::new();
    let producer = harness.mux.get_stream::<i64>(INT_STREAM).unwrap();
    producer.insert(&5).await.unwrap();

    harness.log.demote();
    assert_eq!(
        producer.insert(&6).await.unwrap_err(),
        StreamError::Log(LogError::NotLeader)
    );

    // Followers keep consuming what was replicated before the demotion.
    let consumer = harness.demux.get_stream::<i64>(INT_STREAM).unwrap();
    let entries = collect_n(&consumer, LogIndex::new(1), 1).await;
    assert_eq!(entries, vec![(LogIndex::new(1), 5)]);

    harness.log.promote();
    assert_eq!(producer.insert(&6).await.unwrap(), LogIndex::new(2));

    harness.shutdown().await;
}
