use std::collections::HashMap;

use anyhow::Result;
use kestreldb::common::types::{Lsn, TxnId, NULL_LSN, NULL_TX};
use kestreldb::storage::memory::EngineCall;
use kestreldb::transaction::wal::log_record::{parse_log, LogRecordContent, LogRecordType};
use kestreldb::StorageEngine;

mod common;
use common::{create_test_manager, emitted_records};

#[test]
fn test_emitted_lsns_are_strictly_increasing() -> Result<()> {
    let (mut manager, engine) = create_test_manager();

    manager.write(1, 7, 0, "a1", "z1")?;
    manager.write(2, 8, 0, "b1", "y1")?;
    manager.write(1, 7, 4, "a2", "z2")?;
    manager.commit(1)?;
    manager.checkpoint()?;
    manager.write(2, 9, 0, "b2", "y2")?;
    manager.commit(2)?;

    let records = emitted_records(&manager, &engine);
    assert!(records.len() >= 9);
    for pair in records.windows(2) {
        assert!(
            pair[1].lsn > pair[0].lsn,
            "LSN {} emitted after {}",
            pair[1].lsn,
            pair[0].lsn
        );
    }
    Ok(())
}

#[test]
fn test_prev_lsn_chains_are_intact() -> Result<()> {
    let (mut manager, engine) = create_test_manager();

    manager.write(1, 7, 0, "a1", "z1")?;
    manager.write(2, 8, 0, "b1", "y1")?;
    manager.write(1, 7, 4, "a2", "z2")?;
    manager.write(2, 8, 4, "b2", "y2")?;
    manager.commit(1)?;
    manager.abort(2)?;

    // Replay every emitted record, checking that each one points at the
    // previous record of its transaction.
    let mut last_seen: HashMap<TxnId, Lsn> = HashMap::new();
    for record in emitted_records(&manager, &engine) {
        match record.record_type() {
            LogRecordType::Update | LogRecordType::Compensation | LogRecordType::Abort => {
                let expected = last_seen.get(&record.tx_id).copied().unwrap_or(NULL_LSN);
                assert_eq!(
                    record.prev_lsn, expected,
                    "broken chain at LSN {}",
                    record.lsn
                );
            }
            _ => {}
        }
        if record.tx_id != NULL_TX {
            last_seen.insert(record.tx_id, record.lsn);
        }
    }
    Ok(())
}

#[test]
fn test_page_flush_forces_log_prefix_first() -> Result<()> {
    // With uncommitted updates buffered, pageFlushed must make every
    // record up to the page's LSN durable before it returns.
    let (mut manager, engine) = create_test_manager();

    let lsn1 = manager.write(1, 7, 0, "a1", "z1")?;
    let lsn2 = manager.write(2, 8, 0, "b1", "y1")?;
    let lsn3 = manager.write(1, 7, 4, "a2", "z2")?;
    let lsn4 = manager.write(2, 9, 0, "b2", "y2")?;

    // The engine is about to write page 7, whose header carries lsn3.
    engine.install_page(7, 0, "a1", lsn3);
    manager.page_flushed(7)?;

    let durable: Vec<Lsn> = parse_log(&engine.log_contents())?
        .iter()
        .map(|r| r.lsn)
        .collect();
    assert_eq!(durable, vec![lsn1, lsn2, lsn3]);

    // Records past the page LSN stay buffered.
    let buffered: Vec<Lsn> = manager.log_tail().iter().map(|r| r.lsn).collect();
    assert_eq!(buffered, vec![lsn4]);

    // Page 7 is clean again; other pages are still dirty.
    assert!(!manager.dirty_page_table().contains(7));
    assert!(manager.dirty_page_table().contains(8));
    assert!(manager.dirty_page_table().contains(9));
    Ok(())
}

#[test]
fn test_log_reaches_engine_before_it_flushes_pages() -> Result<()> {
    // Checked against the call journal: the updateLog call carrying a record
    // must precede the disk write of the page stamped with its LSN.
    let (mut manager, engine) = create_test_manager();
    let mut disk = engine.clone();

    let lsn1 = manager.write(1, 7, 0, "new", "old")?;

    // The engine announces the flush, then performs it.
    engine.install_page(7, 0, "new", lsn1);
    manager.page_flushed(7)?;
    disk.page_write(7, 0, "new", lsn1);

    let journal = engine.journal();
    let flush_pos = journal
        .iter()
        .position(|c| matches!(c, EngineCall::UpdateLog { chunk } if chunk.contains(&format!("\"lsn\":{}", lsn1))))
        .expect("no updateLog call carried the update record");
    let write_pos = journal
        .iter()
        .position(|c| matches!(c, EngineCall::PageWrite { lsn, .. } if *lsn == lsn1))
        .expect("no page write recorded");
    assert!(flush_pos < write_pos);
    Ok(())
}

#[test]
fn test_voluntary_abort_emits_compensation_chain() -> Result<()> {
    // Two updates, then abort. The tail gains ABORT, a CLR per
    // update in reverse order, and an END; the pages carry the
    // before-images again.
    let (mut manager, engine) = create_test_manager();

    let lsn1 = manager.write(2, 9, 4, "B", "A")?;
    manager.write(2, 9, 5, "D", "C")?;
    manager.abort(2)?;

    let tail: Vec<_> = manager.log_tail().iter().cloned().collect();
    let kinds: Vec<_> = tail.iter().map(|r| r.record_type()).collect();
    assert_eq!(
        kinds,
        vec![
            LogRecordType::Update,
            LogRecordType::Update,
            LogRecordType::Abort,
            LogRecordType::Compensation,
            LogRecordType::Compensation,
            LogRecordType::End,
        ]
    );

    if let LogRecordContent::Compensation(clr) = &tail[3].content {
        assert_eq!(clr.offset, 5);
        assert_eq!(clr.after_image, "C");
        assert_eq!(clr.undo_next_lsn, lsn1);
    } else {
        panic!("expected a compensation record");
    }
    if let LogRecordContent::Compensation(clr) = &tail[4].content {
        assert_eq!(clr.offset, 4);
        assert_eq!(clr.after_image, "A");
        assert_eq!(clr.undo_next_lsn, NULL_LSN); // first update: chain exhausted
    } else {
        panic!("expected a compensation record");
    }

    assert_eq!(engine.page_text(9, 4, 1), "A");
    assert_eq!(engine.page_text(9, 5, 1), "C");
    assert!(!manager.tx_table().contains(2));
    Ok(())
}

#[test]
fn test_commit_is_durable_end_may_linger() -> Result<()> {
    let (mut manager, engine) = create_test_manager();

    manager.write(1, 7, 0, "new", "old")?;
    manager.commit(1)?;

    let durable = parse_log(&engine.log_contents())?;
    let kinds: Vec<_> = durable.iter().map(|r| r.record_type()).collect();
    assert_eq!(kinds, vec![LogRecordType::Update, LogRecordType::Commit]);

    let tail_kinds: Vec<_> = manager.log_tail().iter().map(|r| r.record_type()).collect();
    assert_eq!(tail_kinds, vec![LogRecordType::End]);
    Ok(())
}
