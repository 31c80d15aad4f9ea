//! Model-based randomized pool test.
//!
//! Runs random create/write/read sequences against a two-frame pool (so
//! almost every operation evicts) and checks observed page contents
//! against an in-memory model.

use std::collections::HashMap;

use proptest::prelude::*;
use tempfile::tempdir;
use walpool::{
    BufferPool, Disposition, Error, FileId, PageId, PinMode, PoolOptions, RecoveryMode,
};

const PAGE_SIZE: usize = 512;
const PAGES: u32 = 6;

#[derive(Debug, Clone)]
enum Op {
    Create(u32, u8),
    Write(u32, u8),
    Read(u32),
    Flush(u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PAGES, any::<u8>()).prop_map(|(p, b)| Op::Create(p, b)),
        (0..PAGES, any::<u8>()).prop_map(|(p, b)| Op::Write(p, b)),
        (0..PAGES).prop_map(Op::Read),
        (0..PAGES).prop_map(Op::Flush),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn pool_contents_match_model(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let dir = tempdir().unwrap();
        let pool = BufferPool::open(
            dir.path(),
            PoolOptions {
                page_size: PAGE_SIZE,
                frames: 2,
                recovery_mode: RecoveryMode::Format,
                ..Default::default()
            },
        )
        .unwrap();

        // page number -> fill byte of the whole page
        let mut model: HashMap<u32, u8> = HashMap::new();

        for op in ops {
            match op {
                Op::Create(p, b) => {
                    let mut page = pool.pin(PageId::new(FileId(1), p), PinMode::Create).unwrap();
                    page.with_data_mut(|d| d.fill(b)).unwrap();
                    page.unpin(Disposition::Dirty).unwrap();
                    model.insert(p, b);
                }
                Op::Write(p, b) => {
                    match pool.pin(PageId::new(FileId(1), p), PinMode::Write) {
                        Ok(mut page) => {
                            prop_assert!(model.contains_key(&p), "write pinned an unknown page");
                            page.with_data_mut(|d| d.fill(b)).unwrap();
                            page.unpin(Disposition::Dirty).unwrap();
                            model.insert(p, b);
                        }
                        Err(Error::PageNotFound(_)) => {
                            prop_assert!(!model.contains_key(&p), "known page reported missing");
                        }
                        Err(e) => return Err(TestCaseError::fail(format!("write pin: {e}"))),
                    }
                }
                Op::Read(p) => {
                    match pool.pin(PageId::new(FileId(1), p), PinMode::Read) {
                        Ok(page) => {
                            let expected = match model.get(&p) {
                                Some(&b) => b,
                                None => {
                                    return Err(TestCaseError::fail(
                                        "read pinned an unknown page",
                                    ))
                                }
                            };
                            page.with_data(|d| {
                                assert!(
                                    d.iter().all(|&x| x == expected),
                                    "page {p} diverged from model"
                                )
                            });
                            page.unpin(Disposition::Clean).unwrap();
                        }
                        Err(Error::PageNotFound(_)) => {
                            prop_assert!(!model.contains_key(&p), "known page reported missing");
                        }
                        Err(e) => return Err(TestCaseError::fail(format!("read pin: {e}"))),
                    }
                }
                Op::Flush(p) => {
                    pool.flush_page(PageId::new(FileId(1), p)).unwrap();
                }
            }

            // Residency invariant: never more resident pages than frames,
            // and the free list accounts for the rest.
            let stats = pool.stats();
            prop_assert!(stats.resident <= 2);
            prop_assert_eq!(stats.resident + stats.free, 2);
        }

        // Everything the model knows survives a full flush and re-read.
        pool.force_flush_all().unwrap();
        for (&p, &b) in &model {
            let page = pool.pin(PageId::new(FileId(1), p), PinMode::Read).unwrap();
            page.with_data(|d| assert!(d.iter().all(|&x| x == b), "page {p} after flush"));
            page.unpin(Disposition::Clean).unwrap();
        }
    }
}
