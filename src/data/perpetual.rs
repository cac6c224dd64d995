// ============================================================
// Layer 4 — Perpetual Batches
// ============================================================
// Training is indexed by iteration, not by epoch, so the data
// must never run out. PerpetualBatches wraps a burn DataLoader
// and starts a fresh `loader.iter()` whenever a pass ends:
//
//   loader:  [b0 b1 b2]
//   pulls:    b0 b1 b2 | b0 b1 b2 | b0 ...
//             pass 0     pass 1     pass 2
//
// A loader built with `.shuffle(seed)` reshuffles on every
// `iter()`, so each pass sees a new order.
//
// A DataLoader iterator borrows its loader, so the loader lives
// on a producer thread that walks pass after pass and hands
// batches over a bounded channel:
//
//   producer thread                    trainer thread
//   ───────────────                    ──────────────
//   loop { for b in loader.iter() }  → next_batch()
//          (blocks when PREFETCH full)
//
// The producer stops when PerpetualBatches is dropped. A loader
// without items is rejected at construction time, otherwise the
// cycle would spin without ever yielding.

use anyhow::{bail, ensure, Context, Result};
use burn::{data::dataloader::DataLoader, tensor::backend::Backend};
use std::{
    sync::{
        mpsc::{sync_channel, Receiver, SyncSender},
        Arc,
    },
    thread,
};

/// Batches buffered ahead of the trainer.
const PREFETCH: usize = 2;

/// One batch together with the pass it belongs to.
struct Fetched<T> {
    pass:  u64,
    batch: T,
}

pub struct PerpetualBatches<T> {
    /// Batches in loader order, tagged with their pass
    receiver: Receiver<Fetched<T>>,

    /// Items in one pass of the loader
    num_items: usize,

    /// Pass of the most recent batch
    passes: u64,

    /// Batches handed out in the current pass
    cursor: usize,
}

impl<T: Send + 'static> PerpetualBatches<T> {
    /// Cycle `loader` forever, producing every batch on `device`.
    pub fn new<B: Backend>(loader: Arc<dyn DataLoader<B, T>>, device: &B::Device) -> Result<Self> {
        let num_items = loader.num_items();
        ensure!(num_items > 0, "cannot cycle an empty data loader");

        let loader            = loader.to_device(device);
        let (sender, receiver) = sync_channel(PREFETCH);

        thread::Builder::new()
            .name("perpetual-batches".to_string())
            .spawn(move || produce(loader, sender))
            .context("failed to start the batch producer thread")?;

        Ok(Self { receiver, num_items, passes: 0, cursor: 0 })
    }

    /// Next batch, on the target device. Rewinds at the end of a pass.
    pub fn next_batch(&mut self) -> Result<T> {
        let Ok(fetched) = self.receiver.recv() else {
            bail!("data loader stopped producing batches (pass {})", self.passes);
        };

        if fetched.pass != self.passes {
            self.passes = fetched.pass;
            self.cursor = 0;
            tracing::debug!("Data loader exhausted, starting pass {}", self.passes);
        }
        self.cursor += 1;

        Ok(fetched.batch)
    }

    /// Completed passes over the loader.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Position of the next batch within the current pass.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }
}

/// Walk the loader pass after pass until the receiver goes away.
fn produce<B: Backend, T>(loader: Arc<dyn DataLoader<B, T>>, sender: SyncSender<Fetched<T>>) {
    for pass in 0.. {
        let mut produced = 0usize;
        for batch in loader.iter() {
            if sender.send(Fetched { pass, batch }).is_err() {
                return;
            }
            produced += 1;
        }
        if produced == 0 {
            tracing::warn!("Data loader yielded no batches in pass {pass}; stopping");
            return;
        }
    }
}

/// Never yields `None` while the loader keeps producing.
impl<T: Send + 'static> Iterator for PerpetualBatches<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_batch())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        data::{
            dataloader::{batcher::Batcher, DataLoaderBuilder},
            dataset::InMemDataset,
        },
    };

    type TestBackend = NdArray;

    /// Passes items through untouched so ordering is visible.
    #[derive(Clone)]
    struct Gather;

    impl Batcher<TestBackend, u32, Vec<u32>> for Gather {
        fn batch(&self, items: Vec<u32>, _device: &<TestBackend as Backend>::Device) -> Vec<u32> {
            items
        }
    }

    fn cycle(items: &[u32]) -> PerpetualBatches<Vec<u32>> {
        let loader = DataLoaderBuilder::new(Gather)
            .batch_size(1)
            .build(InMemDataset::new(items.to_vec()));
        PerpetualBatches::new(loader, &Default::default()).unwrap()
    }

    fn pull(batches: &mut PerpetualBatches<Vec<u32>>) -> u32 {
        batches.next_batch().unwrap()[0]
    }

    #[test]
    fn test_wraps_around_in_order() {
        let mut batches = cycle(&[1, 2, 3]);
        let pulled: Vec<u32> = (0..7).map(|_| pull(&mut batches)).collect();
        assert_eq!(pulled, vec![1, 2, 3, 1, 2, 3, 1]);
        assert_eq!(batches.passes(), 2);
        assert_eq!(batches.cursor(), 1);
    }

    #[test]
    fn test_pull_count_exceeds_source_length() {
        let batches = cycle(&[10, 20]);
        // the iterator never ends, take() bounds it
        let pulled: Vec<u32> = batches.take(101).map(|b| b.unwrap()[0]).collect();
        assert_eq!(pulled.len(), 101);
        for (i, v) in pulled.iter().enumerate() {
            assert_eq!(*v, if i % 2 == 0 { 10 } else { 20 });
        }
    }

    #[test]
    fn test_single_item_source() {
        let mut batches = cycle(&[7]);
        for _ in 0..5 {
            assert_eq!(pull(&mut batches), 7);
        }
        assert_eq!(batches.passes(), 4);
    }

    #[test]
    fn test_partial_last_batch_then_rewind() {
        let loader = DataLoaderBuilder::new(Gather)
            .batch_size(2)
            .build(InMemDataset::new(vec![1, 2, 3]));
        let mut batches = PerpetualBatches::new(loader, &Default::default()).unwrap();

        assert_eq!(batches.num_items(), 3);
        assert_eq!(batches.next_batch().unwrap(), vec![1, 2]);
        assert_eq!(batches.next_batch().unwrap(), vec![3]);
        assert_eq!(batches.next_batch().unwrap(), vec![1, 2]);
        assert_eq!(batches.passes(), 1);
    }

    #[test]
    fn test_empty_source_rejected() {
        let loader = DataLoaderBuilder::new(Gather)
            .batch_size(1)
            .build(InMemDataset::new(Vec::new()));
        assert!(PerpetualBatches::new(loader, &Default::default()).is_err());
    }
}
