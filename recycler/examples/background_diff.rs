// Example: a long sequence is diffed on a worker and delivered from the frame tick.
use std::sync::Arc;
use std::time::Duration;

use recycler::{Adapter, Item, ItemRef, RenderHost, SlotFactory};

#[derive(Debug, PartialEq, Eq, Hash)]
struct Row(u32);

impl Item<String> for Row {
    fn slot_factory(&self) -> SlotFactory<String> {
        Arc::new(String::new)
    }

    fn bind(&self, view: &mut String) {
        *view = format!("row {}", self.0);
    }
}

#[derive(Default)]
struct Counts {
    inserted: usize,
    removed: usize,
    moved: usize,
    changed: usize,
    resets: usize,
}

impl RenderHost<String> for Counts {
    fn notify_inserted(&mut self, _position: usize, count: usize) {
        self.inserted += count;
    }

    fn notify_removed(&mut self, _position: usize, count: usize) {
        self.removed += count;
    }

    fn notify_moved(&mut self, _from: usize, _to: usize) {
        self.moved += 1;
    }

    fn notify_changed(&mut self, _position: usize, payload: &[ItemRef<String>]) {
        self.changed += payload.len();
    }

    fn notify_data_set_changed(&mut self) {
        self.resets += 1;
    }
}

fn rows(values: impl Iterator<Item = u32>) -> Vec<ItemRef<String>> {
    values.map(|n| ItemRef::new(Row(n))).collect()
}

fn main() {
    // Example: short sequences are diffed inline, long ones on the `recycler-diff` thread.
    let mut adapter = Adapter::new();
    let mut host = Counts::default();

    let handle = adapter.replace_items(rows(0..100), &mut host);
    println!(
        "100 rows: pending={} inserted={}",
        handle.is_some(),
        host.inserted
    );

    // Every tenth row dropped, and a new tail.
    let next = rows((0..5_000).filter(|n| n % 10 != 0));
    let handle = adapter.replace_items(next, &mut host);
    println!(
        "5000 rows: pending={} adapter still reports {} rows",
        handle.is_some(),
        adapter.len()
    );

    let mut frames = 0;
    while !adapter.poll_diff(&mut host) {
        frames += 1;
        std::thread::sleep(Duration::from_millis(4));
    }
    println!(
        "delivered after {frames} frames: len={} inserted={} removed={} moved={} changed={} resets={}",
        adapter.len(),
        host.inserted,
        host.removed,
        host.moved,
        host.changed,
        host.resets
    );
}
