// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scheduling policy for queued background work.
//!
//! Work items are grouped into buckets by priority. The highest bucket is
//! served first and, inside a bucket, the most recently queued item wins: the
//! newest request is usually the one the user is looking at. Items that were
//! cancelled while queued are swept out lazily, whenever the limiter asks
//! whether there is anything left to run.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A queued unit of background work with a mutable priority.
pub trait PriorityCancelable: Send + Sync {
    /// Current priority; larger runs first.
    ///
    /// The value is stable until [`update_priority`](Self::update_priority) is
    /// called again, so a scheduler can read the old value, update, and read
    /// the new one to find out where the item used to be queued.
    fn priority(&self) -> i32;

    /// Publishes any priority change requested since the last update.
    fn update_priority(&self);

    /// Returns `false` if nobody wants the result any more. May have side
    /// effects: an item that answers `false` retires itself.
    fn still_wanted(&self) -> bool;

    /// Runs the work on the calling thread.
    fn run(self: Arc<Self>);
}

/// Decides which queued item runs next.
///
/// All methods are called under the limiter's lock.
pub trait ThreadPolicyProvider: Send {
    /// Queues an item at its current priority.
    fn put(&mut self, item: Arc<dyn PriorityCancelable>);

    /// Sweeps out unwanted items at the head of the queue and reports whether
    /// anything runnable is left.
    fn is_empty(&mut self) -> bool;

    /// Removes and returns the next item to run.
    fn get(&mut self) -> Option<Arc<dyn PriorityCancelable>>;

    /// Moves a queued item after a priority change. Returns `false`, without
    /// moving anything, when the item is not queued because it is running or
    /// has already run.
    fn reschedule(&mut self, item: &Arc<dyn PriorityCancelable>) -> bool;

    /// Number of queued items, wanted or not.
    fn len(&self) -> usize;
}

pub(crate) fn same_item(a: &Arc<dyn PriorityCancelable>, b: &Arc<dyn PriorityCancelable>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[derive(Default)]
struct PriorityGroup {
    content: Vec<Arc<dyn PriorityCancelable>>,
}

impl PriorityGroup {
    fn position(&self, item: &Arc<dyn PriorityCancelable>) -> Option<usize> {
        self.content.iter().position(|queued| same_item(queued, item))
    }
}

/// Highest priority first, last in first out within a priority, with lazy
/// removal of cancelled items.
#[derive(Default)]
pub struct PriorityCancelingLifoPolicy {
    groups: BTreeMap<Reverse<i32>, PriorityGroup>,
    len: usize,
}

impl PriorityCancelingLifoPolicy {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Priorities that currently have a bucket, highest first.
    pub fn priorities(&self) -> Vec<i32> {
        self.groups.keys().map(|Reverse(priority)| *priority).collect()
    }
}

impl ThreadPolicyProvider for PriorityCancelingLifoPolicy {
    fn put(&mut self, item: Arc<dyn PriorityCancelable>) {
        let priority = item.priority();
        self.groups
            .entry(Reverse(priority))
            .or_default()
            .content
            .push(item);
        self.len += 1;
    }

    fn is_empty(&mut self) -> bool {
        while let Some(mut first) = self.groups.first_entry() {
            let group = first.get_mut();
            let before = group.content.len();
            group.content.retain(|item| item.still_wanted());
            let swept = before - group.content.len();
            if swept > 0 {
                log::debug!("Swept {swept} unwanted item(s) at priority {}", first.key().0);
            }
            self.len -= swept;

            if !first.get().content.is_empty() {
                return false;
            }
            first.remove();
        }
        true
    }

    fn get(&mut self) -> Option<Arc<dyn PriorityCancelable>> {
        let mut first = self.groups.first_entry()?;
        let item = first.get_mut().content.pop();
        if first.get().content.is_empty() {
            first.remove();
        }
        if item.is_some() {
            self.len -= 1;
        }
        item
    }

    fn reschedule(&mut self, item: &Arc<dyn PriorityCancelable>) -> bool {
        let old = item.priority();
        item.update_priority();
        let new = item.priority();

        let Some(group) = self.groups.get_mut(&Reverse(old)) else {
            log::debug!("reschedule() found no bucket at {old}; the item is running or done");
            return false;
        };
        let Some(index) = group.position(item) else {
            log::debug!("reschedule() found no queued item at {old}; it is running or done");
            return false;
        };

        let queued = group.content.remove(index);
        if old == new {
            group.content.push(queued);
            return true;
        }
        if group.content.is_empty() {
            self.groups.remove(&Reverse(old));
        }
        self.len -= 1;
        self.put(queued);
        true
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    struct Item {
        name: &'static str,
        priority: AtomicI32,
        requested: AtomicI32,
        wanted: AtomicBool,
    }

    impl Item {
        fn new(name: &'static str, priority: i32) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority: AtomicI32::new(priority),
                requested: AtomicI32::new(priority),
                wanted: AtomicBool::new(true),
            })
        }

        fn request(&self, priority: i32) {
            self.requested.fetch_max(priority, Ordering::SeqCst);
        }
    }

    impl PriorityCancelable for Item {
        fn priority(&self) -> i32 {
            self.priority.load(Ordering::SeqCst)
        }

        fn update_priority(&self) {
            self.priority
                .store(self.requested.load(Ordering::SeqCst), Ordering::SeqCst);
        }

        fn still_wanted(&self) -> bool {
            self.wanted.load(Ordering::SeqCst)
        }

        fn run(self: Arc<Self>) {}
    }

    fn name_of(
        policy: &mut PriorityCancelingLifoPolicy,
        items: &[Arc<Item>],
    ) -> Option<&'static str> {
        let next = policy.get()?;
        items
            .iter()
            .find(|item| {
                let item: Arc<dyn PriorityCancelable> = (*item).clone();
                same_item(&item, &next)
            })
            .map(|item| item.name)
    }

    fn drain(policy: &mut PriorityCancelingLifoPolicy, items: &[Arc<Item>]) -> Vec<&'static str> {
        let mut order = Vec::new();
        while !policy.is_empty() {
            order.extend(name_of(policy, items));
        }
        order
    }

    #[test]
    fn higher_priority_runs_first_and_ties_are_lifo() {
        let items = vec![
            Item::new("a", 0),
            Item::new("b", 5),
            Item::new("c", 0),
            Item::new("d", 5),
        ];
        let mut policy = PriorityCancelingLifoPolicy::new();
        for item in &items {
            policy.put(item.clone());
        }
        assert_eq!(policy.len(), 4);
        assert_eq!(policy.priorities(), vec![5, 0]);

        assert_eq!(drain(&mut policy, &items), vec!["d", "b", "c", "a"]);
        assert_eq!(policy.len(), 0);
        assert!(policy.priorities().is_empty());
    }

    #[test]
    fn unwanted_items_are_swept_before_get() {
        let items = vec![Item::new("a", 1), Item::new("b", 1), Item::new("c", 0)];
        let mut policy = PriorityCancelingLifoPolicy::new();
        for item in &items {
            policy.put(item.clone());
        }

        items[0].wanted.store(false, Ordering::SeqCst);
        items[1].wanted.store(false, Ordering::SeqCst);

        assert!(!policy.is_empty());
        assert_eq!(policy.len(), 1);
        assert_eq!(policy.priorities(), vec![0]);
        assert_eq!(drain(&mut policy, &items), vec!["c"]);
    }

    #[test]
    fn sweeping_everything_leaves_an_empty_queue() {
        let items = vec![Item::new("a", 3), Item::new("b", -3)];
        let mut policy = PriorityCancelingLifoPolicy::new();
        for item in &items {
            item.wanted.store(false, Ordering::SeqCst);
            policy.put(item.clone());
        }

        assert!(policy.is_empty());
        assert_eq!(policy.len(), 0);
        assert!(policy.get().is_none());
    }

    #[test]
    fn reschedule_moves_a_raised_item_to_its_new_bucket() {
        let items = vec![Item::new("tex", 5), Item::new("other", 7)];
        let mut policy = PriorityCancelingLifoPolicy::new();
        for item in &items {
            policy.put(item.clone());
        }

        items[0].request(9);
        let tex: Arc<dyn PriorityCancelable> = items[0].clone();
        assert!(policy.reschedule(&tex));

        assert_eq!(tex.priority(), 9);
        assert_eq!(policy.priorities(), vec![9, 7]);
        assert_eq!(drain(&mut policy, &items), vec!["tex", "other"]);
    }

    #[test]
    fn reschedule_never_lowers_priority() {
        let items = vec![Item::new("tex", 5)];
        let mut policy = PriorityCancelingLifoPolicy::new();
        policy.put(items[0].clone());

        items[0].request(1);
        let tex: Arc<dyn PriorityCancelable> = items[0].clone();
        assert!(policy.reschedule(&tex));
        assert_eq!(tex.priority(), 5);
        assert_eq!(policy.priorities(), vec![5]);
    }

    #[test]
    fn reschedule_at_the_same_priority_moves_the_item_to_the_top() {
        let items = vec![Item::new("a", 0), Item::new("b", 0)];
        let mut policy = PriorityCancelingLifoPolicy::new();
        for item in &items {
            policy.put(item.clone());
        }

        let a: Arc<dyn PriorityCancelable> = items[0].clone();
        assert!(policy.reschedule(&a));
        assert_eq!(policy.len(), 2);
        assert_eq!(drain(&mut policy, &items), vec!["a", "b"]);
    }

    #[test]
    fn reschedule_of_a_running_item_is_a_no_op() {
        let items = vec![Item::new("a", 0)];
        let mut policy = PriorityCancelingLifoPolicy::new();
        policy.put(items[0].clone());
        let running = policy.get().unwrap();

        items[0].request(4);
        assert!(!policy.reschedule(&running));
        assert_eq!(running.priority(), 4);
        assert!(policy.is_empty());
    }
}
