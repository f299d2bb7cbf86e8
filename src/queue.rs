//! FIFO buffer of pending leaderboard updates, collapsed by route key.

use std::collections::VecDeque;

use crate::entity::RankedEntity;

/// Pending updates waiting for the pacer. Holds at most one entry per key.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    items: VecDeque<RankedEntity>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `items` into the queue. A key that is already queued has its
    /// value and attributes overwritten where it stands; unseen keys go to
    /// the back.
    pub fn upsert_all<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = RankedEntity>,
    {
        for item in items {
            match self.items.iter_mut().find(|queued| queued.key == item.key) {
                Some(queued) => {
                    queued.value = item.value;
                    queued.attributes = item.attributes;
                }
                None => self.items.push_back(item),
            }
        }
    }

    pub fn pop_front(&mut self) -> Option<RankedEntity> {
        self.items.pop_front()
    }

    pub fn peek_front(&self) -> Option<&RankedEntity> {
        self.items.front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn entity(key: &str, value: f64) -> RankedEntity {
        RankedEntity::new(key, value)
    }

    fn drain(queue: &mut UpdateQueue) -> Vec<(String, f64)> {
        let mut out = Vec::new();
        while let Some(e) = queue.pop_front() {
            out.push((e.key, e.value));
        }
        out
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = UpdateQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.peek_front().is_none());
        assert!(queue.pop_front().is_none());

        queue.upsert_all(Vec::new());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = UpdateQueue::new();
        queue.upsert_all(vec![entity("501", 10.0), entity("504", 12.0)]);
        queue.upsert_all(vec![entity("510", 8.0)]);

        assert_eq!(queue.peek_front().map(|e| e.key.as_str()), Some("501"));
        assert_eq!(
            drain(&mut queue),
            vec![
                ("501".to_string(), 10.0),
                ("504".to_string(), 12.0),
                ("510".to_string(), 8.0),
            ]
        );
    }

    #[test]
    fn test_upsert_keeps_position_and_overwrites() {
        let mut queue = UpdateQueue::new();
        queue.upsert_all(vec![entity("501", 10.0), entity("504", 12.0)]);

        let mut updated = entity("501", 15.5);
        updated.attributes.total_trams = Some(9);
        queue.upsert_all(vec![entity("506", 7.0), updated]);

        assert_eq!(queue.len(), 3);
        let head = queue.pop_front().unwrap();
        assert_eq!(head.key, "501");
        assert_eq!(head.value, 15.5);
        assert_eq!(head.attributes.total_trams, Some(9));
        assert_eq!(
            drain(&mut queue),
            vec![("504".to_string(), 12.0), ("506".to_string(), 7.0)]
        );
    }

    #[test]
    fn test_duplicate_keys_within_one_batch_collapse() {
        let mut queue = UpdateQueue::new();
        queue.upsert_all(vec![
            entity("501", 1.0),
            entity("501", 2.0),
            entity("501", 3.0),
        ]);

        assert_eq!(drain(&mut queue), vec![("501".to_string(), 3.0)]);
    }

    #[test]
    fn test_keys_stay_unique_across_many_upserts() {
        let mut queue = UpdateQueue::new();
        let keys = ["501", "504", "505", "506", "510"];
        for round in 0..20 {
            let batch: Vec<_> = keys
                .iter()
                .enumerate()
                .filter(|(i, _)| (round + i) % 3 != 0)
                .map(|(i, k)| entity(k, (round * 10 + i) as f64))
                .collect();
            queue.upsert_all(batch);

            let unique: HashSet<_> = queue.items.iter().map(|e| e.key.clone()).collect();
            assert_eq!(unique.len(), queue.len());
        }

        // Every key was seen, so each drains exactly once.
        let drained = drain(&mut queue);
        assert_eq!(drained.len(), keys.len());
    }

    #[test]
    fn test_drained_key_requeues_at_back() {
        let mut queue = UpdateQueue::new();
        queue.upsert_all(vec![entity("501", 1.0), entity("504", 2.0)]);
        assert_eq!(queue.pop_front().map(|e| e.key), Some("501".to_string()));

        queue.upsert_all(vec![entity("501", 5.0)]);
        assert_eq!(
            drain(&mut queue),
            vec![("504".to_string(), 2.0), ("501".to_string(), 5.0)]
        );
    }

    #[test]
    fn test_clear() {
        let mut queue = UpdateQueue::new();
        queue.upsert_all(vec![entity("501", 1.0), entity("504", 2.0)]);
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop_front().is_none());
    }
}
