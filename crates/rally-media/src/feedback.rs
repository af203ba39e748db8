//! Video-wide feedback deduplication.

use std::collections::HashSet;

use rally_models::FeedbackItem;

/// One ordered, duplicate-free feedback list.
#[derive(Debug, Default, Clone)]
struct FeedbackList {
    items: Vec<FeedbackItem>,
    keys: HashSet<(String, String)>,
}

impl FeedbackList {
    fn push(&mut self, item: FeedbackItem) -> bool {
        let key = (item.title.clone(), item.description.clone());
        if self.keys.insert(key) {
            self.items.push(item);
            true
        } else {
            false
        }
    }
}

/// Accumulates good and bad feedback across a video, keeping the first
/// occurrence of each `(title, description)` in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct FeedbackAggregator {
    good: FeedbackList,
    bad: FeedbackList,
}

impl FeedbackAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one frame's feedback. Returns how many new items were added.
    ///
    /// Items go to the list they arrive in, regardless of their category.
    pub fn merge(
        &mut self,
        new_good: impl IntoIterator<Item = FeedbackItem>,
        new_bad: impl IntoIterator<Item = FeedbackItem>,
    ) -> usize {
        let added_good = new_good.into_iter().filter(|i| self.good.push(i.clone())).count();
        let added_bad = new_bad.into_iter().filter(|i| self.bad.push(i.clone())).count();
        added_good + added_bad
    }

    pub fn good(&self) -> &[FeedbackItem] {
        &self.good.items
    }

    pub fn bad(&self) -> &[FeedbackItem] {
        &self.bad.items
    }

    /// Consume into `(good, bad)`.
    pub fn into_lists(self) -> (Vec<FeedbackItem>, Vec<FeedbackItem>) {
        (self.good.items, self.bad.items)
    }
}

/// Merge new feedback into existing lists without duplicates.
pub fn merge_feedback(
    existing_good: Vec<FeedbackItem>,
    existing_bad: Vec<FeedbackItem>,
    new_good: Vec<FeedbackItem>,
    new_bad: Vec<FeedbackItem>,
) -> (Vec<FeedbackItem>, Vec<FeedbackItem>) {
    let mut agg = FeedbackAggregator::new();
    agg.merge(existing_good, existing_bad);
    agg.merge(new_good, new_bad);
    agg.into_lists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let mut agg = FeedbackAggregator::new();
        agg.merge(
            vec![FeedbackItem::good("A", "1"), FeedbackItem::good("B", "2")],
            vec![],
        );
        let added = agg.merge(
            vec![FeedbackItem::good("B", "2"), FeedbackItem::good("C", "3"), FeedbackItem::good("A", "1")],
            vec![],
        );
        assert_eq!(added, 1);
        let titles: Vec<_> = agg.good().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_same_title_different_description_is_distinct() {
        let mut agg = FeedbackAggregator::new();
        agg.merge(vec![], vec![FeedbackItem::bad("Stance", "Too narrow"), FeedbackItem::bad("Stance", "Too upright")]);
        assert_eq!(agg.bad().len(), 2);
    }

    #[test]
    fn test_lists_are_independent() {
        let mut agg = FeedbackAggregator::new();
        agg.merge(vec![FeedbackItem::good("X", "y")], vec![FeedbackItem::bad("X", "y")]);
        assert_eq!(agg.good().len(), 1);
        assert_eq!(agg.bad().len(), 1);
    }

    #[test]
    fn test_never_duplicates_across_many_merges() {
        let mut agg = FeedbackAggregator::new();
        for round in 0..50 {
            let items: Vec<_> = (0..10)
                .map(|i| FeedbackItem::bad(format!("t{}", (i + round) % 7), "d"))
                .collect();
            agg.merge(vec![], items);
        }
        let mut keys: Vec<_> = agg.bad().iter().map(|i| i.key()).collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(before, keys.len());
        assert_eq!(before, 7);
    }

    #[test]
    fn test_merge_feedback_function() {
        let (good, bad) = merge_feedback(
            vec![FeedbackItem::good("A", "1")],
            vec![],
            vec![FeedbackItem::good("A", "1"), FeedbackItem::good("B", "2")],
            vec![FeedbackItem::bad("C", "3")],
        );
        assert_eq!(good.len(), 2);
        assert_eq!(bad.len(), 1);
    }
}
