use sitescan_types::{PageType, Tier, UrlKey};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;
use url::Url;

/// One admissible URL waiting to be crawled.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub key: UrlKey,
    pub url: Url,
    pub tier: Tier,
    pub page_type: PageType,
    pub in_links: u32,
    pub discovery_order: u64,
}

impl FrontierEntry {
    /// Dequeue order: tier rank ascending, then in-link count descending,
    /// then discovery order ascending. The tie-breaks are explicit and
    /// stable so identical discovery outcomes reproduce identical runs.
    fn dequeues_before(&self, other: &Self) -> Ordering {
        self.tier
            .rank()
            .cmp(&other.tier.rank())
            .then(other.in_links.cmp(&self.in_links))
            .then(self.discovery_order.cmp(&other.discovery_order))
    }
}

/// Heap wrapper inverting the comparator: `BinaryHeap` is a max-heap, the
/// frontier wants its "smallest" (highest-priority) entry first.
#[derive(Debug)]
struct HeapSlot(FrontierEntry);

impl PartialEq for HeapSlot {
    fn eq(&self, other: &Self) -> bool {
        self.0.dequeues_before(&other.0) == Ordering::Equal
    }
}
impl Eq for HeapSlot {}
impl PartialOrd for HeapSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.dequeues_before(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UrlState {
    Queued { in_links: u32 },
    Dequeued,
}

/// Deduplicating priority queue over normalized URL keys.
///
/// A key re-encountered while queued is not re-enqueued; its in-link count
/// rises, which improves its position. Stale heap slots left behind by a
/// count bump are dropped lazily at pop time.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<HeapSlot>,
    states: HashMap<UrlKey, UrlState>,
    next_order: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a URL. Returns true when the key is new to the frontier.
    pub fn discover(&mut self, url: Url, tier: Tier, page_type: PageType) -> bool {
        let key = UrlKey::from_url(&url);
        match self.states.get(&key).copied() {
            None => {
                let entry = FrontierEntry {
                    key: key.clone(),
                    url,
                    tier,
                    page_type,
                    in_links: 0,
                    discovery_order: self.next_order,
                };
                self.next_order += 1;
                self.states.insert(key, UrlState::Queued { in_links: 0 });
                self.heap.push(HeapSlot(entry));
                true
            }
            Some(UrlState::Queued { in_links }) => {
                let bumped = in_links + 1;
                self.states
                    .insert(key.clone(), UrlState::Queued { in_links: bumped });
                // Push a refreshed slot; the stale one is skipped at pop.
                let refreshed = self
                    .heap
                    .iter()
                    .find(|slot| slot.0.key == key)
                    .map(|slot| FrontierEntry {
                        in_links: bumped,
                        ..slot.0.clone()
                    });
                if let Some(entry) = refreshed {
                    self.heap.push(HeapSlot(entry));
                }
                debug!(key = %key, in_links = bumped, "Re-encountered queued URL");
                false
            }
            Some(UrlState::Dequeued) => false,
        }
    }

    /// Next URL in dequeue order, or `None` when the frontier is empty.
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        while let Some(HeapSlot(entry)) = self.heap.pop() {
            match self.states.get(&entry.key).copied() {
                Some(UrlState::Queued { in_links }) if in_links == entry.in_links => {
                    self.states.insert(entry.key.clone(), UrlState::Dequeued);
                    return Some(entry);
                }
                // Stale slot from an in-link bump, or already dequeued.
                _ => continue,
            }
        }
        None
    }

    /// Queued (not yet dequeued) URL count.
    pub fn pending(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, UrlState::Queued { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Whether the key was ever admitted (queued or dequeued).
    pub fn contains(&self, key: &UrlKey) -> bool {
        self.states.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid URL")
    }

    #[test]
    fn dequeues_by_tier_first() {
        let mut frontier = Frontier::new();
        frontier.discover(url("https://example.com/blog/a"), Tier::T3, PageType::Blog);
        frontier.discover(url("https://example.com/contact"), Tier::T2, PageType::Contact);
        frontier.discover(url("https://example.com/"), Tier::T1, PageType::Home);

        assert_eq!(frontier.pop().expect("entry").tier, Tier::T1);
        assert_eq!(frontier.pop().expect("entry").tier, Tier::T2);
        assert_eq!(frontier.pop().expect("entry").tier, Tier::T3);
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn in_link_count_breaks_tier_ties() {
        let mut frontier = Frontier::new();
        frontier.discover(url("https://example.com/blog/first"), Tier::T3, PageType::Blog);
        frontier.discover(url("https://example.com/blog/popular"), Tier::T3, PageType::Blog);
        // Three more sightings of /blog/popular.
        for _ in 0..3 {
            assert!(!frontier.discover(
                url("https://example.com/blog/popular"),
                Tier::T3,
                PageType::Blog
            ));
        }

        let first = frontier.pop().expect("entry");
        assert_eq!(first.key, UrlKey::parse("https://example.com/blog/popular").expect("key"));
        assert_eq!(first.in_links, 3);
    }

    #[test]
    fn discovery_order_is_the_final_tie_break() {
        let mut frontier = Frontier::new();
        frontier.discover(url("https://example.com/blog/a"), Tier::T3, PageType::Blog);
        frontier.discover(url("https://example.com/blog/b"), Tier::T3, PageType::Blog);
        assert_eq!(frontier.pop().expect("entry").url.path(), "/blog/a");
        assert_eq!(frontier.pop().expect("entry").url.path(), "/blog/b");
    }

    #[test]
    fn duplicate_keys_are_not_re_enqueued() {
        let mut frontier = Frontier::new();
        assert!(frontier.discover(url("https://example.com/x"), Tier::T3, PageType::Other));
        // Same page under a different surface form.
        assert!(!frontier.discover(url("https://www.example.com/x/"), Tier::T3, PageType::Other));
        assert_eq!(frontier.pending(), 1);

        frontier.pop().expect("entry");
        // Re-sighting after dequeue is ignored entirely.
        assert!(!frontier.discover(url("https://example.com/x"), Tier::T3, PageType::Other));
        assert!(frontier.pop().is_none());
    }
}
