//! Side-aware binary heap with price-time priority.
//!
//! Each side of the book keeps its resting orders in one of these heaps.
//! The root is the order that matches first:
//!
//! - bids: highest limit price first; asks: lowest limit price first
//! - a market order (no price) outranks every limit order on its side
//! - equal keys fall back to arrival order (earliest sequence number first)
//!
//! Arbitrary removal is linear: the cancel path swaps the hit with the last
//! element and re-sifts. That is acceptable because active depth is bounded
//! and cancels are rare relative to matches.

use std::cmp::Ordering;

use types::{Order, OrderSide};

/// Binary heap of resting orders for one side of the book.
#[derive(Debug, Clone)]
pub struct OrderHeap {
    side: OrderSide,
    items: Vec<Order>,
}

impl OrderHeap {
    /// Create an empty heap for the given side.
    pub fn new(side: OrderSide) -> Self {
        Self {
            side,
            items: Vec::new(),
        }
    }

    /// The side this heap holds.
    pub fn side(&self) -> OrderSide {
        self.side
    }

    /// Number of resting orders.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the heap is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Compare two orders for priority on this side.
    ///
    /// `Ordering::Less` means `a` sits closer to the root than `b`.
    fn cmp_priority(&self, a: &Order, b: &Order) -> Ordering {
        let by_price = match (a.limit_price(), b.limit_price()) {
            (None, None) => Ordering::Equal,
            // Market orders outrank every limit on their side.
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(pa), Some(pb)) => match self.side {
                OrderSide::Buy => pb.cmp(&pa),
                OrderSide::Sell => pa.cmp(&pb),
            },
        };
        by_price.then_with(|| a.seq.cmp(&b.seq))
    }

    fn outranks(&self, a: &Order, b: &Order) -> bool {
        self.cmp_priority(a, b) == Ordering::Less
    }

    /// Add an order to the heap.
    pub fn push(&mut self, order: Order) {
        self.items.push(order);
        self.sift_up(self.items.len() - 1);
    }

    /// Highest-priority order, if any.
    pub fn peek(&self) -> Option<&Order> {
        self.items.first()
    }

    /// Mutable access to the highest-priority order.
    ///
    /// Callers may only change fill-tracking fields (`remaining_quantity`,
    /// `status`); changing price or sequence would corrupt the heap order.
    pub fn peek_mut(&mut self) -> Option<&mut Order> {
        self.items.first_mut()
    }

    /// Remove and return the highest-priority order, if any.
    pub fn pop(&mut self) -> Option<Order> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let order = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        order
    }

    /// Remove the first order matching the predicate.
    ///
    /// Linear scan; swaps the hit with the last element and re-sifts.
    /// Returns `None` if nothing matched.
    pub fn remove_first<P>(&mut self, predicate: P) -> Option<Order>
    where
        P: Fn(&Order) -> bool,
    {
        let pos = self.items.iter().position(|o| predicate(o))?;
        let last = self.items.len() - 1;
        self.items.swap(pos, last);
        let order = self.items.pop();
        if pos < self.items.len() {
            // The element moved into `pos` may need to travel either way.
            self.sift_down(pos);
            self.sift_up(pos);
        }
        order
    }

    /// All resting orders in priority order (for inspection).
    pub fn snapshot(&self) -> Vec<Order> {
        let mut sorted = self.items.clone();
        sorted.sort_by(|a, b| self.cmp_priority(a, b));
        sorted
    }

    /// Iterate over resting orders in arbitrary (heap) order.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.items.iter()
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.outranks(&self.items[idx], &self.items[parent]) {
                self.items.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut best = idx;

            if left < len && self.outranks(&self.items[left], &self.items[best]) {
                best = left;
            }
            if right < len && self.outranks(&self.items[right], &self.items[best]) {
                best = right;
            }
            if best == idx {
                break;
            }
            self.items.swap(idx, best);
            idx = best;
        }
    }
}
