//! Fixed-capacity order book (spec §4.15). Two huge-page backed arrays of
//! order handles, one per side, each an explicit array-plus-sift binary
//! heap (per the design notes: "use an explicit array + sift operations
//! rather than a generic priority queue") over order records stored in a
//! separate huge-page array indexed by a stable book-order-id handle, so a
//! handle survives the heap reshuffling that sifting does to its slot in
//! the heap array.

use crate::alloc::{AllocFlags, HugePageArray};
use crate::ids::{BookOrderId, SlotIdPool, SystemOrderId};
use crate::wire::messages::{InternalOrderEvent, InternalOrderStatus, OrderAction, OrderState};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct InternalOrder {
    system_id: SystemOrderId,
    price: u32,
    quantity: u32,
}

/// One side's heap: an array of handles into `orders`, ordered by
/// `better` over their prices, plus a logical size.
struct SideHeap {
    handles: HugePageArray<BookOrderId>,
    count: usize,
}

impl SideHeap {
    fn new(flags: AllocFlags) -> crate::error::CoreResult<Self> {
        Ok(SideHeap {
            handles: HugePageArray::new(BookOrderId::CAPACITY, flags)?,
            count: 0,
        })
    }

    fn is_full(&self) -> bool {
        self.count >= self.handles.len()
    }

    fn top(&self) -> Option<BookOrderId> {
        if self.count == 0 {
            None
        } else {
            self.handles.get(0).copied()
        }
    }

    /// `better(a, b)` is true when `a` should sit above `b` in the heap
    /// (max-heap by price for bids, min-heap by price for asks).
    fn push(&mut self, handle: BookOrderId, better: impl Fn(BookOrderId, BookOrderId) -> bool) {
        let mut i = self.count;
        *self.handles.get_mut(i).expect("side heap capacity exceeded") = handle;
        self.count += 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            let parent_handle = *self.handles.get(parent).unwrap();
            if better(*self.handles.get(i).unwrap(), parent_handle) {
                self.handles.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn pop(&mut self, better: impl Fn(BookOrderId, BookOrderId) -> bool) {
        if self.count == 0 {
            return;
        }
        self.count -= 1;
        if self.count == 0 {
            return;
        }
        *self.handles.get_mut(0).unwrap() = *self.handles.get(self.count).unwrap();
        let mut i = 0;
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut best = i;
            if left < self.count
                && better(*self.handles.get(left).unwrap(), *self.handles.get(best).unwrap())
            {
                best = left;
            }
            if right < self.count
                && better(*self.handles.get(right).unwrap(), *self.handles.get(best).unwrap())
            {
                best = right;
            }
            if best == i {
                break;
            }
            self.handles.swap(i, best);
            i = best;
        }
    }
}

// `HugePageArray` has no `swap`; add it here rather than on the shared
// type, since only heap maintenance needs it.
trait SwapExt<T> {
    fn swap(&mut self, a: usize, b: usize);
}

impl<T: Copy + Default> SwapExt<T> for HugePageArray<T> {
    fn swap(&mut self, a: usize, b: usize) {
        let tmp = *self.get(a).unwrap();
        *self.get_mut(a).unwrap() = *self.get(b).unwrap();
        *self.get_mut(b).unwrap() = tmp;
    }
}

fn bid_better(orders: &HugePageArray<InternalOrder>) -> impl Fn(BookOrderId, BookOrderId) -> bool + '_ {
    move |a, b| orders.get(a.index() as usize).unwrap().price > orders.get(b.index() as usize).unwrap().price
}

fn ask_better(orders: &HugePageArray<InternalOrder>) -> impl Fn(BookOrderId, BookOrderId) -> bool + '_ {
    move |a, b| orders.get(a.index() as usize).unwrap().price < orders.get(b.index() as usize).unwrap().price
}

pub struct OrderBook {
    book_ids: SlotIdPool<17>,
    orders: HugePageArray<InternalOrder>,
    bids: SideHeap,
    asks: SideHeap,
}

impl OrderBook {
    pub fn new(flags: AllocFlags) -> crate::error::CoreResult<Self> {
        Ok(OrderBook {
            book_ids: SlotIdPool::new(),
            orders: HugePageArray::new(BookOrderId::CAPACITY, flags)?,
            bids: SideHeap::new(flags)?,
            asks: SideHeap::new(flags)?,
        })
    }

    pub fn bid_count(&self) -> usize {
        self.bids.count
    }

    pub fn ask_count(&self) -> usize {
        self.asks.count
    }

    /// spec §4.15 `add`. Only `Buy`/`Sell` reach here; the coordinator
    /// stubs `Cancel`/`Modify` before calling this.
    pub fn add(&mut self, event: &InternalOrderEvent, sink: &mut dyn FnMut(InternalOrderStatus)) -> bool {
        let is_bid = matches!(event.action, OrderAction::Buy);
        let side_full = if is_bid { self.bids.is_full() } else { self.asks.is_full() };
        if side_full {
            sink(InternalOrderStatus {
                system_id: event.system_id,
                book_id: BookOrderId::INVALID,
                fill_qty: 0,
                fill_price: 0,
                state: OrderState::Rejected,
            });
            return false;
        }

        let Some(book_id) = self.book_ids.acquire() else {
            sink(InternalOrderStatus {
                system_id: event.system_id,
                book_id: BookOrderId::INVALID,
                fill_qty: 0,
                fill_price: 0,
                state: OrderState::Rejected,
            });
            return false;
        };

        *self.orders.get_mut(book_id.index() as usize).unwrap() = InternalOrder {
            system_id: event.system_id,
            price: event.price,
            quantity: event.quantity,
        };

        if is_bid {
            self.bids.push(book_id, bid_better(&self.orders));
        } else {
            self.asks.push(book_id, ask_better(&self.orders));
        }

        sink(InternalOrderStatus {
            system_id: event.system_id,
            book_id,
            fill_qty: 0,
            fill_price: 0,
            state: OrderState::Accepted,
        });

        self.run_match(event, sink);
        true
    }

    /// spec §4.15 `match`.
    fn run_match(&mut self, event: &InternalOrderEvent, sink: &mut dyn FnMut(InternalOrderStatus)) {
        loop {
            let (Some(bid_handle), Some(ask_handle)) = (self.bids.top(), self.asks.top()) else {
                break;
            };
            let bid_price = self.orders.get(bid_handle.index() as usize).unwrap().price;
            let ask_price = self.orders.get(ask_handle.index() as usize).unwrap().price;
            if bid_price < ask_price {
                break;
            }

            let bid = *self.orders.get(bid_handle.index() as usize).unwrap();
            let ask = *self.orders.get(ask_handle.index() as usize).unwrap();
            let qty = bid.quantity.min(ask.quantity);
            let price = ask.price;

            let bid_remaining = bid.quantity.saturating_sub(qty);
            let ask_remaining = ask.quantity.saturating_sub(qty);
            self.orders.get_mut(bid_handle.index() as usize).unwrap().quantity = bid_remaining;
            self.orders.get_mut(ask_handle.index() as usize).unwrap().quantity = ask_remaining;

            if bid.system_id == event.system_id {
                sink(InternalOrderStatus {
                    system_id: bid.system_id,
                    book_id: bid_handle,
                    fill_qty: qty,
                    fill_price: price,
                    state: if bid_remaining == 0 { OrderState::Full } else { OrderState::Partial },
                });
            }
            if ask.system_id == event.system_id {
                sink(InternalOrderStatus {
                    system_id: ask.system_id,
                    book_id: ask_handle,
                    fill_qty: qty,
                    fill_price: price,
                    state: if ask_remaining == 0 { OrderState::Full } else { OrderState::Partial },
                });
            }

            if bid_remaining == 0 {
                self.bids.pop(bid_better(&self.orders));
                self.book_ids.release(bid_handle);
            }
            if ask_remaining == 0 {
                self.asks.pop(ask_better(&self.orders));
                self.book_ids.release(ask_handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(system_id: SystemOrderId, price: u32, quantity: u32, action: OrderAction) -> InternalOrderEvent {
        InternalOrderEvent {
            system_id,
            ticker: *b"GOOG",
            quantity,
            price,
            action,
        }
    }

    #[test]
    fn six_non_crossing_orders_all_accept_with_no_match() {
        let mut book = OrderBook::new(AllocFlags::default()).unwrap();
        let mut statuses = Vec::new();
        let sells = [(1u32, 40u32), (2, 50), (3, 60)];
        let buys = [(4u32, 30u32), (5, 20), (6, 10)];
        for (id, price) in sells {
            book.add(
                &event(SystemOrderId::new(id, 1), price, 1, OrderAction::Sell),
                &mut |s| statuses.push(s),
            );
        }
        for (id, price) in buys {
            book.add(
                &event(SystemOrderId::new(id, 1), price, 1, OrderAction::Buy),
                &mut |s| statuses.push(s),
            );
        }
        assert_eq!(statuses.len(), 6);
        assert!(statuses.iter().all(|s| s.state == OrderState::Accepted));
        assert_eq!(book.bid_count(), 3);
        assert_eq!(book.ask_count(), 3);
    }

    #[test]
    fn three_crossing_pairs_yield_nine_emissions() {
        let mut book = OrderBook::new(AllocFlags::default()).unwrap();
        let mut statuses = Vec::new();
        let buys = [(1u32, 40u32), (2, 50), (3, 60)];
        let sells = [(4u32, 30u32), (5, 20), (6, 10)];
        for (id, price) in buys {
            book.add(
                &event(SystemOrderId::new(id, 1), price, 1, OrderAction::Buy),
                &mut |s| statuses.push(s),
            );
        }
        for (id, price) in sells {
            book.add(
                &event(SystemOrderId::new(id, 1), price, 1, OrderAction::Sell),
                &mut |s| statuses.push(s),
            );
        }
        assert_eq!(statuses.len(), 9);
        let fulls = statuses.iter().filter(|s| s.state == OrderState::Full).count();
        assert_eq!(fulls, 3);
    }

    #[test]
    fn one_sell_sweeps_ten_bids() {
        let mut book = OrderBook::new(AllocFlags::default()).unwrap();
        let mut statuses = Vec::new();
        let mut total_qty = 0u32;
        for i in 0..10u32 {
            let qty = i + 1;
            total_qty += qty;
            book.add(
                &event(SystemOrderId::new(i, 1), 10, qty, OrderAction::Buy),
                &mut |s| statuses.push(s),
            );
        }
        assert_eq!(statuses.len(), 10);
        statuses.clear();

        book.add(
            &event(SystemOrderId::new(10, 1), 10, total_qty, OrderAction::Sell),
            &mut |s| statuses.push(s),
        );
        assert_eq!(statuses.len(), 11);
        let fulls = statuses.iter().filter(|s| s.state == OrderState::Full).count();
        let partials = statuses.iter().filter(|s| s.state == OrderState::Partial).count();
        assert_eq!(fulls, 1);
        assert_eq!(partials, 9);
        assert_eq!(book.bid_count(), 0);
    }

    #[test]
    fn order_round_trip_matches_a_resting_sell_exactly() {
        let mut book = OrderBook::new(AllocFlags::default()).unwrap();
        let mut statuses = Vec::new();
        book.add(
            &event(SystemOrderId::new(99, 1), 100, 10, OrderAction::Sell),
            &mut |s| statuses.push(s),
        );
        statuses.clear();
        book.add(
            &event(SystemOrderId::new(42, 1), 100, 10, OrderAction::Buy),
            &mut |s| statuses.push(s),
        );
        let full = statuses
            .iter()
            .find(|s| s.system_id == SystemOrderId::new(42, 1))
            .unwrap();
        assert_eq!(full.state, OrderState::Full);
        assert_eq!(full.fill_qty, 10);
        assert_eq!(full.fill_price, 100);
    }
}
