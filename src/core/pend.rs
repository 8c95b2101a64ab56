//! Pend lists for tasks waiting on a kernel object
//!
//! Waiters are kept in release order. FIFO lists append; priority lists
//! insert behind every waiter of equal or higher priority, so ties keep
//! arrival order.

use heapless::Vec;

use crate::config::CFG_TASK_MAX;
use crate::task::TaskId;
use crate::types::OsPrio;

/// A task waiting on an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    pub task: TaskId,
    pub prio: OsPrio,
}

/// Waiter list of one kernel object
#[derive(Debug)]
pub struct PendList {
    waiters: Vec<Waiter, CFG_TASK_MAX>,
    by_prio: bool,
}

impl PendList {
    /// Create a new empty pend list
    pub const fn new(by_prio: bool) -> Self {
        PendList {
            waiters: Vec::new(),
            by_prio,
        }
    }

    /// Check if list is empty
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Get head of list
    #[inline(always)]
    pub fn head(&self) -> Option<Waiter> {
        self.waiters.first().copied()
    }

    /// Highest priority among the waiters
    pub fn highest_prio(&self) -> Option<OsPrio> {
        self.waiters.iter().map(|w| w.prio).min()
    }

    /// Insert a waiter in release order
    ///
    /// A task pends on at most one object at a time, so the list can hold
    /// every task and insertion cannot overflow.
    pub fn insert(&mut self, task: TaskId, prio: OsPrio) {
        let waiter = Waiter { task, prio };
        let pos = if self.by_prio {
            self.waiters
                .iter()
                .position(|w| prio < w.prio)
                .unwrap_or(self.waiters.len())
        } else {
            self.waiters.len()
        };

        // Capacity is CFG_TASK_MAX and a task is never listed twice
        let _ = self.waiters.insert(pos, waiter);
    }

    /// Remove and return the head
    pub fn pop(&mut self) -> Option<Waiter> {
        if self.waiters.is_empty() {
            None
        } else {
            Some(self.waiters.remove(0))
        }
    }

    /// Remove specific task from list
    pub fn remove(&mut self, task: TaskId) -> bool {
        match self.waiters.iter().position(|w| w.task == task) {
            Some(pos) => {
                self.waiters.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove every waiter, head first
    pub fn drain(&mut self) -> impl Iterator<Item = Waiter> {
        let waiters = core::mem::take(&mut self.waiters);
        waiters.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;

    fn task(index: u16) -> TaskId {
        TaskId(Handle::new(index, 0))
    }

    #[test]
    fn test_fifo_order() {
        let mut list = PendList::new(false);
        list.insert(task(1), 30);
        list.insert(task(2), 10);
        list.insert(task(3), 20);

        assert_eq!(list.pop().map(|w| w.task), Some(task(1)));
        assert_eq!(list.pop().map(|w| w.task), Some(task(2)));
        assert_eq!(list.pop().map(|w| w.task), Some(task(3)));
        assert!(list.pop().is_none());
    }

    #[test]
    fn test_priority_order_ties_by_arrival() {
        let mut list = PendList::new(true);
        list.insert(task(1), 20);
        list.insert(task(2), 10);
        list.insert(task(3), 20);
        list.insert(task(4), 10);

        assert_eq!(list.highest_prio(), Some(10));
        let order: heapless::Vec<u16, 4> = list.drain().map(|w| w.task.0.index()).collect();
        assert_eq!(order.as_slice(), &[2, 4, 1, 3]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut list = PendList::new(false);
        list.insert(task(1), 5);
        list.insert(task(2), 5);

        assert!(list.remove(task(1)));
        assert!(!list.remove(task(1)));
        assert_eq!(list.len(), 1);
        assert_eq!(list.head().map(|w| w.task), Some(task(2)));
    }
}
