//! Message queue implementation
//!
//! Bounded queues of byte messages. A message is copied into the queue on
//! send and out of it on receive, so neither side shares a buffer.
//!
//! Messages go straight to a blocked receiver. When a blocked sender is
//! waiting on a full queue, the receive that frees a slot moves the
//! sender's message in, so arrival order holds across the wait.

use core::mem;

use heapless::Deque;

use crate::config::{CFG_MSG_SIZE_MAX, CFG_QUEUE_DEPTH_MAX};
use crate::critical::is_isr_context;
use crate::error::{OsError, OsResult};
use crate::handle::os_handle;
use crate::kernel::{self, with_tables};
use crate::pend::PendList;
use crate::task::{self, TaskId};
use crate::types::{
    opt, os_name, Message, MsgPriority, OsName, OsOpt, OsPendOn, OsPendStatus, OsTick, NO_WAIT,
    WAIT_FOREVER,
};

os_handle!(
    /// Handle of a message queue
    QueueId
);

/// Message queue
pub struct OsQueue {
    pub(crate) name: OsName,
    /// Maximum number of queued messages
    capacity: usize,
    /// Maximum size of one message
    msg_size: usize,
    msgs: Deque<Message, CFG_QUEUE_DEPTH_MAX>,
    /// Tasks waiting for a message
    pub(crate) recv_list: PendList,
    /// Tasks waiting for space
    pub(crate) send_list: PendList,
}

impl OsQueue {
    fn new(name: OsName, capacity: usize, msg_size: usize, by_prio: bool) -> Self {
        OsQueue {
            name,
            capacity,
            msg_size,
            msgs: Deque::new(),
            recv_list: PendList::new(by_prio),
            send_list: PendList::new(by_prio),
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.msgs.len() >= self.capacity
    }

    /// Enqueue; the caller has checked for space
    fn push(&mut self, msg: Message, prio: MsgPriority) {
        let _ = match prio {
            MsgPriority::Normal => self.msgs.push_back(msg),
            MsgPriority::Urgent => self.msgs.push_front(msg),
        };
    }
}

/// Snapshot of a message queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    pub name: OsName,
    pub capacity: usize,
    pub msg_size: usize,
    /// Messages currently queued
    pub count: usize,
    pub senders_waiting: usize,
    pub receivers_waiting: usize,
}

enum Recv {
    Got(Message),
    Blocked(TaskId),
}

/// Create a message queue
///
/// # Arguments
/// * `name` - Queue name, unique unless empty
/// * `capacity` - Maximum number of messages, at most `CFG_QUEUE_DEPTH_MAX`
/// * `msg_size` - Maximum message size in bytes, at most `CFG_MSG_SIZE_MAX`
/// * `options` - `Q_FIFO` or `Q_PRIORITY` order of blocked tasks
pub fn create(name: &str, capacity: usize, msg_size: usize, options: OsOpt) -> OsResult<QueueId> {
    if capacity == 0 || capacity > CFG_QUEUE_DEPTH_MAX {
        return Err(OsError::InvalidArgument);
    }

    if msg_size == 0 || msg_size > CFG_MSG_SIZE_MAX || options & !opt::Q_MASK != 0 {
        return Err(OsError::InvalidArgument);
    }

    let os_name = os_name(name)?;

    let id = with_tables(|t| {
        if !name.is_empty() && t.queues.find(|q| q.name == name).is_some() {
            return Err(OsError::AlreadyExists);
        }
        let by_prio = options & opt::Q_PRIORITY != 0;
        t.queues
            .insert(OsQueue::new(os_name, capacity, msg_size, by_prio))
            .map(QueueId)
    })?;

    crate::debug!("queue {}: created '{}' {}x{}", id, name, capacity, msg_size);
    Ok(id)
}

/// Send a message
///
/// # Arguments
/// * `msg` - Message bytes, at most the queue's message size
/// * `timeout` - How long to wait for space
/// * `prio` - `Urgent` puts the message at the head of the queue
///
/// # Returns
/// * `Err(OsError::InvalidArgument)` - Message too long, or a blocking send
///   from the timer service context
/// * `Err(OsError::Timeout)` - Queue stayed full
/// * `Err(OsError::NotFound)` - Stale handle, or deleted while waiting
pub fn send(id: QueueId, msg: &[u8], timeout: OsTick, prio: MsgPriority) -> OsResult<()> {
    let message = Message::from_slice(msg).map_err(|_| OsError::InvalidArgument)?;

    if timeout != NO_WAIT && is_isr_context() {
        return Err(OsError::InvalidArgument);
    }

    let me = if timeout == NO_WAIT {
        None
    } else {
        Some(task::id_self()?)
    };

    let blocked = with_tables(|t| {
        let queue = t.queues.get_mut(id.0)?;
        if message.len() > queue.msg_size {
            return Err(OsError::InvalidArgument);
        }

        // A waiting receiver implies an empty queue
        if let Some(waiter) = queue.recv_list.pop() {
            if let Ok(tcb) = t.tcb(waiter.task) {
                tcb.msg = message;
            }
            t.ready(waiter.task, OsPendStatus::Ok);
            return Ok(None);
        }

        if !queue.is_full() {
            queue.push(message, prio);
            return Ok(None);
        }

        let Some(me) = me else {
            return Err(OsError::Timeout);
        };

        let tcb = t.tcb(me)?;
        let task_prio = tcb.prio;
        tcb.msg = message;
        tcb.msg_prio = prio;
        tcb.pend_on(OsPendOn::QueueSend(id.0.index()), timeout != WAIT_FOREVER);
        t.queues.get_mut(id.0)?.send_list.insert(me, task_prio);
        Ok(Some(me))
    })?;

    match blocked {
        Some(me) => kernel::pend(me, timeout),
        None => Ok(()),
    }
}

/// Receive the message at the head of the queue
///
/// # Returns
/// * `Ok(msg)` - Oldest message, or the most recent urgent one
/// * `Err(OsError::Timeout)` - Queue stayed empty
/// * `Err(OsError::NotFound)` - Stale handle, or deleted while waiting
/// * `Err(OsError::InvalidArgument)` - Blocking receive from the timer
///   service context
pub fn receive(id: QueueId, timeout: OsTick) -> OsResult<Message> {
    if timeout != NO_WAIT && is_isr_context() {
        return Err(OsError::InvalidArgument);
    }

    let me = if timeout == NO_WAIT {
        None
    } else {
        Some(task::id_self()?)
    };

    let recv = with_tables(|t| {
        let queue = t.queues.get_mut(id.0)?;

        if let Some(msg) = queue.msgs.pop_front() {
            // Move the first blocked sender's message into the freed slot
            if let Some(sender) = queue.send_list.pop() {
                if let Ok(tcb) = t.tcb(sender.task) {
                    let pending = mem::take(&mut tcb.msg);
                    let prio = tcb.msg_prio;
                    t.queues.get_mut(id.0)?.push(pending, prio);
                }
                t.ready(sender.task, OsPendStatus::Ok);
            }
            return Ok(Recv::Got(msg));
        }

        let Some(me) = me else {
            return Err(OsError::Timeout);
        };

        let tcb = t.tcb(me)?;
        let task_prio = tcb.prio;
        tcb.pend_on(OsPendOn::QueueRecv(id.0.index()), timeout != WAIT_FOREVER);
        t.queues.get_mut(id.0)?.recv_list.insert(me, task_prio);
        Ok(Recv::Blocked(me))
    })?;

    match recv {
        Recv::Got(msg) => Ok(msg),
        Recv::Blocked(me) => {
            kernel::pend(me, timeout)?;
            with_tables(|t| Ok(mem::take(&mut t.tcb(me)?.msg)))
        }
    }
}

/// Delete a message queue
///
/// Blocked senders and receivers wake with `NotFound`. Queued messages are
/// discarded.
pub fn delete(id: QueueId) -> OsResult<()> {
    let (woken, dropped) = with_tables(|t| {
        let mut queue = t.queues.remove(id.0)?;
        let mut woken = 0;
        for waiter in queue.recv_list.drain().chain(queue.send_list.drain()) {
            t.ready(waiter.task, OsPendStatus::Del);
            woken += 1;
        }
        Ok::<_, OsError>((woken, queue.msgs.len()))
    })?;

    crate::debug!(
        "queue {}: deleted, {} waiters released, {} messages dropped",
        id,
        woken,
        dropped
    );
    Ok(())
}

/// Number of queued messages
pub fn count(id: QueueId) -> OsResult<usize> {
    with_tables(|t| Ok(t.queues.get(id.0)?.msgs.len()))
}

/// Find a queue by name
pub fn find(name: &str) -> OsResult<QueueId> {
    if name.is_empty() {
        return Err(OsError::NotFound);
    }

    with_tables(|t| t.queues.find(|q| q.name == name))
        .map(QueueId)
        .ok_or(OsError::NotFound)
}

pub fn info(id: QueueId) -> OsResult<QueueInfo> {
    with_tables(|t| {
        let queue = t.queues.get(id.0)?;
        Ok(QueueInfo {
            name: queue.name.clone(),
            capacity: queue.capacity,
            msg_size: queue.msg_size,
            count: queue.msgs.len(),
            senders_waiting: queue.send_list.len(),
            receivers_waiting: queue.recv_list.len(),
        })
    })
}

// ============ Safe Wrapper ============

/// Owning wrapper that deletes the queue on drop
pub struct Queue {
    id: QueueId,
}

impl Queue {
    pub fn new(name: &str, capacity: usize, msg_size: usize) -> OsResult<Self> {
        create(name, capacity, msg_size, opt::Q_FIFO).map(|id| Queue { id })
    }

    #[inline]
    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn send(&self, msg: &[u8], timeout: OsTick) -> OsResult<()> {
        send(self.id, msg, timeout, MsgPriority::Normal)
    }

    pub fn send_urgent(&self, msg: &[u8], timeout: OsTick) -> OsResult<()> {
        send(self.id, msg, timeout, MsgPriority::Urgent)
    }

    pub fn receive(&self, timeout: OsTick) -> OsResult<Message> {
        receive(self.id, timeout)
    }

    #[inline]
    pub fn len(&self) -> usize {
        count(self.id).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        let _ = delete(self.id);
    }
}
