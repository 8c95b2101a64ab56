//! Producer-Consumer example with a message queue
//!
//! The producer sends numbered messages every 20 ticks, the consumer
//! drains them, and a periodic timer reports progress. The main thread
//! waits on a semaphore until the consumer has seen every message.

use std::sync::atomic::{AtomicU32, Ordering};

use log::{LevelFilter, Log, Metadata, Record};
use osal::queue::{self, QueueId};
use osal::sem::{self, SemId};
use osal::task;
use osal::time;
use osal::timer::{self, TimerId};
use osal::types::{opt, MsgPriority, WAIT_FOREVER};
use osal::OsResult;

const MESSAGES: u32 = 10;

static PRODUCED: AtomicU32 = AtomicU32::new(0);
static CONSUMED: AtomicU32 = AtomicU32::new(0);
static DONE: AtomicU32 = AtomicU32::new(0);

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn producer_task(arg: usize) {
    let q = QueueId::from_raw(arg as u32);
    for n in 1..=MESSAGES {
        let prio = if n == MESSAGES {
            MsgPriority::Urgent
        } else {
            MsgPriority::Normal
        };
        if let Err(err) = queue::send(q, &n.to_le_bytes(), WAIT_FOREVER, prio) {
            log::error!("[P] send failed: {}", err);
            return;
        }
        PRODUCED.fetch_add(1, Ordering::Relaxed);
        log::info!("[P] produced #{}", n);
        let _ = time::delay(20);
    }
}

fn consumer_task(arg: usize) {
    let q = QueueId::from_raw(arg as u32);
    let done = SemId::from_raw(DONE.load(Ordering::Acquire));

    while CONSUMED.load(Ordering::Relaxed) < MESSAGES {
        match queue::receive(q, 100) {
            Ok(msg) => {
                let n = u32::from_le_bytes([msg[0], msg[1], msg[2], msg[3]]);
                CONSUMED.fetch_add(1, Ordering::Relaxed);
                log::info!("[C] consumed #{}", n);
            }
            Err(err) if err.is_timeout() => log::info!("[C] idle"),
            Err(err) => {
                log::error!("[C] receive failed: {}", err);
                break;
            }
        }
    }

    let _ = sem::give(done);
}

fn report(_: TimerId, _: usize) {
    log::info!(
        "[T] produced {} consumed {}",
        PRODUCED.load(Ordering::Relaxed),
        CONSUMED.load(Ordering::Relaxed)
    );
}

fn main() -> OsResult<()> {
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Info));
    log::info!("Producer-Consumer Demo");

    let q = queue::create("work", 4, 4, opt::Q_FIFO)?;
    let done = sem::create_binary("done", false, opt::Q_FIFO)?;
    DONE.store(done.into_raw(), Ordering::Release);
    let stats = timer::create("stats", time::ticks_per_second() / 10, report, 0)?;
    timer::start(stats, 1)?;

    let arg = q.into_raw() as usize;
    let consumer = task::create("C", consumer_task, arg, 10, 64 * 1024)?;
    let producer = task::create("P", producer_task, arg, 15, 64 * 1024)?;
    task::start(consumer)?;
    task::start(producer)?;

    log::info!("Starting...");
    sem::take(done, WAIT_FOREVER)?;

    timer::delete(stats)?;
    queue::delete(q)?;
    sem::delete(done)?;

    log::info!(
        "Done: produced {} consumed {}",
        PRODUCED.load(Ordering::Relaxed),
        CONSUMED.load(Ordering::Relaxed)
    );
    Ok(())
}
