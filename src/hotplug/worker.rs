// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use super::{machine::HpdLine, HpdStatus};
use crate::errors::Result;
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc, oneshot, watch};

pub(crate) type Reply = oneshot::Sender<Result<()>>;

pub(crate) enum Work {
    /// An edge fired, or a dispatch was forced.
    Edge,
    Connect { hpd: bool, reply: Reply },
    Attention { reply: Reply },
    Flush { reply: Reply },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt was not ours to handle; the detector is gone.
    None,
    Handled,
}

/// Interrupt-context entry point of a detector.
///
/// `handle` never blocks: it only queues a work item for the serial worker. Like a kernel
/// work item, an edge is queued at most once until the worker starts on it, so a burst of
/// interrupts collapses into a single step.
#[derive(Clone)]
pub struct IrqHandler {
    irq:     u32,
    tx:      mpsc::UnboundedSender<Work>,
    pending: Arc<AtomicBool>,
}

impl IrqHandler {
    pub(crate) fn new(irq: u32, tx: mpsc::UnboundedSender<Work>) -> Self {
        Self { irq, tx, pending: Arc::new(AtomicBool::new(false)) }
    }

    pub fn irq(&self) -> u32 { self.irq }

    pub fn handle(&self) -> IrqReturn {
        if self.pending.swap(true, Ordering::AcqRel) {
            return if self.tx.is_closed() { IrqReturn::None } else { IrqReturn::Handled };
        }

        match self.tx.send(Work::Edge) {
            Ok(()) => IrqReturn::Handled,
            Err(_) => IrqReturn::None,
        }
    }

    /// Called by the worker as it starts on a queued edge; later edges queue a new step.
    fn started(&self) { self.pending.store(false, Ordering::Release); }
}

impl fmt::Debug for IrqHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrqHandler").field("irq", &self.irq).finish()
    }
}

/// Runs every step of one line in order until shutdown, then releases the line.
pub(crate) async fn run(
    mut line: HpdLine,
    handler: IrqHandler,
    mut rx: mpsc::UnboundedReceiver<Work>,
    mut shutdown: oneshot::Receiver<()>,
    status: watch::Sender<HpdStatus>,
) {
    loop {
        // Shutdown wins over queued work, which is dropped.
        let work = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            work = rx.recv() => match work {
                Some(work) => work,
                None => break,
            },
        };

        let reply = match work {
            Work::Edge => {
                handler.started();
                line.process().await;
                None
            }
            Work::Connect { hpd, reply } => Some((reply, line.connect(hpd))),
            Work::Attention { reply } => Some((reply, line.attention())),
            Work::Flush { reply } => Some((reply, Ok(()))),
        };

        // Callers see the state their own call produced.
        status.send_replace(line.status());

        if let Some((reply, result)) = reply {
            let _ = reply.send(result);
        }
    }

    rx.close();
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }

    if dropped != 0 {
        log::debug!("{}: cancelled {} pending hpd work items", line.name(), dropped);
    }

    line.release();
}

#[cfg(test)]
mod tests {
    use super::{
        super::{mock::*, Edge},
        *,
    };
    use crate::config::Timing;
    use std::{
        sync::{Arc, Mutex},
        thread,
        time::Duration,
    };

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_interrupts_never_overlap_steps() {
        let gpio = MockGpio::new(false);
        gpio.state().dwell = Duration::from_micros(200);
        let recorder = Recorder::default();

        let timing =
            Timing { settle_ms: 1, poll_count: 3, poll_interval_ms: 1, ..Timing::default() };

        let (tx, rx) = mpsc::unbounded_channel();
        let handler = IrqHandler::new(42, tx.clone());
        let mut line = HpdLine::new(
            "hpd",
            42,
            Box::new(MockProvider::new(gpio.clone()).line()),
            handler.clone(),
            recorder.callbacks(),
            timing,
        );

        let steps = Arc::new(Mutex::new(Vec::new()));
        line.steps = Some(steps.clone());

        let (status_tx, status) = watch::channel(line.status());
        let (shutdown, shutdown_rx) = oneshot::channel();
        let worker = tokio::spawn(run(line, handler.clone(), rx, shutdown_rx, status_tx));

        let threads: Vec<_> = (0..8)
            .map(|id| {
                let gpio = gpio.clone();
                let handler = handler.clone();
                thread::spawn(move || {
                    for n in 0..25 {
                        gpio.set_level((id + n) % 2 == 0);
                        assert_eq!(handler.handle(), IrqReturn::Handled);
                        thread::sleep(Duration::from_micros(300));
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }

        let (reply, flushed) = oneshot::channel();
        assert!(tx.send(Work::Flush { reply }).is_ok());
        flushed.await.unwrap().unwrap();

        let mut steps = steps.lock().unwrap().clone();
        assert!(!steps.is_empty());
        steps.sort();
        for pair in steps.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "steps overlap: {:?}", pair);
        }

        let status = status.borrow().clone();
        let expected = if status.hpd_high { Edge::Falling } else { Edge::Rising };
        assert_eq!(status.current_edge, expected);

        let _ = shutdown.send(());
        worker.await.unwrap();
        assert!(gpio.state().released);
    }

    #[test]
    fn burst_while_pending_is_one_edge() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = IrqHandler::new(42, tx);

        for _ in 0..50 {
            assert_eq!(handler.handle(), IrqReturn::Handled);
        }
        assert!(matches!(rx.try_recv(), Ok(Work::Edge)));
        assert!(rx.try_recv().is_err());

        handler.started();
        assert_eq!(handler.handle(), IrqReturn::Handled);
        assert!(matches!(rx.try_recv(), Ok(Work::Edge)));

        drop(rx);
        assert_eq!(handler.handle(), IrqReturn::None);
    }
}
