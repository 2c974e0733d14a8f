// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

//! HPD lines on the Linux GPIO character device.
//!
//! While no edge is armed the line is held as a plain input. Arming an edge swaps that for an
//! event request whose stream is driven by a task on the current tokio runtime, forwarding
//! every event to the detector's [`IrqHandler`].

use super::{Edge, GpioProvider, HpdGpio, IrqHandler};
use crate::config::LineSpec;
use futures_lite::Stream;
use gpio_cdev::{
    AsyncLineEventHandle, Chip, EventRequestFlags, Line, LineHandle, LineRequestFlags,
};
use std::{
    future, io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::Poll,
};
use tokio::{runtime::Handle, task::JoinHandle};

/// Event stream of an armed line. Taken out (and so closed) when the edge is disarmed.
type Events = Arc<Mutex<Option<AsyncLineEventHandle>>>;

fn cdev_error(why: gpio_cdev::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, why.to_string())
}

fn poisoned() -> io::Error { io::Error::new(io::ErrorKind::Other, "event handle poisoned") }

pub struct CdevProvider;

impl GpioProvider for CdevProvider {
    fn request(&self, spec: &LineSpec, label: &str) -> io::Result<Box<dyn HpdGpio>> {
        Ok(Box::new(CdevLine::request(spec, label)?))
    }
}

struct Armed {
    events:  Events,
    forward: JoinHandle<()>,
}

pub struct CdevLine {
    line:  Line,
    label: String,
    input: Option<LineHandle>,
    armed: Option<Armed>,
}

impl CdevLine {
    pub fn request(spec: &LineSpec, label: &str) -> io::Result<Self> {
        let mut chip = Chip::new(&spec.chip).map_err(cdev_error)?;
        let line = chip.get_line(spec.offset).map_err(cdev_error)?;
        let input = line.request(LineRequestFlags::INPUT, 0, label).map_err(cdev_error)?;

        log::debug!("requested {}:{} as '{}'", spec.chip.display(), spec.offset, label);

        Ok(Self { line, label: label.into(), input: Some(input), armed: None })
    }

    fn value(&self) -> io::Result<u8> {
        if let Some(ref armed) = self.armed {
            let events = armed.events.lock().map_err(|_| poisoned())?;
            if let Some(ref events) = *events {
                return events.as_ref().get_value().map_err(cdev_error);
            }
        }

        match self.input {
            Some(ref input) => input.get_value().map_err(cdev_error),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "line is not requested")),
        }
    }

    /// Closes the event request without waiting on the forwarding task.
    fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.forward.abort();
            match armed.events.lock() {
                Ok(mut events) => drop(events.take()),
                Err(_) => log::error!("{}: hpd event handle poisoned", self.label),
            }
        }
    }

    fn reclaim_input(&mut self) {
        match self.line.request(LineRequestFlags::INPUT, 0, &self.label) {
            Ok(input) => self.input = Some(input),
            Err(why) => log::error!("{}: failed to request hpd input: {}", self.label, why),
        }
    }

    fn arm(&mut self, flags: EventRequestFlags, handler: IrqHandler) -> io::Result<()> {
        let runtime = Handle::try_current()
            .map_err(|why| io::Error::new(io::ErrorKind::Other, why.to_string()))?;

        let events = self.line.events(LineRequestFlags::INPUT, flags, &self.label);
        let events = events.and_then(AsyncLineEventHandle::new).map_err(cdev_error)?;
        let events: Events = Arc::new(Mutex::new(Some(events)));

        let forward = runtime.spawn(forward(events.clone(), handler));
        self.armed = Some(Armed { events, forward });
        Ok(())
    }
}

impl HpdGpio for CdevLine {
    fn read_level(&mut self) -> bool {
        match self.value() {
            Ok(value) => value != 0,
            Err(why) => {
                log::warn!("{}: failed to read hpd level: {}", self.label, why);
                false
            }
        }
    }

    fn request_irq(&mut self, edge: Edge, handler: IrqHandler) -> io::Result<()> {
        let flags = match edge {
            Edge::Rising => EventRequestFlags::RISING_EDGE,
            Edge::Falling => EventRequestFlags::FALLING_EDGE,
            Edge::None => {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "no edge to arm"));
            }
        };

        self.disarm();
        // The kernel refuses an event request while the line is held as an input.
        self.input = None;

        if let Err(why) = self.arm(flags, handler) {
            self.reclaim_input();
            return Err(why);
        }

        Ok(())
    }

    fn free_irq(&mut self) {
        self.disarm();
        if self.input.is_none() {
            self.reclaim_input();
        }
    }

    fn irq(&self) -> io::Result<u32> { Ok(self.line.offset()) }
}

impl Drop for CdevLine {
    fn drop(&mut self) { self.disarm(); }
}

/// Calls `handler` for every event until the stream is closed or fails.
async fn forward(events: Events, handler: IrqHandler) {
    loop {
        // The lock is only held while polling, never across a suspension.
        let next = future::poll_fn(|cx| match events.lock() {
            Ok(mut events) => match events.as_mut() {
                Some(events) => Pin::new(events).poll_next(cx),
                None => Poll::Ready(None),
            },
            Err(_) => Poll::Ready(None),
        })
        .await;

        match next {
            Some(Ok(event)) => {
                log::trace!("irq {}: {:?}", handler.irq(), event.event_type());
                handler.handle();
            }
            Some(Err(why)) => {
                log::error!("irq {}: failed to read hpd event: {}", handler.irq(), why);
                return;
            }
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn forwarding_ends_once_events_are_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events: Events = Arc::new(Mutex::new(None));

        forward(events, IrqHandler::new(17, tx)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn missing_chip_is_an_error() {
        let spec = LineSpec { chip: PathBuf::from("/dev/gpiochip-missing"), offset: 17 };
        assert!(CdevLine::request(&spec, "dp-hpd").is_err());
    }
}
