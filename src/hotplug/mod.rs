// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

//! GPIO hot-plug-detect state machine for DisplayPort links.
//!
//! An [`HpdDetector`] owns one HPD line. Edge interrupts on that line only enqueue work through
//! an [`IrqHandler`]; the debounce protocol itself runs on a single serial worker task, so at
//! most one state transition is ever in flight.

mod arming;
pub mod cdev;
mod machine;
#[cfg(test)]
mod mock;
mod worker;

pub use self::worker::{IrqHandler, IrqReturn};

use self::{
    machine::HpdLine,
    worker::{Reply, Work},
};
use crate::{
    config::{HpdConfig, LineSpec, HPD_GPIO_NAME},
    errors::{HpdError, Result},
};
use serde::Serialize;
use std::io;
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

/// Consumer label used when requesting the line.
const GPIO_LABEL: &str = "dp-hpd";

/// Signal transition that interrupt delivery is armed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    None,
    Rising,
    Falling,
}

impl Edge {
    pub fn opposite(self) -> Self {
        match self {
            Edge::Rising => Edge::Falling,
            Edge::Falling => Edge::Rising,
            Edge::None => Edge::None,
        }
    }
}

/// A requested HPD line together with its interrupt controller.
pub trait HpdGpio: Send {
    /// Raw level of the line, `true` when high.
    fn read_level(&mut self) -> bool;

    /// Deliver `handler` whenever `edge` is seen on the line.
    fn request_irq(&mut self, edge: Edge, handler: IrqHandler) -> io::Result<()>;

    fn free_irq(&mut self);

    /// Identity of the interrupt backing this line.
    fn irq(&self) -> io::Result<u32>;
}

/// Hands out exclusive ownership of GPIO lines.
pub trait GpioProvider {
    fn request(&self, spec: &LineSpec, label: &str) -> io::Result<Box<dyn HpdGpio>>;
}

pub type HpdCallback = Box<dyn Fn() -> io::Result<()> + Send + Sync>;

/// Reactions of the display stack to HPD events.
///
/// `configure` and `disconnect` are mandatory, `attention` may be left unset.
#[derive(Default)]
pub struct HpdCallbacks {
    pub configure:  Option<HpdCallback>,
    pub disconnect: Option<HpdCallback>,
    pub attention:  Option<HpdCallback>,
}

impl HpdCallbacks {
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn on_configure<F>(mut self, func: F) -> Self
    where
        F: Fn() -> io::Result<()> + Send + Sync + 'static,
    {
        self.configure = Some(Box::new(func));
        self
    }

    #[must_use]
    pub fn on_disconnect<F>(mut self, func: F) -> Self
    where
        F: Fn() -> io::Result<()> + Send + Sync + 'static,
    {
        self.disconnect = Some(Box::new(func));
        self
    }

    #[must_use]
    pub fn on_attention<F>(mut self, func: F) -> Self
    where
        F: Fn() -> io::Result<()> + Send + Sync + 'static,
    {
        self.attention = Some(Box::new(func));
        self
    }
}

/// Where the detector finds its line.
pub struct HpdDevice<'a> {
    config:    &'a HpdConfig,
    provider:  &'a dyn GpioProvider,
    gpio_name: &'a str,
}

impl<'a> HpdDevice<'a> {
    pub fn new(config: &'a HpdConfig, provider: &'a dyn GpioProvider) -> Self {
        Self { config, provider, gpio_name: HPD_GPIO_NAME }
    }

    pub fn gpio_name(&self) -> &'a str { self.gpio_name }
}

/// Snapshot of an HPD line, published after every worker step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HpdStatus {
    pub name:              String,
    pub irq:               u32,
    pub current_edge:      Edge,
    pub hpd_high:          bool,
    pub hpd_irq_pending:   bool,
    pub alt_mode_cfg_done: bool,
}

/// Owner-facing handle of one HPD line.
///
/// The line state itself lives on the worker task; this handle only talks to it through the
/// work queue. Dropping the handle stops the worker, `teardown` additionally waits for it.
pub struct HpdDetector {
    name:     String,
    handler:  IrqHandler,
    tx:       mpsc::UnboundedSender<Work>,
    shutdown: oneshot::Sender<()>,
    worker:   JoinHandle<()>,
    status:   watch::Receiver<HpdStatus>,
}

impl HpdDetector {
    /// Requests the HPD line and starts its worker. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `configure` or `disconnect` is unset
    /// - `ConfigurationMissing` if the line name has no entry in the configuration
    /// - `ResourceUnavailable` if the line, its interrupt or the runtime cannot be acquired
    pub fn initialize(device: &HpdDevice<'_>, callbacks: HpdCallbacks) -> Result<Self> {
        if callbacks.configure.is_none() || callbacks.disconnect.is_none() {
            return Err(HpdError::InvalidArgument(
                "configure and disconnect callbacks are required",
            ));
        }

        let name = device.gpio_name;
        let spec = device
            .config
            .line(name)
            .ok_or_else(|| HpdError::ConfigurationMissing(name.into()))?;

        let runtime = Handle::try_current().map_err(|why| {
            let why = io::Error::new(io::ErrorKind::Other, why.to_string());
            HpdError::unavailable("worker", name, why)
        })?;

        let gpio = device
            .provider
            .request(spec, GPIO_LABEL)
            .map_err(|why| HpdError::unavailable("gpio", name, why))?;

        // The line is released by dropping `gpio` if this fails.
        let irq = gpio.irq().map_err(|why| HpdError::unavailable("irq", name, why))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handler = IrqHandler::new(irq, tx.clone());
        let timing = device.config.timing.clone();
        let line = HpdLine::new(name, irq, gpio, handler.clone(), callbacks, timing);

        let (status_tx, status) = watch::channel(line.status());
        let (shutdown, shutdown_rx) = oneshot::channel();
        let worker =
            runtime.spawn(worker::run(line, handler.clone(), rx, shutdown_rx, status_tx));

        log::info!("{}: hpd detector ready on irq {}", name, irq);

        let detector = Self { name: name.into(), handler, tx, shutdown, worker, status };
        detector.register_for_dispatch();
        Ok(detector)
    }

    pub fn name(&self) -> &str { &self.name }

    /// Handler the interrupt substrate should invoke for this line.
    pub fn irq_handler(&self) -> IrqHandler { self.handler.clone() }

    /// Queues a work item as if an interrupt had fired. An edge already waiting for the worker
    /// absorbs this one.
    pub fn register_for_dispatch(&self) -> bool {
        if self.handler.handle() == IrqReturn::None {
            log::warn!("{}: hpd worker has stopped, dispatch dropped", self.name);
            return false;
        }

        true
    }

    /// Forces a connect (`true`) or disconnect (`false`) without consulting the hardware.
    pub async fn simulate_connect(&self, hpd: bool) -> Result<()> {
        self.call(|reply| Work::Connect { hpd, reply }).await
    }

    /// Forces an attention event without consulting the hardware.
    pub async fn simulate_attention(&self) -> Result<()> {
        self.call(|reply| Work::Attention { reply }).await
    }

    /// Waits until every work item queued before this call has run.
    pub async fn flush(&self) -> Result<()> { self.call(|reply| Work::Flush { reply }).await }

    pub fn status(&self) -> HpdStatus { self.status.borrow().clone() }

    /// Receiver that is notified after every worker step.
    pub fn subscribe(&self) -> watch::Receiver<HpdStatus> { self.status.clone() }

    /// Cancels queued work, waits for the running step and releases the line.
    pub async fn teardown(self) {
        let Self { name, shutdown, worker, .. } = self;
        let _ = shutdown.send(());

        if let Err(why) = worker.await {
            log::error!("{}: hpd worker failed: {}", name, why);
        }

        log::info!("{}: hpd detector torn down", name);
    }

    async fn call<F>(&self, work: F) -> Result<()>
    where
        F: FnOnce(Reply) -> Work,
    {
        let (reply, response) = oneshot::channel();
        self.tx.send(work(reply)).map_err(|_| HpdError::WorkerGone(self.name.clone()))?;
        response.await.map_err(|_| HpdError::WorkerGone(self.name.clone()))?
    }
}
