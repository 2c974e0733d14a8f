// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use super::{arming, Edge, HpdCallbacks, HpdGpio, HpdStatus, IrqHandler};
use crate::{
    config::Timing,
    errors::{HpdError, Result},
};
use tokio::time::sleep;

#[cfg(test)]
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

/// State of one HPD line. Only ever touched by its worker.
pub(crate) struct HpdLine {
    name:              String,
    irq:               u32,
    gpio:              Box<dyn HpdGpio>,
    handler:           IrqHandler,
    callbacks:         HpdCallbacks,
    timing:            Timing,
    current_edge:      Edge,
    hpd_high:          bool,
    hpd_irq_pending:   bool,
    alt_mode_cfg_done: bool,
    /// Enter and exit time of every step.
    #[cfg(test)]
    pub steps:         Option<Arc<Mutex<Vec<(Instant, Instant)>>>>,
}

impl HpdLine {
    pub fn new(
        name: &str,
        irq: u32,
        gpio: Box<dyn HpdGpio>,
        handler: IrqHandler,
        callbacks: HpdCallbacks,
        timing: Timing,
    ) -> Self {
        Self {
            name: name.into(),
            irq,
            gpio,
            handler,
            callbacks,
            timing,
            current_edge: Edge::None,
            hpd_high: false,
            hpd_irq_pending: false,
            alt_mode_cfg_done: false,
            #[cfg(test)]
            steps: None,
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn status(&self) -> HpdStatus {
        HpdStatus {
            name:              self.name.clone(),
            irq:               self.irq,
            current_edge:      self.current_edge,
            hpd_high:          self.hpd_high,
            hpd_irq_pending:   self.hpd_irq_pending,
            alt_mode_cfg_done: self.alt_mode_cfg_done,
        }
    }

    /// One pass of the protocol for a fired edge. Failures end the pass; the next edge
    /// re-enters the machine from whatever edge is armed.
    pub async fn process(&mut self) {
        #[cfg(test)]
        let entered = Instant::now();

        let result = match self.current_edge {
            Edge::None => self.on_initial(),
            Edge::Rising => self.on_rising().await,
            Edge::Falling => self.on_falling().await,
        };

        if let Err(why) = result {
            log::error!("{}: hpd step failed: {}", self.name, why);
        }

        #[cfg(test)]
        if let Some(ref steps) = self.steps {
            steps.lock().unwrap().push((entered, Instant::now()));
        }
    }

    fn on_initial(&mut self) -> Result<()> {
        if self.gpio.read_level() {
            if self.arm_edge(Edge::Falling)? {
                log::info!("{}: hpd dropped while arming falling edge", self.name);
                return Ok(());
            }
        } else if !self.arm_edge(Edge::Rising)? {
            log::debug!("{}: hpd low, waiting for rising edge", self.name);
            return Ok(());
        }

        self.connect(true)
    }

    async fn on_rising(&mut self) -> Result<()> {
        if self.hpd_high {
            log::debug!("{}: duplicate rising edge", self.name);
            return Ok(());
        }

        // A sink is only present once HPD has been high for the whole settle window.
        sleep(self.timing.settle()).await;

        if !self.gpio.read_level() {
            log::info!("{}: hpd low after settle, ignoring rising edge", self.name);
            return Ok(());
        }

        if self.arm_edge(Edge::Falling)? {
            log::info!("{}: hpd dropped while arming falling edge, skipping connect", self.name);
            return Ok(());
        }

        self.connect(true)
    }

    async fn on_falling(&mut self) -> Result<()> {
        if !self.hpd_high {
            log::debug!("{}: duplicate falling edge", self.name);
            return Ok(());
        }

        for poll in 1..=self.timing.poll_count {
            sleep(self.timing.poll_interval()).await;
            if self.gpio.read_level() {
                log::debug!("{}: hpd back high at poll {}, irq_hpd pulse", self.name, poll);
                return self.attention();
            }
        }

        if self.arm_edge(Edge::Rising)? {
            log::info!("{}: hpd rose while arming rising edge, skipping disconnect", self.name);
            return Ok(());
        }

        self.connect(false)
    }

    /// Arms `edge`, returning whether a bounce left a different edge armed.
    pub fn arm_edge(&mut self, edge: Edge) -> Result<bool> {
        match arming::arm(
            self.gpio.as_mut(),
            &self.handler,
            self.current_edge,
            edge,
            self.timing.max_arm_attempts,
        ) {
            Ok(armed) => {
                if armed.edge != self.current_edge {
                    log::debug!("{}: armed {:?} edge", self.name, armed.edge);
                }
                self.current_edge = armed.edge;
                Ok(armed.changed())
            }
            Err(why) => {
                self.current_edge = Edge::None;
                Err(HpdError::unavailable("irq", &self.name, why))
            }
        }
    }

    pub fn connect(&mut self, hpd: bool) -> Result<()> {
        self.hpd_high = hpd;
        self.alt_mode_cfg_done = hpd;
        self.hpd_irq_pending = false;

        let (what, callback) = if hpd {
            ("configure", &self.callbacks.configure)
        } else {
            ("disconnect", &self.callbacks.disconnect)
        };

        let callback =
            callback.as_ref().ok_or(HpdError::InvalidArgument("hpd callbacks are not set"))?;

        log::info!("{}: hpd {}", self.name, if hpd { "connected" } else { "disconnected" });
        callback().map_err(|why| HpdError::IoFailure(what, why))
    }

    pub fn attention(&mut self) -> Result<()> {
        self.hpd_irq_pending = true;

        match self.callbacks.attention {
            Some(ref callback) => {
                log::info!("{}: hpd attention", self.name);
                callback().map_err(|why| HpdError::IoFailure("attention", why))
            }
            None => Ok(()),
        }
    }

    /// Disarms the interrupt and gives the line back.
    pub fn release(mut self) {
        if self.current_edge != Edge::None {
            self.gpio.free_irq();
        }

        log::info!("{}: released hpd gpio", self.name);
    }
}
