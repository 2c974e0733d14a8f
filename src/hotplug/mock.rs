// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

//! Scripted GPIO line and callback recorder for the detector tests.

use super::{Edge, GpioProvider, HpdCallbacks, HpdGpio, IrqHandler, IrqReturn};
use crate::config::{HpdConfig, LineSpec, HPD_GPIO_NAME};
use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::Duration,
};

pub(crate) fn config() -> HpdConfig {
    HpdConfig::default()
        .with_line(HPD_GPIO_NAME, LineSpec { chip: "/dev/gpiochip0".into(), offset: 17 })
}

#[derive(Default)]
pub(crate) struct MockState {
    /// Level reported once the script is exhausted.
    pub level:     bool,
    pub script:    VecDeque<bool>,
    pub reads:     usize,
    pub armed:     Option<Edge>,
    pub handler:   Option<IrqHandler>,
    pub requests:  Vec<Edge>,
    pub frees:     usize,
    pub fail_irq:  bool,
    pub fail_arm:  bool,
    pub released:  bool,
    /// Time spent inside every level read, to widen the window of a step.
    pub dwell:     Duration,
}

#[derive(Clone, Default)]
pub(crate) struct MockGpio {
    state: Arc<Mutex<MockState>>,
}

impl MockGpio {
    pub fn new(level: bool) -> Self {
        let gpio = Self::default();
        gpio.set_level(level);
        gpio
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> { self.state.lock().unwrap() }

    pub fn set_level(&self, level: bool) { self.state().level = level; }

    /// Levels returned by the next reads, before falling back to the steady level.
    pub fn script<I: IntoIterator<Item = bool>>(&self, levels: I) {
        self.state().script.extend(levels);
    }

    /// Delivers an interrupt the way the armed controller would.
    pub fn fire(&self) -> IrqReturn {
        let handler = self.state().handler.clone();
        handler.map_or(IrqReturn::None, |handler| handler.handle())
    }

    fn sample(&self) -> bool {
        let (level, dwell) = {
            let mut state = self.state();
            state.reads += 1;
            let level = state.script.pop_front().unwrap_or(state.level);
            (level, state.dwell)
        };

        if !dwell.is_zero() {
            thread::sleep(dwell);
        }

        level
    }
}

/// Line handed out by [`MockProvider`]; marks the line released when dropped.
pub(crate) struct MockLine(MockGpio);

impl HpdGpio for MockLine {
    fn read_level(&mut self) -> bool { self.0.sample() }

    fn request_irq(&mut self, edge: Edge, handler: IrqHandler) -> io::Result<()> {
        let mut state = self.0.state();
        if state.fail_arm {
            return Err(io::Error::new(io::ErrorKind::Other, "irq controller busy"));
        }

        state.requests.push(edge);
        state.armed = Some(edge);
        state.handler = Some(handler);
        Ok(())
    }

    fn free_irq(&mut self) {
        let mut state = self.0.state();
        state.frees += 1;
        state.armed = None;
        state.handler = None;
    }

    fn irq(&self) -> io::Result<u32> {
        if self.0.state().fail_irq {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no irq for gpio"));
        }

        Ok(42)
    }
}

impl Drop for MockLine {
    fn drop(&mut self) { self.0.state().released = true; }
}

pub(crate) struct MockProvider {
    gpio: MockGpio,
    fail: bool,
}

impl MockProvider {
    pub fn new(gpio: MockGpio) -> Self { Self { gpio, fail: false } }

    pub fn failing_request(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn line(&self) -> MockLine { MockLine(self.gpio.clone()) }
}

impl GpioProvider for MockProvider {
    fn request(&self, _spec: &LineSpec, _label: &str) -> io::Result<Box<dyn HpdGpio>> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::Other, "gpio is busy"));
        }

        Ok(Box::new(self.line()))
    }
}

/// Records the order in which callbacks fire.
#[derive(Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<&'static str>>>);

impl Recorder {
    pub fn events(&self) -> Vec<&'static str> { self.0.lock().unwrap().clone() }

    pub fn callbacks(&self) -> HpdCallbacks {
        let (configure, disconnect, attention) = (self.clone(), self.clone(), self.clone());
        HpdCallbacks::new()
            .on_configure(move || configure.push("configure"))
            .on_disconnect(move || disconnect.push("disconnect"))
            .on_attention(move || attention.push("attention"))
    }

    fn push(&self, event: &'static str) -> io::Result<()> {
        self.0.lock().unwrap().push(event);
        Ok(())
    }
}
