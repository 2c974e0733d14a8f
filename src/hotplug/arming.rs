// Copyright 2026 The dp-gpio-hpd Authors
//
// SPDX-License-Identifier: GPL-3.0-only

use super::{Edge, HpdGpio, IrqHandler};
use std::io;

/// Outcome of arming an edge on a possibly bouncing line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Armed {
    pub requested: Edge,
    pub edge:      Edge,
}

impl Armed {
    /// The line moved while arming, so a different edge than requested ended up armed.
    pub fn changed(&self) -> bool { self.edge != self.requested }
}

/// Arms `requested` on `gpio`, starting from the `current` registration.
///
/// After each registration the level is sampled again. Arming a falling edge on a line that
/// already reads low (or a rising edge on one that reads high) would miss the transition, so
/// the opposite edge is tried instead, at most `attempts` times.
///
/// On error no interrupt is registered any more.
pub(crate) fn arm(
    gpio: &mut dyn HpdGpio,
    handler: &IrqHandler,
    current: Edge,
    requested: Edge,
    attempts: u32,
) -> io::Result<Armed> {
    let mut armed = current;
    let mut edge = requested;

    for _ in 0..attempts.max(1) {
        if edge == armed {
            break;
        }

        if armed != Edge::None {
            gpio.free_irq();
            armed = Edge::None;
        }

        if edge == Edge::None {
            break;
        }

        gpio.request_irq(edge, handler.clone())?;
        armed = edge;

        let level = gpio.read_level();
        match (edge, level) {
            (Edge::Falling, false) | (Edge::Rising, true) => {
                log::debug!("hpd level {} after arming {:?} edge, flipping", level, edge);
                edge = edge.opposite();
            }
            _ => break,
        }
    }

    Ok(Armed { requested, edge: armed })
}
