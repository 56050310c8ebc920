//! Interface bridges between processes.
//!
//! A bridge exposes messages written in one process as readable in another.
//! Each new write in the source bus is mirrored into the destination bus with
//! a visibility time of `write_time + latency`, optionally aligned to the
//! destination's tick grid.
//!
//! # Example
//!
//! ```
//! use orrery::messaging::{InterfaceBridge, TimeAlignment};
//!
//! let bridge = InterfaceBridge::new("dynamics", "fsw")
//!     .with_messages(["sc_states"])
//!     .with_latency(5)
//!     .with_alignment(TimeAlignment::CeilToTick);
//!
//! // Written at t=100, 5 ns latency, 10 ns destination tick: visible at 110.
//! assert_eq!(bridge.visible_time(100, 10), 110);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::MessagingError;
use crate::messaging::bus::{MessageBus, MessageId};
use crate::types::SimTime;

/// How a delayed write time snaps to the destination tick grid.
///
/// | Rule | Visible time |
/// |------|--------------|
/// | Exact | `t + latency` |
/// | CeilToTick | `⌈(t + latency) / Δt⌉ × Δt` |
/// | FloorToTick | `⌊(t + latency) / Δt⌋ × Δt` |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeAlignment {
    #[default]
    Exact,

    /// Never exposes a write before the tick that follows it.
    CeilToTick,

    /// May expose a write up to one destination tick early.
    FloorToTick,
}

impl TimeAlignment {
    /// Aligns `time` to a grid of `tick_period`. A zero period leaves it unchanged.
    pub fn align(&self, time: SimTime, tick_period: SimTime) -> SimTime {
        if tick_period == 0 {
            return time;
        }
        match self {
            TimeAlignment::Exact => time,
            TimeAlignment::CeilToTick => time.div_ceil(tick_period) * tick_period,
            TimeAlignment::FloorToTick => (time / tick_period) * tick_period,
        }
    }
}

/// Directional mapping of messages from one process to another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterfaceBridge {
    /// Source process name
    pub from: String,

    /// Destination process name
    pub to: String,

    /// Message names to expose; empty exposes every source message that the
    /// destination does not already define
    #[serde(default)]
    pub messages: Vec<String>,

    /// Delay added to every mirrored write
    #[serde(default)]
    pub latency: SimTime,

    #[serde(default)]
    pub alignment: TimeAlignment,
}

impl InterfaceBridge {
    /// Creates a bridge exposing every message of `from` in `to`.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            messages: Vec::new(),
            latency: 0,
            alignment: TimeAlignment::default(),
        }
    }

    /// Restricts the bridge to the named messages.
    pub fn with_messages<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.messages = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_latency(mut self, latency: SimTime) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_alignment(mut self, alignment: TimeAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Visibility time in the destination for a write at `write_time`.
    pub fn visible_time(&self, write_time: SimTime, dst_tick: SimTime) -> SimTime {
        self.alignment
            .align(write_time.saturating_add(self.latency), dst_tick)
    }

    /// Creates mirror messages in `dst` and returns the resulting routes.
    ///
    /// An explicitly listed name missing from `src` is an `UnknownMessage`
    /// error; one already present in `dst` is a `DuplicateName` error.
    pub fn resolve(
        &self,
        src: &MessageBus,
        dst: &mut MessageBus,
    ) -> Result<Vec<Route>, MessagingError> {
        let names: Vec<String> = if self.messages.is_empty() {
            src.names()
                .filter(|name| dst.find(name).is_none())
                .map(str::to_string)
                .collect()
        } else {
            self.messages.clone()
        };

        let mut routes = Vec::with_capacity(names.len());
        for name in names {
            let src_id = src
                .find(&name)
                .ok_or_else(|| MessagingError::UnknownMessage(name.clone()))?;
            let dst_id = dst.create_mirror(src.info(src_id)?)?;
            routes.push(Route {
                src: src_id,
                dst: dst_id,
                last_count: 0,
            });
        }
        tracing::debug!(
            from = %self.from,
            to = %self.to,
            routes = routes.len(),
            "bridge resolved"
        );
        Ok(routes)
    }

    /// Copies writes newer than each route's last routed write.
    ///
    /// # Returns
    /// The number of writes mirrored.
    pub fn route(
        &self,
        routes: &mut [Route],
        src: &MessageBus,
        dst: &mut MessageBus,
        dst_tick: SimTime,
    ) -> Result<usize, MessagingError> {
        let mut copied = 0;
        for route in routes.iter_mut() {
            for (header, data) in src.writes_since(route.src, route.last_count)? {
                let visible = self.visible_time(header.write_time, dst_tick);
                dst.write_visible(route.dst, &data, header.write_time, visible)?;
                route.last_count = header.write_count;
                copied += 1;
            }
        }
        Ok(copied)
    }
}

/// A resolved source/destination message pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub src: MessageId,
    pub dst: MessageId,
    last_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_rules() {
        assert_eq!(TimeAlignment::Exact.align(103, 10), 103);
        assert_eq!(TimeAlignment::CeilToTick.align(103, 10), 110);
        assert_eq!(TimeAlignment::CeilToTick.align(100, 10), 100);
        assert_eq!(TimeAlignment::FloorToTick.align(103, 10), 100);
        assert_eq!(TimeAlignment::CeilToTick.align(103, 0), 103);
    }

    #[test]
    fn test_resolve_and_route_with_latency() {
        let mut src = MessageBus::new();
        let mut dst = MessageBus::new();
        let id = src.create_message("sc_states", "Raw", 2, 2).unwrap();

        let bridge = InterfaceBridge::new("dyn", "fsw").with_latency(50);
        let mut routes = bridge.resolve(&src, &mut dst).unwrap();
        assert_eq!(routes.len(), 1);

        src.write_raw(id, &[1.0, 2.0], 100).unwrap();
        assert_eq!(bridge.route(&mut routes, &src, &mut dst, 0).unwrap(), 1);
        // Routing twice does not duplicate writes.
        assert_eq!(bridge.route(&mut routes, &src, &mut dst, 0).unwrap(), 0);

        let mirror = dst.find("sc_states").unwrap();
        assert_eq!(dst.read_raw(mirror, 120).unwrap().1, &[0.0, 0.0]);
        assert_eq!(dst.read_raw(mirror, 150).unwrap().1, &[1.0, 2.0]);
    }

    #[test]
    fn test_unresolved_name_is_error() {
        let src = MessageBus::new();
        let mut dst = MessageBus::new();
        let bridge = InterfaceBridge::new("dyn", "fsw").with_messages(["missing"]);
        assert_eq!(
            bridge.resolve(&src, &mut dst).unwrap_err(),
            MessagingError::UnknownMessage("missing".to_string())
        );
    }

    #[test]
    fn test_route_all_skips_names_already_in_destination() {
        let mut src = MessageBus::new();
        let mut dst = MessageBus::new();
        src.create_message("a", "Raw", 1, 2).unwrap();
        src.create_message("b", "Raw", 1, 2).unwrap();
        dst.create_message("b", "Raw", 1, 2).unwrap();

        let routes = InterfaceBridge::new("x", "y").resolve(&src, &mut dst).unwrap();
        assert_eq!(routes.len(), 1);
        assert!(dst.find("a").is_some());
    }
}
