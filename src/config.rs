// This file is part of msg-router.
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Router configuration. The host application owns sourcing this (file,
//! env, CLI flags); the router only defines the shape and defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_queue_max_length() -> usize {
    10_000
}

fn default_queue_sweep_interval_ms() -> u64 {
    1_000
}

fn default_backoff_initial_ms() -> u64 {
    20
}

fn default_backoff_max_ms() -> u64 {
    5_000
}

fn default_backoff_jitter() -> f64 {
    0.25
}

fn default_multicast_op_timeout_ms() -> u64 {
    60_000
}

fn default_workers() -> usize {
    4
}

fn default_persistence_path() -> String {
    "routing-table.persist".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub queue_max_length: usize,
    pub queue_sweep_interval_ms: u64,
    pub dispatch_backoff_initial_ms: u64,
    pub dispatch_backoff_max_ms: u64,
    pub dispatch_backoff_jitter: f64,
    pub multicast_op_timeout_ms: u64,
    pub workers: usize,
    pub persistence_path: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            queue_max_length: default_queue_max_length(),
            queue_sweep_interval_ms: default_queue_sweep_interval_ms(),
            dispatch_backoff_initial_ms: default_backoff_initial_ms(),
            dispatch_backoff_max_ms: default_backoff_max_ms(),
            dispatch_backoff_jitter: default_backoff_jitter(),
            multicast_op_timeout_ms: default_multicast_op_timeout_ms(),
            workers: default_workers(),
            persistence_path: default_persistence_path(),
        }
    }
}

impl RouterConfig {
    pub fn queue_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.queue_sweep_interval_ms)
    }

    pub fn dispatch_backoff_initial(&self) -> Duration {
        Duration::from_millis(self.dispatch_backoff_initial_ms)
    }

    pub fn dispatch_backoff_max(&self) -> Duration {
        Duration::from_millis(self.dispatch_backoff_max_ms)
    }

    pub fn multicast_op_timeout(&self) -> Duration {
        Duration::from_millis(self.multicast_op_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RouterConfig::default();

        assert_eq!(cfg.queue_max_length, 10_000);
        assert_eq!(cfg.queue_sweep_interval_ms, 1_000);
        assert_eq!(cfg.dispatch_backoff_initial_ms, 20);
        assert_eq!(cfg.dispatch_backoff_max_ms, 5_000);
        assert!((cfg.dispatch_backoff_jitter - 0.25).abs() < f64::EPSILON);
        assert_eq!(cfg.multicast_op_timeout_ms, 60_000);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.persistence_path, "routing-table.persist");
    }

    #[test]
    fn deserialize_applies_partial_overrides() {
        let cfg: RouterConfig = serde_json::from_str(r#"{"workers": 8}"#).unwrap();

        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.queue_max_length, 10_000);
    }
}
