// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Tuning knobs for the throttler's decode workers.
///
/// Every field has a default, so a settings file only needs to name the
/// values it changes:
///
/// ```
/// use vela_io::ThrottlerSettings;
///
/// let settings = ThrottlerSettings::from_ron_str("(decode_thread_limit: 2)").unwrap();
/// assert_eq!(settings.decode_thread_limit, 2);
/// assert_eq!(settings.spawn_ceiling, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThrottlerSettings {
    /// Decodes allowed to run at once. Defaults to one less than the number
    /// of cores, and never less than one.
    pub decode_thread_limit: usize,
    /// Hard cap on live worker threads, stalled ones included.
    pub spawn_ceiling: usize,
    /// A decode running longer than this stops counting against
    /// `decode_thread_limit`, so one wedged stream cannot starve the queue.
    pub stall_timeout_ms: u64,
    /// Worker threads are named `<prefix>-<n>`.
    pub thread_name_prefix: String,
    /// Serve resources that were already delivered, and are still held by
    /// someone, without decoding them again.
    pub cache_resources: bool,
}

impl ThrottlerSettings {
    /// Parses settings from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).context("Failed to parse throttler settings")
    }

    /// Reads settings from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read throttler settings from {}", path.display()))?;
        Self::from_ron_str(&text)
    }

    /// [`stall_timeout_ms`](Self::stall_timeout_ms) as a `Duration`.
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }
}

impl Default for ThrottlerSettings {
    fn default() -> Self {
        Self {
            decode_thread_limit: default_decode_thread_limit(),
            spawn_ceiling: 256,
            stall_timeout_ms: 10_000,
            thread_name_prefix: "vela-decode".to_string(),
            cache_resources: true,
        }
    }
}

fn default_decode_thread_limit() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores.saturating_sub(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_leave_a_core_for_the_render_thread() {
        let settings = ThrottlerSettings::default();
        assert!(settings.decode_thread_limit >= 1);
        assert_eq!(settings.stall_timeout(), Duration::from_secs(10));
        assert_eq!(settings.thread_name_prefix, "vela-decode");
        assert!(settings.cache_resources);
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let settings =
            ThrottlerSettings::from_ron_str("(spawn_ceiling: 8, stall_timeout_ms: 250)").unwrap();
        assert_eq!(settings.spawn_ceiling, 8);
        assert_eq!(settings.stall_timeout(), Duration::from_millis(250));
        assert_eq!(settings.thread_name_prefix, "vela-decode");
    }

    #[test]
    fn load_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(thread_name_prefix: \"loader\", cache_resources: false)").unwrap();

        let settings = ThrottlerSettings::load(file.path()).unwrap();
        assert_eq!(settings.thread_name_prefix, "loader");
        assert!(!settings.cache_resources);
    }

    #[test]
    fn malformed_ron_is_an_error() {
        assert!(ThrottlerSettings::from_ron_str("(spawn_ceiling: \"many\")").is_err());
    }
}
