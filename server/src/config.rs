/*
 * Created on Thu Jul 30 2026
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Configuration
//!
//! Three layers, lowest priority first: compiled-in defaults, an optional
//! `sqlited.yaml` file, then environment variables. This codec has a handful of
//! knobs (listen address, db path, the frame size cap, the two streaming
//! thresholds, the log filter), so one flat struct is enough — no endpoint/
//! system/auth split is needed.

use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

const DEFAULT_LISTEN: &str = "127.0.0.1:8422";
const DEFAULT_DB_PATH: &str = "sqlited.db";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Mirrors [`Configuration`] but with every field optional, for deserializing a
/// possibly-partial `sqlited.yaml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    listen: Option<String>,
    db_path: Option<String>,
    max_frame_words: Option<u32>,
    body2_release_threshold: Option<usize>,
    row_soft_cap: Option<usize>,
    log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub listen: String,
    pub db_path: String,
    /// §4.1's configured max, in 8-byte words (suggested default: 1 << 22 = 32 MiB).
    pub max_frame_words: u32,
    /// §4.1's `body2` high-water release mark, in bytes.
    pub body2_release_threshold: usize,
    /// §4.5's partial-result cutoff. The inline region is always packed full before
    /// any row is held back; this bounds how many further bytes the heap overflow
    /// region may grow by, once the inline region is full, before the frame is cut.
    /// Defaults to [`crate::codec::message::BODY1_CAP`]: one inline buffer's worth of
    /// additional overflow per frame.
    pub row_soft_cap: usize,
    pub log_filter: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_owned(),
            db_path: DEFAULT_DB_PATH.to_owned(),
            max_frame_words: crate::codec::message::DEFAULT_MAX_WORDS,
            body2_release_threshold: crate::codec::message::BODY2_RELEASE_THRESHOLD,
            row_soft_cap: crate::codec::message::BODY1_CAP,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl Configuration {
    fn apply_file(mut self, file: ConfigFile) -> Self {
        if let Some(v) = file.listen {
            self.listen = v;
        }
        if let Some(v) = file.db_path {
            self.db_path = v;
        }
        if let Some(v) = file.max_frame_words {
            self.max_frame_words = v;
        }
        if let Some(v) = file.body2_release_threshold {
            self.body2_release_threshold = v;
        }
        if let Some(v) = file.row_soft_cap {
            self.row_soft_cap = v;
        }
        if let Some(v) = file.log_filter {
            self.log_filter = v;
        }
        self
    }

    fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = env::var("SQLITED_LISTEN") {
            self.listen = v;
        }
        if let Ok(v) = env::var("SQLITED_DB_PATH") {
            self.db_path = v;
        }
        if let Ok(v) = env::var("SQLITED_MAX_FRAME_WORDS") {
            self.max_frame_words = v
                .parse()
                .map_err(|_| ConfigError(format!("SQLITED_MAX_FRAME_WORDS: invalid u32 `{v}`")))?;
        }
        if let Ok(v) = env::var("SQLITED_LOG") {
            self.log_filter = v;
        }
        Ok(self)
    }

    /// Loads defaults, layers `path` over them if it exists, then layers environment
    /// variables over the result. A missing config file is not an error; a present but
    /// malformed one is.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let base = Self::default();
        let with_file = if path.exists() {
            let raw = fs::read_to_string(path)
                .map_err(|e| ConfigError(format!("failed to read {}: {e}", path.display())))?;
            let file: ConfigFile = serde_yaml::from_str(&raw)
                .map_err(|e| ConfigError(format!("failed to parse {}: {e}", path.display())))?;
            base.apply_file(file)
        } else {
            base
        };
        with_file.apply_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Configuration::default();
        assert_eq!(cfg.listen, DEFAULT_LISTEN);
        assert_eq!(cfg.db_path, DEFAULT_DB_PATH);
        assert_eq!(cfg.max_frame_words, 1 << 22);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = Configuration::load("/nonexistent/path/sqlited.yaml").unwrap();
        assert_eq!(cfg, Configuration::default());
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!(
            "sqlited-test-cfg-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sqlited.yaml");
        fs::write(&path, "listen: \"0.0.0.0:9000\"\nlog_filter: debug\n").unwrap();
        let cfg = Configuration::load(&path).unwrap();
        assert_eq!(cfg.listen, "0.0.0.0:9000");
        assert_eq!(cfg.log_filter, "debug");
        assert_eq!(cfg.db_path, DEFAULT_DB_PATH);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn env_layer_overrides_file_and_defaults() {
        std::env::set_var("SQLITED_LISTEN", "10.0.0.1:1234");
        let cfg = Configuration::load("/nonexistent/path/sqlited.yaml").unwrap();
        assert_eq!(cfg.listen, "10.0.0.1:1234");
        std::env::remove_var("SQLITED_LISTEN");
    }

    #[test]
    fn unknown_field_in_file_is_rejected() {
        let dir = std::env::temp_dir().join(format!(
            "sqlited-test-cfg-bad-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sqlited.yaml");
        fs::write(&path, "bogus_key: 1\n").unwrap();
        assert!(Configuration::load(&path).is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
