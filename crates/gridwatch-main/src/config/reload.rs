// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of GridWatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use super::{load_file, validate_detailed};
use gridwatch_core::ConfigProvider;
use gridwatch_types::Config;
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::{info, warn};

/// Re-reads the configuration file on every call.
///
/// An unreadable or invalid file keeps the last good configuration in force.
#[derive(Debug)]
pub struct FileConfigProvider {
    path: PathBuf,
    last_good: Mutex<Config>,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>, initial: Config) -> Self {
        Self {
            path: path.into(),
            last_good: Mutex::new(initial),
        }
    }
}

impl ConfigProvider for FileConfigProvider {
    fn current(&self) -> Config {
        let mut last_good = self.last_good.lock();

        let config = match load_file(&self.path) {
            Ok(config) => config,
            Err(e) => {
                warn!("⚠️ Keeping previous configuration: {:#}", e);
                return last_good.clone();
            }
        };

        let validation = validate_detailed(&config);
        if validation.has_errors() {
            for issue in &validation.errors {
                warn!("⚠️ Invalid configuration ({}), keeping previous one", issue);
            }
            return last_good.clone();
        }

        if *last_good != config {
            info!("🔄 Configuration reloaded from {}", self.path.display());
            *last_good = config.clone();
        }
        config
    }
}
