// File: registry.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ConfigParameter;
use crate::geoip::AsnLookup;
use crate::measurer::{ExperimentMeasurer, Measurer};

/// Experiments by name. Built once by the application and passed to
/// whatever needs to look experiments up.
pub struct ExperimentRegistry {
    experiments: BTreeMap<&'static str, Box<dyn ExperimentMeasurer>>,
}

impl ExperimentRegistry {
    pub fn new() -> Self {
        Self {
            experiments: BTreeMap::new(),
        }
    }

    /// A registry holding every experiment this crate implements.
    pub fn with_known_experiments(config: ConfigParameter, asn: Arc<dyn AsnLookup>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Measurer::new(config, asn)));
        registry
    }

    pub fn register(&mut self, experiment: Box<dyn ExperimentMeasurer>) {
        self.experiments.insert(experiment.name(), experiment);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ExperimentMeasurer> {
        self.experiments.get(name).map(|e| e.as_ref())
    }

    pub fn list(&self) -> Vec<String> {
        self.experiments.keys().map(|k| k.to_string()).collect()
    }
}

impl Default for ExperimentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
