// Copyright 2025 Bucketdb Contributors
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

//! Pre/post write triggers
//!
//! Bucket configurations reference triggers by name; trigger bodies are
//! supplied by the embedding service through a closed capability interface
//! and resolved against a registry at mutation time. A configured name
//! with no registered trigger is a `NotFunctionError`.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::core::{Error, Result};

/// Which mutation a trigger is firing for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    Put,
    Delete,
}

/// Request context handed to a trigger
#[derive(Debug)]
pub struct TriggerContext<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    pub op: TriggerOp,

    /// The incoming value for puts, None for deletes
    pub value: Option<&'a serde_json::Value>,
}

/// A write trigger supplied by the embedding service
pub trait Trigger: Send + Sync {
    fn run(&self, ctx: &TriggerContext<'_>) -> Result<()>;
}

impl<F> Trigger for F
where
    F: Fn(&TriggerContext<'_>) -> Result<()> + Send + Sync,
{
    fn run(&self, ctx: &TriggerContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// Name -> trigger mapping owned by the database
#[derive(Default)]
pub struct TriggerRegistry {
    triggers: RwLock<FxHashMap<String, Arc<dyn Trigger>>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger under a name (replacing any previous registration)
    pub fn register(&self, name: impl Into<String>, trigger: Arc<dyn Trigger>) {
        self.triggers.write().insert(name.into(), trigger);
    }

    /// Resolve a list of configured names to runnable triggers
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Trigger>>> {
        let triggers = self.triggers.read();
        names
            .iter()
            .map(|name| {
                triggers
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::NotFunction(name.clone()))
            })
            .collect()
    }
}

impl std::fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.triggers.read().keys().cloned().collect();
        f.debug_struct("TriggerRegistry")
            .field("registered", &names)
            .finish()
    }
}
