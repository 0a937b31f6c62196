// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Structured key/value fields attached to a log line.
pub type Fields = serde_json::Map<String, Value>;

/// Builds [`Fields`] from any iterator of key/value pairs.
pub fn fields<I, K, V>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

struct Frame {
    fields: Fields,
    parent: Option<Arc<Frame>>,
}

/// Immutable chain of enrichment frames.
///
/// Enriching pushes a new frame that points at the existing chain, so a
/// child logger never copies or mutates its parent's fields. Lookups and
/// merges resolve keys last-write-wins from the newest frame.
#[derive(Clone, Default)]
pub struct Enrichment {
    head: Option<Arc<Frame>>,
}

impl Enrichment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(&self, fields: Fields) -> Self {
        if fields.is_empty() {
            return self.clone();
        }
        Self {
            head: Some(Arc::new(Frame {
                fields,
                parent: self.head.clone(),
            })),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.frames().find_map(|frame| frame.fields.get(key))
    }

    /// Writes every field into `target`, oldest frame first.
    pub fn merge_into(&self, target: &mut Fields) {
        let frames: Vec<&Frame> = self.frames().collect();
        for frame in frames.into_iter().rev() {
            for (key, value) in &frame.fields {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut merged = Fields::new();
        self.merge_into(&mut merged);
        merged
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.head.as_deref(), |frame| frame.parent.as_deref())
    }
}

impl fmt::Debug for Enrichment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.to_fields()).finish()
    }
}
