//! System / user bucketing of process names
use std::collections::BTreeSet;

use crate::connection::Bucket;

/// Process names treated as operating system owned when nothing else is configured.
pub const DEFAULT_SYSTEM_PROCESSES: [&str; 2] = ["system", "system idle process"];

/// Case-insensitive membership test against a fixed set of system process names.
#[derive(Debug, Clone)]
pub struct Classifier {
    system_names: BTreeSet<String>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::with_names(DEFAULT_SYSTEM_PROCESSES)
    }

    /// Build a classifier from exactly `names`.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let system_names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        Self { system_names }
    }

    /// The default set plus `extra`.
    pub fn extended<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classifier = Self::new();
        classifier.system_names.extend(
            extra
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty()),
        );
        classifier
    }

    pub fn classify(&self, process_name: &str) -> Bucket {
        if self.system_names.contains(&process_name.to_lowercase()) {
            Bucket::System
        } else {
            Bucket::User
        }
    }

    pub fn system_names(&self) -> impl Iterator<Item = &str> {
        self.system_names.iter().map(String::as_str)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
