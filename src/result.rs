use crate::entity_map::EntityMap;
use gtfs_structures::{EntityError, EntityKind};
use log::info;
use rustc_hash::FxHashMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// What happened to the records of one kind
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub read: usize,
    pub written: usize,
    pub skipped_by_mark: usize,
    pub rejected_by_filter: usize,
    pub rejected_by_reference: usize,
    pub rejected_by_validation: usize,
    /// Rows that could not be read as a record
    pub load_errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueClass {
    FilterRejection,
    ReferenceError,
    ValidationError,
    ValidationWarning,
    LoadError,
}

/// A problem found on a record, or on a group of stop times
#[derive(Debug, Clone, Serialize)]
pub struct EntityIssue {
    #[serde(serialize_with = "serialize_kind")]
    pub kind: EntityKind,
    /// Key of the record in the source feed
    pub entity_key: String,
    pub class: IssueClass,
    #[serde(serialize_with = "serialize_display")]
    pub cause: EntityError,
}

/// Outcome of a copy
#[derive(Debug, Serialize)]
pub struct CopyResult {
    #[serde(serialize_with = "serialize_kinds")]
    pub kinds: BTreeMap<EntityKind, KindSummary>,
    pub errors: Vec<EntityIssue>,
    pub warnings: Vec<EntityIssue>,
    /// Identifiers given by the writer, by kind and source key
    #[serde(skip)]
    pub entity_map: EntityMap,
    #[serde(skip)]
    error_limit: usize,
    #[serde(skip)]
    kept: FxHashMap<(EntityKind, bool), usize>,
}

fn serialize_kind<S: Serializer>(kind: &EntityKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.filename())
}

fn serialize_display<S: Serializer>(cause: &EntityError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(cause)
}

fn serialize_kinds<S: Serializer>(
    kinds: &BTreeMap<EntityKind, KindSummary>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(kinds.iter().map(|(k, v)| (k.filename(), v)))
}

impl CopyResult {
    /// At most `error_limit` errors and `error_limit` warnings are kept per kind
    pub fn new(error_limit: usize) -> Self {
        Self {
            kinds: BTreeMap::new(),
            errors: vec![],
            warnings: vec![],
            entity_map: EntityMap::default(),
            error_limit,
            kept: FxHashMap::default(),
        }
    }

    pub fn summary(&self, kind: EntityKind) -> KindSummary {
        self.kinds.get(&kind).cloned().unwrap_or_default()
    }

    pub(crate) fn counts(&mut self, kind: EntityKind) -> &mut KindSummary {
        self.kinds.entry(kind).or_default()
    }

    pub(crate) fn add_error(
        &mut self,
        kind: EntityKind,
        entity_key: &str,
        class: IssueClass,
        cause: EntityError,
    ) {
        if self.keep(kind, false) {
            self.errors.push(EntityIssue::new(kind, entity_key, class, cause));
        }
    }

    /// Warnings are counted even once the limit is reached
    pub(crate) fn add_warning(
        &mut self,
        kind: EntityKind,
        entity_key: &str,
        class: IssueClass,
        cause: EntityError,
    ) {
        self.counts(kind).warnings += 1;
        if self.keep(kind, true) {
            self.warnings
                .push(EntityIssue::new(kind, entity_key, class, cause));
        }
    }

    fn keep(&mut self, kind: EntityKind, warning: bool) -> bool {
        let kept = self.kept.entry((kind, warning)).or_default();
        if *kept < self.error_limit {
            *kept += 1;
            true
        } else {
            false
        }
    }

    pub fn errors_of(&self, kind: EntityKind) -> impl Iterator<Item = &EntityIssue> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    pub fn warnings_of(&self, kind: EntityKind) -> impl Iterator<Item = &EntityIssue> {
        self.warnings.iter().filter(move |e| e.kind == kind)
    }

    pub fn written(&self, kind: EntityKind) -> usize {
        self.summary(kind).written
    }

    /// Logs the counts of every kind, then the kept errors and warnings
    pub fn display_summary(&self) {
        info!("Copy result:");
        for (kind, summary) in &self.kinds {
            info!(
                "\t{}: read {} written {} skipped {} rejected {} (filter {}, reference {}, validation {}) load errors {} warnings {}",
                kind,
                summary.read,
                summary.written,
                summary.skipped_by_mark,
                summary.rejected_by_filter
                    + summary.rejected_by_reference
                    + summary.rejected_by_validation,
                summary.rejected_by_filter,
                summary.rejected_by_reference,
                summary.rejected_by_validation,
                summary.load_errors,
                summary.warnings,
            );
        }
        if !self.errors.is_empty() {
            info!("Errors:");
            for issue in &self.errors {
                info!("\t{}", issue);
            }
        }
        if !self.warnings.is_empty() {
            info!("Warnings:");
            for issue in &self.warnings {
                info!("\t{}", issue);
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl EntityIssue {
    fn new(kind: EntityKind, entity_key: &str, class: IssueClass, cause: EntityError) -> Self {
        Self {
            kind,
            entity_key: entity_key.to_owned(),
            class,
            cause,
        }
    }
}

impl std::fmt::Display for EntityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' ({:?}): {}",
            self.kind, self.entity_key, self.class, self.cause
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_are_capped_but_counted() {
        let mut result = CopyResult::new(2);
        for i in 0..5 {
            result.counts(EntityKind::Trip).rejected_by_reference += 1;
            result.add_error(
                EntityKind::Trip,
                &format!("t{}", i),
                IssueClass::ReferenceError,
                EntityError::InvalidReference {
                    field: "route_id",
                    value: "r".into(),
                },
            );
            result.add_warning(
                EntityKind::Stop,
                &format!("s{}", i),
                IssueClass::ValidationWarning,
                EntityError::RequiredFieldMissing("stop_name"),
            );
        }
        result.add_error(
            EntityKind::Route,
            "r",
            IssueClass::ValidationError,
            EntityError::RequiredFieldMissing("route_id"),
        );

        assert_eq!(2, result.errors_of(EntityKind::Trip).count());
        assert_eq!(1, result.errors_of(EntityKind::Route).count());
        assert_eq!(5, result.summary(EntityKind::Trip).rejected_by_reference);
        assert_eq!(2, result.warnings_of(EntityKind::Stop).count());
        assert_eq!(5, result.summary(EntityKind::Stop).warnings);
    }

    #[test]
    fn json_summary() {
        let mut result = CopyResult::new(10);
        result.counts(EntityKind::Agency).read = 1;
        result.counts(EntityKind::Agency).written = 1;
        result.add_warning(
            EntityKind::Extension("realtime_stops.txt"),
            "t1:s1",
            IssueClass::ValidationWarning,
            EntityError::RequiredFieldMissing("realtime_stop_id"),
        );
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(1, json["kinds"]["agency.txt"]["written"]);
        assert_eq!(1, json["kinds"]["realtime_stops.txt"]["warnings"]);
        assert_eq!("realtime_stops.txt", json["warnings"][0]["kind"]);
        assert_eq!("ValidationWarning", json["warnings"][0]["class"]);
    }
}
