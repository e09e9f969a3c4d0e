//! Attribute-level merging of two independently evolved versions of the same
//! entity. Each attribute declares a [`MergeStrategy`]; the engine asks every
//! strategy to pick a side and applies the decisions all-or-nothing.
//!
//! Ties always resolve to keeping the local (incumbent) record, which is what
//! makes repeated exchanges between nodes converge.

use std::cmp::Ordering;

use crate::error::{DResult, Error};
use crate::model::Model;
use crate::serial::{Record, Value};
use crate::time::NanoTime;
use crate::version::Version;

/// A rule deciding how the two sides of one attribute merge together.
///
/// Strategies may keep state inside the attribute's record (a timestamp,
/// a counter); such strategies return true from `requires_state` and stamp
/// their fields in the `on_stage` hook whenever the attribute is written.
pub trait MergeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// True when the strategy stores its own fields in attribute records.
    fn requires_state(&self) -> bool {
        false
    }

    /// Invoked after an attribute write is staged on a model. `is_default`
    /// marks writes that merely install a declared default.
    fn on_stage(&self, _record: &mut Record, _is_default: bool) {}

    /// Decides the fate of attribute `name` given both versions. Returning
    /// `None` keeps the local record unchanged; returning a record adopts it.
    fn merge(&self, name: &str, local: &Version, remote: &Version) -> DResult<Option<Record>>;
}

/// The most recently committed *object* wins: adopt the remote record iff the
/// remote version's committed timestamp is newer. Stores no state.
pub struct LatestObjectStrategy;

impl MergeStrategy for LatestObjectStrategy {
    fn name(&self) -> &'static str {
        "latest-object"
    }

    fn merge(&self, name: &str, local: &Version, remote: &Version) -> DResult<Option<Record>> {
        if remote.committed() > local.committed() {
            return Ok(remote.attributes().get(name).cloned());
        }
        Ok(None)
    }
}

/// The most recently written *attribute* wins. Records carry an `updated`
/// nanotime, stamped at write time; a record with a timestamp is preferred
/// over one without.
pub struct LatestAttributeStrategy;

impl MergeStrategy for LatestAttributeStrategy {
    fn name(&self) -> &'static str {
        "latest-attribute"
    }

    fn requires_state(&self) -> bool {
        true
    }

    fn on_stage(&self, record: &mut Record, is_default: bool) {
        if !is_default {
            record.insert("updated".to_string(), Value::Int(NanoTime::now().nanoseconds()));
        }
    }

    fn merge(&self, name: &str, local: &Version, remote: &Version) -> DResult<Option<Record>> {
        let remote_record = match remote.attributes().get(name) {
            Some(record) => record,
            None => return Ok(None),
        };
        // no timestamp on the remote side: keep local
        let remote_updated = match remote_record.get("updated") {
            Some(updated) => updated,
            None => return Ok(None),
        };
        // the other side has a timestamp; if we don't, take theirs
        let local_updated = match local.attributes().get(name).and_then(|r| r.get("updated")) {
            Some(updated) => updated,
            None => return Ok(Some(remote_record.clone())),
        };
        if remote_updated.partial_cmp(local_updated) == Some(Ordering::Greater) {
            return Ok(Some(remote_record.clone()));
        }
        Ok(None)
    }
}

/// The larger value wins, under the attribute type's natural ordering.
/// Stores no state.
pub struct MaxStrategy;

impl MergeStrategy for MaxStrategy {
    fn name(&self) -> &'static str {
        "max"
    }

    fn merge(&self, name: &str, local: &Version, remote: &Version) -> DResult<Option<Record>> {
        let remote_record = match remote.attributes().get(name) {
            Some(record) => record,
            None => return Ok(None),
        };
        let remote_value = match remote_record.get("value") {
            Some(value) => value,
            None => return Ok(None),
        };
        let local_value = match local.attributes().get(name).and_then(|r| r.get("value")) {
            Some(value) => value,
            None => return Ok(Some(remote_record.clone())),
        };
        if remote_value.partial_cmp(local_value) == Some(Ordering::Greater) {
            return Ok(Some(remote_record.clone()));
        }
        Ok(None)
    }
}

/// Merges `remote` into `instance` and commits the result.
///
/// The instance must be clean and describe the same entity as the remote
/// version. Decisions are collected for every declared attribute before any
/// of them is applied, so a strategy failing partway leaves the instance
/// untouched. The merge commit's parent is the local pre-merge hash; the
/// remote chain is not re-linked.
pub fn merge(instance: &mut Model, remote: &Version) -> DResult<()> {
    if instance.is_dirty() {
        return Err(Error::Merge("cannot merge an instance with uncommitted changes".to_string()));
    }
    if instance.key() != remote.key() {
        return Err(Error::Merge(format!(
            "cannot merge {} into {}",
            remote.key(),
            instance.key()
        )));
    }
    if instance.type_name() != remote.type_name() {
        return Err(Error::Merge(format!(
            "cannot merge a {} into a {}",
            remote.type_name(),
            instance.type_name()
        )));
    }

    let local = instance.version().clone();
    let mut pending: Vec<(String, Record)> = Vec::new();
    for attribute in instance.schema().attributes().values() {
        let decision = attribute.merge_strategy().merge(attribute.name(), &local, remote)?;
        if let Some(mut record) = decision {
            let value = record.remove("value").ok_or_else(|| {
                Error::Merge(format!(
                    "strategy {} produced a record without a value for {}",
                    attribute.merge_strategy().name(),
                    attribute.name()
                ))
            })?;
            record.insert("value".to_string(), attribute.validate(value)?);
            pending.push((attribute.name().to_string(), record));
        }
    }

    // merging checks out, actually make the changes
    log::debug!(
        "merging {} attribute(s) of {} from remote {}",
        pending.len(),
        instance.key(),
        remote.short_hash(8)
    );
    for (name, record) in pending {
        instance.apply_record(&name, record);
    }
    instance.commit()
}
