//! Row identity resolution.
//!
//! A row's identity is looked up in this order:
//!
//! 1. the id cached on the row by an earlier pass (`data-pin-id`)
//! 2. a native id attribute published by the host
//! 3. for a row seen for the first time, the id of a pinned entry whose subject
//!    and sender match exactly and that no other live row claims
//! 4. a synthesized `row-<fingerprint>-<position>-<created ms>` id
//!
//! The resolved id is written back to the row so later passes hit step 1.

use crate::clock::Clock;
use crate::error::HostError;
use crate::host::{self, HostDocument, NodeId};
use crate::store::{PinStore, PinnedItem};
use rowpin_config::FieldSelectors;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Attribute caching the resolved id on a row (and on its toggle control).
pub const PIN_ID_ATTR: &str = "data-pin-id";

/// Prefix of synthesized ids.
pub const SYNTHETIC_PREFIX: &str = "row-";

/// Number of row-text characters mixed into the fingerprint.
const FINGERPRINT_TEXT_CHARS: usize = 100;

/// Number of hex digits of the sha256 digest kept in a synthesized id.
const FINGERPRINT_HEX_LEN: usize = 12;

/// Salient text read from a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowContent {
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub timestamp: Option<String>,
    pub text: String,
}

impl RowContent {
    pub fn read<D: HostDocument + ?Sized>(doc: &D, row: NodeId, fields: &FieldSelectors) -> Self {
        Self {
            subject: host::field_text(doc, row, &fields.subject),
            sender: host::field_text(doc, row, &fields.sender),
            timestamp: host::field_text(doc, row, &fields.timestamp),
            text: doc.text_content(row),
        }
    }

    /// Exact subject and sender match against a pinned entry. Rows without
    /// either field never match.
    pub fn matches_item(&self, item: &PinnedItem) -> bool {
        match (&self.subject, &self.sender) {
            (Some(subject), Some(sender)) if !subject.is_empty() && !sender.is_empty() => {
                item.label.trim() == subject && item.sub_label.trim() == sender
            }
            _ => false,
        }
    }

    /// Hex sha256 prefix over the salient fields and the start of the row text.
    pub fn fingerprint(&self) -> String {
        let head: String = self.text.chars().take(FINGERPRINT_TEXT_CHARS).collect();
        let mut hasher = Sha256::new();
        hasher.update(self.subject.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(self.sender.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(self.timestamp.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(head.as_bytes());
        let mut hex = format!("{:x}", hasher.finalize());
        hex.truncate(FINGERPRINT_HEX_LEN);
        hex
    }
}

/// Maps rows to stable ids. See the module docs for the lookup order.
pub struct IdentityResolver {
    native_attributes: Vec<String>,
    fields: FieldSelectors,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("native_attributes", &self.native_attributes)
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    pub fn new(native_attributes: Vec<String>, fields: FieldSelectors, clock: Arc<dyn Clock>) -> Self {
        Self {
            native_attributes,
            fields,
            clock,
        }
    }

    pub fn fields(&self) -> &FieldSelectors {
        &self.fields
    }

    /// Cached or native id, without synthesizing anything.
    pub fn known_id<D: HostDocument + ?Sized>(&self, doc: &D, row: NodeId) -> Option<String> {
        if let Some(cached) = doc.attribute(row, PIN_ID_ATTR).filter(|v| !v.is_empty()) {
            return Some(cached.to_string());
        }
        self.native_attributes
            .iter()
            .find_map(|attr| doc.attribute(row, attr).filter(|v| !v.is_empty()))
            .map(str::to_string)
    }

    /// Build a fresh id from the row's content, position and the current time.
    pub fn synthesize<D: HostDocument + ?Sized>(&self, doc: &D, row: NodeId) -> String {
        let content = RowContent::read(doc, row, &self.fields);
        self.synthesize_from(&content, host::index_in_parent(doc, row))
    }

    fn synthesize_from(&self, content: &RowContent, position: Option<usize>) -> String {
        let position = position.map_or_else(|| "x".to_string(), |p| p.to_string());
        format!(
            "{}{}-{}-{}",
            SYNTHETIC_PREFIX,
            content.fingerprint(),
            position,
            self.clock.now().timestamp_millis()
        )
    }

    /// Resolve one row and tag it.
    ///
    /// `claimed` holds ids already held by other live rows; content adoption
    /// never picks one of those.
    pub fn resolve<D: HostDocument + ?Sized>(
        &self,
        doc: &mut D,
        row: NodeId,
        pins: &PinStore,
        claimed: &HashSet<String>,
    ) -> Result<String, HostError> {
        let id = match self.known_id(doc, row) {
            Some(id) => id,
            None => self.first_seen_id(doc, row, pins, claimed),
        };
        tag(doc, row, &id)?;
        Ok(id)
    }

    fn first_seen_id<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        row: NodeId,
        pins: &PinStore,
        claimed: &HashSet<String>,
    ) -> String {
        let content = RowContent::read(doc, row, &self.fields);
        if let Some(item) = pins
            .items()
            .iter()
            .find(|item| !claimed.contains(&item.id) && content.matches_item(item))
        {
            crate::debug_info!("IDENTITY", "Row {:?} adopted pinned id {} by content", row, item.id);
            return item.id.clone();
        }
        self.synthesize_from(&content, host::index_in_parent(doc, row))
    }

    /// Resolve every row of a scan, guaranteeing no two rows share an id.
    ///
    /// On collision the row whose content matches the pinned entry for that id
    /// keeps it, otherwise the first row in document order does. Losers get a
    /// freshly synthesized id. Rows that cannot be tagged are skipped.
    pub fn resolve_all<D: HostDocument + ?Sized>(
        &self,
        doc: &mut D,
        rows: &[NodeId],
        pins: &PinStore,
    ) -> Vec<(NodeId, String)> {
        let known: Vec<Option<String>> = rows.iter().map(|&r| self.known_id(doc, r)).collect();
        let mut claimed: HashSet<String> = known.iter().flatten().cloned().collect();

        let mut assigned: Vec<String> = Vec::with_capacity(rows.len());
        for (&row, known) in rows.iter().zip(known) {
            let id = match known {
                Some(id) => id,
                None => {
                    let id = self.first_seen_id(doc, row, pins, &claimed);
                    claimed.insert(id.clone());
                    id
                }
            };
            assigned.push(id);
        }

        self.break_ties(doc, rows, &mut assigned, pins);

        let mut resolved = Vec::with_capacity(rows.len());
        for (&row, id) in rows.iter().zip(assigned) {
            match tag(doc, row, &id) {
                Ok(()) => resolved.push((row, id)),
                Err(e) => log::debug!("Skipping row {:?}: {}", row, e),
            }
        }
        resolved
    }

    fn break_ties<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        rows: &[NodeId],
        assigned: &mut [String],
        pins: &PinStore,
    ) {
        let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, id) in assigned.iter().enumerate() {
            groups.entry(id.as_str()).or_default().push(i);
        }

        let mut losers: Vec<usize> = Vec::new();
        for (id, members) in groups.into_iter().filter(|(_, m)| m.len() > 1) {
            let winner = pins
                .get(id)
                .and_then(|item| {
                    members.iter().copied().find(|&i| {
                        RowContent::read(doc, rows[i], &self.fields).matches_item(item)
                    })
                })
                .unwrap_or(members[0]);
            crate::debug_log!(
                "IDENTITY",
                "Id {} shared by {} rows, row {:?} keeps it",
                id,
                members.len(),
                rows[winner]
            );
            losers.extend(members.into_iter().filter(|&i| i != winner));
        }
        losers.sort_unstable();

        let mut taken: HashSet<String> = assigned.iter().cloned().collect();
        for i in losers {
            let content = RowContent::read(doc, rows[i], &self.fields);
            let base = self.synthesize_from(&content, host::index_in_parent(doc, rows[i]));
            let mut fresh = base.clone();
            let mut n = 1;
            while taken.contains(&fresh) {
                fresh = format!("{}-{}", base, n);
                n += 1;
            }
            taken.insert(fresh.clone());
            assigned[i] = fresh;
        }
    }
}

fn tag<D: HostDocument + ?Sized>(doc: &mut D, row: NodeId, id: &str) -> Result<(), HostError> {
    if doc.attribute(row, PIN_ID_ATTR) == Some(id) {
        return Ok(());
    }
    doc.set_attribute(row, PIN_ID_ATTR, id)
}
