//! Ordered name/value records stored in shared blocks.
//!
//! Session, policy and notification documents are parsed elsewhere into
//! ordered name/value pairs. They are kept in a block allocated with
//! [`Segment::alloc_seed`] so that any attached process can find them with a
//! scan and decode them from the offset alone.
//!
//! The payload is a `RecordSet` flatbuffer (see `crates/schema/records.fbs`),
//! verified before any field is read.

use crate::errors::{Result, SegmentError};
use crate::header::{Anchor, Seed, TypeTag};
use crate::offset::Offset;
use crate::segment::Segment;
use flatbuffers::FlatBufferBuilder;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

pub const TYPE_SESSION: TypeTag = 1;
pub const TYPE_POLICY: TypeTag = 2;
pub const TYPE_NOTIFICATION: TypeTag = 3;

/// Smallest buffer that can hold a flatbuffer root offset and vtable.
const MIN_PAYLOAD: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

pub fn encode(records: &[NameValue]) -> Vec<u8> {
    let mut builder = FlatBufferBuilder::new();

    let entries: Vec<_> = records
        .iter()
        .map(|record| {
            let name = builder.create_string(&record.name);
            let value = builder.create_string(&record.value);
            schema::NameValue::create(
                &mut builder,
                &schema::NameValueArgs {
                    name: Some(name),
                    value: Some(value),
                },
            )
        })
        .collect();
    let entries = builder.create_vector(&entries);

    let root = schema::RecordSet::create(
        &mut builder,
        &schema::RecordSetArgs {
            records: Some(entries),
        },
    );
    schema::finish_record_set_buffer(&mut builder, root);
    builder.finished_data().to_vec()
}

pub fn decode(bytes: &[u8]) -> Result<Vec<NameValue>> {
    if bytes.len() < MIN_PAYLOAD {
        return Err(malformed(format!("{} bytes is too small", bytes.len())));
    }
    let set = schema::root_as_record_set(bytes).map_err(|e| malformed(e.to_string()))?;

    let Some(entries) = set.records() else {
        return Ok(Vec::new());
    };
    Ok(entries
        .iter()
        .map(|entry| NameValue {
            name: entry.name().unwrap_or_default().to_string(),
            value: entry.value().unwrap_or_default().to_string(),
        })
        .collect())
}

fn malformed(detail: String) -> SegmentError {
    SegmentError::Corruption(format!("malformed record payload: {detail}"))
}

impl Segment {
    /// Copy `records` into a new block anchored to `seed`.
    pub fn store_records(
        &self,
        pid: Pid,
        seed: Seed,
        type_tag: TypeTag,
        records: &[NameValue],
    ) -> Result<Offset> {
        let payload = encode(records);
        let offset = self.allocate(pid, seed, type_tag, payload.len(), Anchor::Seed)?;
        if let Err(e) = self.write_payload(offset, &payload) {
            if let Err(rollback) = self.free_offset(pid, offset) {
                tracing::warn!(
                    offset = offset.get(),
                    error = %rollback,
                    "Could not release block after failed record copy; it stays allocated"
                );
            }
            return Err(e);
        }
        Ok(offset)
    }

    pub fn load_records(&self, offset: Offset) -> Result<Vec<NameValue>> {
        decode(self.payload(offset)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::tests::{small_layout, test_config};

    fn session() -> Vec<NameValue> {
        vec![
            NameValue::new("sid", "AQIC5wM2LY"),
            NameValue::new("maxidle", "30"),
            NameValue::new("state", "valid"),
            NameValue::new("ResourceName", ""),
        ]
    }

    #[test]
    fn test_encoding_is_a_verifiable_record_set() {
        let bytes = encode(&[NameValue::new("a", "bc")]);
        let set = schema::root_as_record_set(&bytes).unwrap();
        let entries = set.records().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get(0).name(), Some("a"));
        assert_eq!(entries.get(0).value(), Some("bc"));
    }

    #[test]
    fn test_decode_preserves_order() {
        let bytes = encode(&session());
        assert_eq!(decode(&bytes).unwrap(), session());
    }

    #[test]
    fn test_empty_record_set() {
        let bytes = encode(&[]);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_damaged_payloads() {
        let bytes = encode(&session());
        for cut in [0, 3, 7, bytes.len() / 2] {
            assert!(
                matches!(decode(&bytes[..cut]), Err(SegmentError::Corruption(_))),
                "cut at {cut} must be rejected"
            );
        }
        assert!(
            matches!(decode(&[0xff; 16]), Err(SegmentError::Corruption(_))),
            "root offset outside the buffer"
        );
    }

    #[test]
    fn test_store_and_load_through_segment() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let seed = segment.connect().unwrap();

        let offset = segment
            .store_records(Pid::this(), seed, TYPE_SESSION, &session())
            .unwrap();
        assert_eq!(segment.load_records(offset).unwrap(), session());
        assert_eq!(segment.payload(offset).unwrap(), encode(&session()).as_slice());

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_oversized_record_set_is_not_stored() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let seed = segment.connect().unwrap();

        let big = vec![NameValue::new("policy", "x".repeat(300))];
        assert!(matches!(
            segment.store_records(Pid::this(), seed, TYPE_POLICY, &big),
            Err(SegmentError::NoFittingCluster { .. })
        ));
        assert_eq!(segment.stats().unwrap().free_blocks(), 6);

        segment.destroy(true).unwrap();
    }
}
