//! Conversions between domain types and generated proto messages

use crate::error::VaultResult;
use crate::proto;
use crate::types::{NewRecord, Record, RecordId, RecordInfo, RecordType};

impl From<RecordInfo> for proto::RecordInfo {
    fn from(info: RecordInfo) -> Self {
        proto::RecordInfo {
            id: info.id.as_str().to_string(),
            record_type: info.record_type.tag(),
            metadata: info.metadata,
        }
    }
}

impl From<Record> for proto::Record {
    fn from(record: Record) -> Self {
        proto::Record {
            id: record.id.as_str().to_string(),
            record_type: record.record_type.tag(),
            metadata: record.metadata,
            ciphertext: record.payload,
        }
    }
}

impl From<NewRecord> for proto::NewRecord {
    fn from(record: NewRecord) -> Self {
        proto::NewRecord {
            record_type: record.record_type.tag(),
            metadata: record.metadata,
            ciphertext: record.payload,
        }
    }
}

impl From<RecordId> for proto::RecordRef {
    fn from(id: RecordId) -> Self {
        proto::RecordRef {
            id: id.as_str().to_string(),
        }
    }
}

// Inbound direction is fallible: the type tag comes from the peer.

pub fn record_info_from_proto(info: proto::RecordInfo) -> VaultResult<RecordInfo> {
    Ok(RecordInfo {
        id: RecordId::new(info.id),
        record_type: RecordType::from_tag(info.record_type)?,
        metadata: info.metadata,
    })
}

pub fn record_from_proto(record: proto::Record) -> VaultResult<Record> {
    Ok(Record {
        id: RecordId::new(record.id),
        record_type: RecordType::from_tag(record.record_type)?,
        metadata: record.metadata,
        payload: record.ciphertext,
    })
}

pub fn new_record_from_proto(record: proto::NewRecord) -> VaultResult<NewRecord> {
    Ok(NewRecord {
        record_type: RecordType::from_tag(record.record_type)?,
        metadata: record.metadata,
        payload: record.ciphertext,
    })
}
