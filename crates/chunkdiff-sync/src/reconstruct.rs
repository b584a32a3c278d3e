//! Rebuild a new file from an old file and a list of wire operations
//!
//! Payload operations are applied in list order and must tile the output
//! contiguously from offset 0. `REMOVE` carries no bytes and is skipped.
//! Any malformed operation aborts the whole reconstruction.

use bytes::Bytes;
use chunkdiff_core::encoding::decode_payload;
use chunkdiff_core::{ChunkdiffError, ChunkdiffResult};
use tracing::debug;

use crate::plan::SyncOperation;
use crate::wire::{WireOperation, OP_ADD, OP_MODIFY, OP_REMOVE, OP_UNCHANGED};

/// Decode and check wire operations against `old`.
///
/// An `UNCHANGED` operation without `data` copies `old[offset..offset+size]`.
pub fn decode_operations(old: &[u8], ops: &[WireOperation]) -> ChunkdiffResult<Vec<SyncOperation>> {
    let mut decoded = Vec::with_capacity(ops.len());

    for (index, op) in ops.iter().enumerate() {
        let (offset, size) = (op.offset, op.size);
        let decoded_op = match op.kind.as_str() {
            OP_REMOVE => SyncOperation::Remove { offset, size },
            OP_UNCHANGED => {
                let data = match &op.data {
                    Some(encoded) => payload(index, encoded, size)?,
                    None => copy_old(old, index, offset, size)?,
                };
                SyncOperation::Unchanged { offset, size, data }
            }
            OP_ADD => {
                let data = required_payload(index, op)?;
                SyncOperation::Add { offset, size, data }
            }
            OP_MODIFY => {
                let data = required_payload(index, op)?;
                SyncOperation::Modify { offset, size, data }
            }
            other => {
                return Err(ChunkdiffError::UnknownOperation {
                    index,
                    tag: other.to_string(),
                })
            }
        };
        decoded.push(decoded_op);
    }
    Ok(decoded)
}

/// Concatenate payloads of decoded operations into the new file.
pub fn apply_operations(ops: &[SyncOperation]) -> ChunkdiffResult<Vec<u8>> {
    let total: u64 = ops
        .iter()
        .filter(|op| op.payload().is_some())
        .map(SyncOperation::size)
        .sum();
    let mut out = Vec::with_capacity(total as usize);

    for (index, op) in ops.iter().enumerate() {
        let Some(data) = op.payload() else {
            continue;
        };
        if op.offset() != out.len() as u64 {
            return Err(ChunkdiffError::invariant(format!(
                "operation {index} ({}) starts at {} but output is {} bytes",
                op.tag(),
                op.offset(),
                out.len()
            )));
        }
        out.extend_from_slice(data);
    }
    Ok(out)
}

/// Reconstruct the new file from `old` and wire operations.
pub fn apply(old: &[u8], ops: &[WireOperation]) -> ChunkdiffResult<Vec<u8>> {
    let decoded = decode_operations(old, ops)?;
    let out = apply_operations(&decoded)?;
    debug!(operations = ops.len(), old_size = old.len(), new_size = out.len(), "applied plan");
    Ok(out)
}

fn required_payload(index: usize, op: &WireOperation) -> ChunkdiffResult<Bytes> {
    match &op.data {
        Some(encoded) => payload(index, encoded, op.size),
        None => Err(ChunkdiffError::malformed(
            index,
            format!("{} operation has no data", op.kind),
        )),
    }
}

fn payload(index: usize, encoded: &str, size: u64) -> ChunkdiffResult<Bytes> {
    let data = decode_payload(encoded)
        .map_err(|e| ChunkdiffError::malformed(index, format!("invalid base64: {e}")))?;
    if data.len() as u64 != size {
        return Err(ChunkdiffError::malformed(
            index,
            format!("payload is {} bytes, size says {size}", data.len()),
        ));
    }
    Ok(Bytes::from(data))
}

fn copy_old(old: &[u8], index: usize, offset: u64, size: u64) -> ChunkdiffResult<Bytes> {
    let end = offset.checked_add(size).filter(|&end| end <= old.len() as u64);
    match end {
        Some(end) => Ok(Bytes::copy_from_slice(&old[offset as usize..end as usize])),
        None => Err(ChunkdiffError::malformed(
            index,
            format!(
                "range [{offset}, +{size}) is outside the {}-byte old file",
                old.len()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkdiff_core::encoding::encode_payload;
    use chunkdiff_core::ErrorKind;

    fn op(kind: &str, offset: u64, data: Option<&[u8]>, size: u64) -> WireOperation {
        WireOperation {
            kind: kind.to_string(),
            offset,
            size,
            data: data.map(encode_payload),
        }
    }

    #[test]
    fn payloads_concatenate_in_order() {
        let ops = vec![
            op(OP_UNCHANGED, 0, Some(&b"abc"[..]), 3),
            op(OP_MODIFY, 3, Some(&b"XY"[..]), 2),
            op(OP_ADD, 5, Some(&b"z"[..]), 1),
            op(OP_REMOVE, 0, None, 10),
        ];
        assert_eq!(apply(b"whatever", &ops).unwrap(), b"abcXYz");
    }

    #[test]
    fn empty_operations_give_empty_output() {
        assert!(apply(b"old", &[]).unwrap().is_empty());
    }

    #[test]
    fn unchanged_without_data_copies_old_bytes() {
        let ops = vec![
            op(OP_UNCHANGED, 0, None, 5),
            op(OP_ADD, 5, Some(&b"!"[..]), 1),
        ];
        assert_eq!(apply(b"hello world", &ops).unwrap(), b"hello!");
    }

    #[test]
    fn unchanged_without_data_outside_old_is_malformed() {
        let ops = vec![op(OP_UNCHANGED, 8, None, 5)];
        let err = apply(b"hello world", &ops).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let ops = vec![op(OP_ADD, 0, Some(&b"a"[..]), 1), op("COPY", 1, None, 1)];
        let err = apply(b"", &ops).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownOperation);
        assert!(matches!(err, ChunkdiffError::UnknownOperation { index: 1, .. }));
    }

    #[test]
    fn add_without_data_is_malformed() {
        let err = apply(b"", &[op(OP_ADD, 0, None, 3)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn bad_base64_is_malformed() {
        let bad = WireOperation {
            kind: OP_MODIFY.into(),
            offset: 0,
            size: 3,
            data: Some("!!not base64!!".into()),
        };
        let err = apply(b"", &[bad]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn size_mismatch_is_malformed() {
        let err = apply(b"", &[op(OP_ADD, 0, Some(&b"abcd"[..]), 3)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn non_contiguous_offsets_are_rejected() {
        let ops = vec![op(OP_ADD, 0, Some(&b"ab"[..]), 2), op(OP_ADD, 3, Some(&b"c"[..]), 1)];
        let err = apply(b"", &ops).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn remove_only_plan_yields_empty_file() {
        let ops = vec![op(OP_REMOVE, 0, None, 5)];
        assert!(apply(b"hello", &ops).unwrap().is_empty());
    }
}
