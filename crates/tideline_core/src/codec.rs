//! Encoding of persisted documents.
//!
//! Every blob Tideline writes is a CBOR envelope `{format, body}`. A
//! document written by an incompatible build is rejected instead of being
//! misread.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tideline_storage::{StorageBackend, StorageError};

/// Format version of persisted documents.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    format: u16,
    body: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    format: u16,
    body: T,
}

/// Encodes a document.
///
/// # Errors
///
/// Returns `CoreError::Codec` if the document cannot be serialized.
pub fn encode_document<T: Serialize>(body: &T) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let envelope = EnvelopeRef {
        format: FORMAT_VERSION,
        body,
    };
    ciborium::into_writer(&envelope, &mut bytes).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a document.
///
/// # Errors
///
/// Returns `CoreError::UnsupportedFormat` for another format version and
/// `CoreError::Codec` for undecodable bytes.
pub fn decode_document<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    #[derive(Deserialize)]
    struct Header {
        format: u16,
    }

    let header: Header =
        ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))?;
    if header.format != FORMAT_VERSION {
        return Err(CoreError::UnsupportedFormat {
            found: header.format,
            expected: FORMAT_VERSION,
        });
    }

    let envelope: Envelope<T> =
        ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))?;
    debug_assert_eq!(envelope.format, FORMAT_VERSION);
    Ok(envelope.body)
}

/// Loads a document, or its default if the namespace is empty.
pub(crate) fn load_document<D>(storage: &dyn StorageBackend, namespace: &str) -> CoreResult<D>
where
    D: DeserializeOwned + Default,
{
    match storage.read(namespace)? {
        Some(bytes) => decode_document(&bytes),
        None => Ok(D::default()),
    }
}

/// Applies `f` to a document as one atomic read-modify-write.
///
/// Nothing is written if `f` fails; its error is returned unchanged.
pub(crate) fn update_document<D, T>(
    storage: &dyn StorageBackend,
    namespace: &str,
    mut f: impl FnMut(&mut D) -> CoreResult<T>,
) -> CoreResult<T>
where
    D: Serialize + DeserializeOwned + Default,
{
    let mut output = None;
    let mut failure = None;

    let result = storage.update(namespace, &mut |current| {
        match apply(current, &mut f) {
            Ok((bytes, value)) => {
                output = Some(value);
                Ok(bytes)
            }
            Err(e) => {
                let message = e.to_string();
                failure = Some(e);
                Err(StorageError::corrupted(message))
            }
        }
    });

    if let Some(e) = failure {
        return Err(e);
    }
    result?;
    output.ok_or_else(|| CoreError::codec("document update produced no value"))
}

fn apply<D, T>(
    current: Option<Vec<u8>>,
    f: &mut impl FnMut(&mut D) -> CoreResult<T>,
) -> CoreResult<(Vec<u8>, T)>
where
    D: Serialize + DeserializeOwned + Default,
{
    let mut document = match current {
        Some(bytes) => decode_document(&bytes)?,
        None => D::default(),
    };
    let value = f(&mut document)?;
    Ok((encode_document(&document)?, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_storage::InMemoryBackend;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: u32,
    }

    #[test]
    fn document_round_trip() {
        let bytes = encode_document(&Counter { n: 7 }).unwrap();
        assert_eq!(decode_document::<Counter>(&bytes).unwrap(), Counter { n: 7 });
    }

    #[test]
    fn other_format_rejected() {
        let mut bytes = Vec::new();
        ciborium::into_writer(
            &EnvelopeRef {
                format: 99,
                body: &Counter { n: 1 },
            },
            &mut bytes,
        )
        .unwrap();

        let result = decode_document::<Counter>(&bytes);
        assert!(matches!(
            result,
            Err(CoreError::UnsupportedFormat { found: 99, .. })
        ));
    }

    #[test]
    fn garbage_rejected() {
        let result = decode_document::<Counter>(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CoreError::Codec { .. })));
    }

    #[test]
    fn update_creates_and_modifies() {
        let storage = InMemoryBackend::new();

        let n = update_document(&storage, "c", |doc: &mut Counter| {
            doc.n += 1;
            Ok(doc.n)
        })
        .unwrap();
        assert_eq!(n, 1);

        let n = update_document(&storage, "c", |doc: &mut Counter| {
            doc.n += 1;
            Ok(doc.n)
        })
        .unwrap();
        assert_eq!(n, 2);

        let loaded: Counter = load_document(&storage, "c").unwrap();
        assert_eq!(loaded.n, 2);
    }

    #[test]
    fn failing_update_writes_nothing() {
        let storage = InMemoryBackend::new();
        update_document(&storage, "c", |doc: &mut Counter| {
            doc.n = 5;
            Ok(())
        })
        .unwrap();

        let result = update_document(&storage, "c", |doc: &mut Counter| {
            doc.n = 100;
            Err::<(), _>(CoreError::invalid_mutation("rejected"))
        });
        assert!(matches!(result, Err(CoreError::InvalidMutation { .. })));

        let loaded: Counter = load_document(&storage, "c").unwrap();
        assert_eq!(loaded.n, 5);
    }

    #[test]
    fn missing_document_loads_default() {
        let storage = InMemoryBackend::new();
        let loaded: Counter = load_document(&storage, "absent").unwrap();
        assert_eq!(loaded, Counter::default());
    }
}
