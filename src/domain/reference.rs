//! Payment reference numbers sent to the gateway and echoed back in callbacks.
//!
//! New checkouts use a versioned reference `MH1-<booking id, simple>-<checksum>`.
//! Callbacks for older checkouts carry `PREFIX_<booking id>_<timestamp>` or some
//! other string with the booking id embedded, so parsing falls back through those.

use sha2::{Digest, Sha256};
use uuid::Uuid;

const VERSION_PREFIX: &str = "MH1";
const CHECKSUM_BYTES: usize = 4;
const HYPHENATED_UUID_LEN: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFormat {
    Structured,
    Legacy,
    Embedded,
}

/// Issues the reference for a new checkout of `booking_id`.
pub fn encode_reference(booking_id: Uuid) -> String {
    let id = booking_id.simple().to_string();
    format!("{}-{}-{}", VERSION_PREFIX, id, checksum(&id))
}

/// Every distinct booking id recovered from a gateway reference number, in the order
/// they should be tried: the versioned format, then `PREFIX_<id>_<timestamp>`, then
/// any hyphenated UUID inside it.
pub fn booking_id_candidates(reference: &str) -> Vec<(Uuid, ReferenceFormat)> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Vec::new();
    }

    let found = parse_structured(reference)
        .map(|id| (id, ReferenceFormat::Structured))
        .into_iter()
        .chain(parse_legacy(reference).map(|id| (id, ReferenceFormat::Legacy)))
        .chain(
            embedded_uuids(reference)
                .into_iter()
                .map(|id| (id, ReferenceFormat::Embedded)),
        );

    let mut candidates: Vec<(Uuid, ReferenceFormat)> = Vec::new();
    for (id, format) in found {
        if !candidates.iter().any(|(seen, _)| *seen == id) {
            candidates.push((id, format));
        }
    }
    candidates
}

fn checksum(simple_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(VERSION_PREFIX.as_bytes());
    hasher.update(b":");
    hasher.update(simple_id.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..CHECKSUM_BYTES])
}

fn parse_structured(reference: &str) -> Option<Uuid> {
    let mut parts = reference.split('-');
    let (version, id, sum) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || version != VERSION_PREFIX || id.len() != 32 {
        return None;
    }
    if !checksum(&id.to_ascii_lowercase()).eq_ignore_ascii_case(sum) {
        return None;
    }
    Uuid::try_parse(id).ok()
}

fn parse_legacy(reference: &str) -> Option<Uuid> {
    let parts: Vec<&str> = reference.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    Uuid::try_parse(parts[1]).ok()
}

fn embedded_uuids(reference: &str) -> Vec<Uuid> {
    if reference.len() < HYPHENATED_UUID_LEN {
        return Vec::new();
    }
    (0..=reference.len() - HYPHENATED_UUID_LEN)
        .filter(|&start| {
            reference.is_char_boundary(start)
                && reference.is_char_boundary(start + HYPHENATED_UUID_LEN)
        })
        .filter_map(|start| {
            let window = &reference[start..start + HYPHENATED_UUID_LEN];
            if window.as_bytes()[8] != b'-' {
                return None;
            }
            Uuid::try_parse(window).ok()
        })
        .collect()
}
