//! Network join candidates and the last-good credential slot.

use heapless::{String, Vec};
use log::warn;

use crate::error::QuoteError;
use crate::persist::{CREDENTIAL_SLOT, PersistentStore, RawStore};

pub const SSID_MAX_BYTES: usize = 32;
pub const SECRET_MAX_BYTES: usize = 64;
pub const MAX_CANDIDATES: usize = 8;
/// `ssid;secret` as stored in the credential slot.
pub const ENCODED_MAX_BYTES: usize = SSID_MAX_BYTES + 1 + SECRET_MAX_BYTES;

const SEPARATOR: char = ';';

/// One identifier/secret pair to attempt a join with.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Credential {
    pub ssid: String<SSID_MAX_BYTES>,
    pub secret: String<SECRET_MAX_BYTES>,
}

pub type CandidateList = Vec<Credential, MAX_CANDIDATES>;

impl Credential {
    pub fn new(ssid: &str, secret: &str) -> Option<Self> {
        let ssid = ssid.trim();
        if ssid.is_empty() {
            return None;
        }

        let mut credential = Self::default();
        credential.ssid.push_str(ssid).ok()?;
        credential.secret.push_str(secret.trim()).ok()?;
        Some(credential)
    }

    /// Parses `ssid;secret`. Only the first separator splits, so secrets may
    /// contain `;`. A line without a separator is an open network.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        match line.split_once(SEPARATOR) {
            Some((ssid, secret)) => Self::new(ssid, secret),
            None => Self::new(line, ""),
        }
    }

    pub fn encode(&self) -> String<ENCODED_MAX_BYTES> {
        let mut out = String::new();
        // Both halves fit by construction.
        let _ = out.push_str(&self.ssid);
        let _ = out.push(SEPARATOR);
        let _ = out.push_str(&self.secret);
        out
    }
}

/// Builds the ordered try list: the last-good credential first, then the
/// credential file in order, without duplicates.
pub fn candidate_list(last_good: Option<Credential>, text: Option<&str>) -> CandidateList {
    let mut candidates = CandidateList::new();

    if let Some(credential) = last_good {
        let _ = candidates.push(credential);
    }

    let lines = text.into_iter().flat_map(str::lines);
    for credential in lines.filter_map(Credential::parse_line) {
        if candidates.contains(&credential) {
            continue;
        }
        if candidates.push(credential).is_err() {
            warn!(
                "credentials: more than {} candidates; ignoring the rest",
                MAX_CANDIDATES
            );
            break;
        }
    }

    candidates
}

pub fn load_last_good<R: RawStore>(store: &PersistentStore<R>) -> Option<Credential> {
    let encoded = store.read_str::<ENCODED_MAX_BYTES>(CREDENTIAL_SLOT);
    Credential::parse_line(&encoded)
}

pub fn store_last_good<R: RawStore>(
    store: &mut PersistentStore<R>,
    credential: &Credential,
) -> Result<(), QuoteError> {
    store.write_str(CREDENTIAL_SLOT, &credential.encode())
}
