use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use rand::Rng;

use crate::torrent::peer::PeerId;

pub fn generate_peer_id() -> PeerId {
    let mut rng = rand::thread_rng();
    let mut id = [0u8; 20];
    rng.fill(&mut id);
    id
}

/// Percent-encodes raw bytes for a query string. Only ASCII alphanumerics pass through.
pub fn url_encode_bytes(bytes: &[u8]) -> String {
    percent_encode(bytes, NON_ALPHANUMERIC).to_string()
}
