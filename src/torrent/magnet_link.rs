//! Magnet URI parsing.
//!
//! Only the fields needed to start a metadata exchange are kept: the info
//! hash from `xt=urn:btih:<hex>`, the display name (`dn`) and the first
//! tracker (`tr`).

use std::fmt;

use url::Url;

use crate::error::MagnetError;

use super::peer::InfoHash;

const BTIH_PREFIX: &str = "urn:btih:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub name: Option<String>,
    pub tracker: Option<String>,
}

fn parse_info_hash(hash: &str) -> Result<InfoHash, MagnetError> {
    let invalid = || MagnetError::InvalidInfoHash(hash.to_string());
    let bytes = hex::decode(hash).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

impl MagnetLink {
    pub fn parse(magnet_link: &str) -> Result<Self, MagnetError> {
        let url = Url::parse(magnet_link)?;
        if url.scheme() != "magnet" {
            return Err(MagnetError::NotMagnet(url.scheme().to_string()));
        }

        let mut info_hash = None;
        let mut name = None;
        let mut tracker = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" => {
                    if let Some(hash) = value.strip_prefix(BTIH_PREFIX) {
                        info_hash = Some(parse_info_hash(hash)?);
                    }
                }
                "dn" if name.is_none() => name = Some(value.into_owned()),
                "tr" if tracker.is_none() => tracker = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            info_hash: info_hash.ok_or(MagnetError::MissingInfoHash)?,
            name,
            tracker,
        })
    }
}

impl fmt::Display for MagnetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tracker) = &self.tracker {
            writeln!(f, "Tracker URL: {}", tracker)?;
        }
        if let Some(name) = &self.name {
            writeln!(f, "Name: {}", name)?;
        }
        write!(f, "Info Hash: {}", hex::encode(self.info_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINK: &str = "magnet:?xt=urn:btih:ad42ce8109f54c99613ce38f9b4d87e70f24a165&dn=magnet1.gif&tr=http%3A%2F%2Fbittorrent-test-tracker.codecrafters.io%2Fannounce";

    #[test]
    fn test_parse_magnet_link() {
        let magnet = MagnetLink::parse(LINK).unwrap();
        assert_eq!(
            hex::encode(magnet.info_hash),
            "ad42ce8109f54c99613ce38f9b4d87e70f24a165"
        );
        assert_eq!(magnet.name.as_deref(), Some("magnet1.gif"));
        assert_eq!(
            magnet.tracker.as_deref(),
            Some("http://bittorrent-test-tracker.codecrafters.io/announce")
        );
        assert_eq!(
            magnet.to_string(),
            "Tracker URL: http://bittorrent-test-tracker.codecrafters.io/announce\n\
             Name: magnet1.gif\n\
             Info Hash: ad42ce8109f54c99613ce38f9b4d87e70f24a165"
        );
    }

    #[test]
    fn test_optional_fields() {
        let magnet =
            MagnetLink::parse("magnet:?xt=urn:btih:AD42CE8109F54C99613CE38F9B4D87E70F24A165")
                .unwrap();
        assert_eq!(magnet.info_hash[0], 0xad);
        assert!(magnet.name.is_none());
        assert!(magnet.tracker.is_none());
    }

    #[test]
    fn test_rejects_bad_links() {
        assert!(matches!(
            MagnetLink::parse("http://example.com/?xt=urn:btih:00"),
            Err(MagnetError::NotMagnet(_))
        ));
        assert!(matches!(
            MagnetLink::parse("magnet:?dn=file"),
            Err(MagnetError::MissingInfoHash)
        ));
        assert!(matches!(
            MagnetLink::parse("magnet:?xt=urn:btih:abcd"),
            Err(MagnetError::InvalidInfoHash(_))
        ));
        assert!(matches!(
            MagnetLink::parse("not a uri"),
            Err(MagnetError::InvalidUri(_))
        ));
    }
}
