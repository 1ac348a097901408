use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, info};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use crate::roster::{CHARACTER_NAMES, MII_START_INDEX};

const RFL_MAGIC: &[u8; 4] = b"RNOD";
const RFL_RECORD_COUNT: usize = 100;
const RFL_RECORD_SIZE: usize = 0x4A;
const RFL_NAME_OFFSET: usize = 0x02;
const RFL_NAME_UNITS: usize = 10;
const RFL_ID_OFFSET: usize = 0x18;

/// Mii ids in this range belong to Miis created on the console's Mii
/// channel; anything else is a special or foreign Mii the game cannot field.
const PLAYABLE_IDS: std::ops::Range<u32> = 0x8000_0000..0x9000_0000;

#[derive(Debug, Error)]
pub enum MiiDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a Mii database (missing RNOD header)")]
    BadMagic,

    #[error("Mii database truncated: {len} bytes")]
    Truncated { len: usize },
}

/// Loaded custom identities, in database order. Character id
/// `MII_START_INDEX + i` refers to entry `i`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MiiRegistry {
    names: Vec<String>,
}

impl MiiRegistry {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn from_rfl_db(path: &Path) -> Result<Self, MiiDbError> {
        let data = fs::read(path)?;
        let registry = Self::parse_rfl_db(&data)?;
        info!(
            "loaded {} Miis from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Parse a Wii `RFL_DB.dat` image.
    pub fn parse_rfl_db(data: &[u8]) -> Result<Self, MiiDbError> {
        if data.len() < RFL_MAGIC.len() {
            return Err(MiiDbError::Truncated { len: data.len() });
        }
        if &data[..4] != RFL_MAGIC {
            return Err(MiiDbError::BadMagic);
        }

        let mut names = Vec::new();
        for i in 0..RFL_RECORD_COUNT {
            let start = RFL_MAGIC.len() + i * RFL_RECORD_SIZE;
            let Some(record) = data.get(start..start + RFL_RECORD_SIZE) else {
                if i == 0 {
                    return Err(MiiDbError::Truncated { len: data.len() });
                }
                break;
            };

            let mut rdr = Cursor::new(&record[RFL_ID_OFFSET..RFL_ID_OFFSET + 4]);
            let id = rdr.read_u32::<BigEndian>()?;
            if !PLAYABLE_IDS.contains(&id) {
                continue;
            }

            let mut rdr = Cursor::new(
                &record[RFL_NAME_OFFSET..RFL_NAME_OFFSET + RFL_NAME_UNITS * 2],
            );
            let mut units = Vec::with_capacity(RFL_NAME_UNITS);
            for _ in 0..RFL_NAME_UNITS {
                let u = rdr.read_u16::<BigEndian>()?;
                if u == 0 {
                    break;
                }
                units.push(u);
            }
            let name = String::from_utf16_lossy(&units);
            debug!("mii {}: {} (id 0x{:08X})", names.len(), name, id);
            names.push(name);
        }

        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Local index of the Mii called `name`, ignoring case.
    pub fn find(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.names.iter().position(|n| n.to_lowercase() == wanted)
    }

    /// Highest character id a lineup may use with this registry loaded.
    pub fn last_valid_id(&self) -> u16 {
        MII_START_INDEX - 1 + self.names.len() as u16
    }

    pub fn character_name(&self, id: u16) -> Option<&str> {
        match id.checked_sub(MII_START_INDEX) {
            None => CHARACTER_NAMES.get(usize::from(id)).copied(),
            Some(idx) => self.names.get(usize::from(idx)).map(String::as_str),
        }
    }
}

#[cfg(test)]
pub(crate) fn rfl_image(entries: &[(&str, u32)]) -> Vec<u8> {
    let mut data = RFL_MAGIC.to_vec();
    data.resize(RFL_MAGIC.len() + RFL_RECORD_COUNT * RFL_RECORD_SIZE, 0);
    for (i, (name, id)) in entries.iter().enumerate() {
        let start = RFL_MAGIC.len() + i * RFL_RECORD_SIZE;
        for (j, unit) in name.encode_utf16().take(RFL_NAME_UNITS).enumerate() {
            let at = start + RFL_NAME_OFFSET + j * 2;
            data[at..at + 2].copy_from_slice(&unit.to_be_bytes());
        }
        let at = start + RFL_ID_OFFSET;
        data[at..at + 4].copy_from_slice(&id.to_be_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_playable_miis() {
        let data = rfl_image(&[
            ("Stg", 0x8123_4567),
            ("Guest", 0x0000_0001),
            ("Kircher", 0x8FFF_FFFF),
            ("Foreign", 0x9000_0000),
        ]);
        let reg = MiiRegistry::parse_rfl_db(&data).unwrap();
        assert_eq!(reg.names(), &["Stg".to_string(), "Kircher".to_string()]);
        assert_eq!(reg.last_valid_id(), 78);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut data = rfl_image(&[]);
        data[0] = b'X';
        assert!(matches!(
            MiiRegistry::parse_rfl_db(&data),
            Err(MiiDbError::BadMagic)
        ));
    }

    #[test]
    fn lookups() {
        let reg = MiiRegistry::new(vec!["Whodeyy".into(), "Stg".into()]);
        assert_eq!(reg.find("stg"), Some(1));
        assert_eq!(reg.find("nobody"), None);
        assert_eq!(reg.character_name(9), Some("Bowser"));
        assert_eq!(reg.character_name(77), Some("Whodeyy"));
        assert_eq!(reg.character_name(79), None);
    }
}
