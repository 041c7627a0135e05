//! Durable image layout for the activity digest
//!
//! The digest must survive a low-power reset, so its counters and cursors
//! are mirrored into a [`DurableStore`](hal_abstractions::DurableStore).
//! All fields are little-endian:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "ACTD" (0x4454_4341)
//! 4       2     layout version (1)
//! 6       2     slot count
//! 8       2     active minute (0xFFFF = unset)
//! 10      2     last uploaded minute (0xFFFF = unset)
//! 12      4     reserved, zero
//! 16      2*N   per-minute counters
//! ```

pub const MAGIC: u32 = 0x4454_4341;
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 16;

/// Encoded value of an unset cursor
pub const UNSET: u16 = u16::MAX;

/// Counters moved per store transaction
pub(crate) const BLOCK_SLOTS: usize = 32;

/// Total bytes needed for a digest of `slots` minutes
pub const fn image_len(slots: usize) -> usize {
    HEADER_LEN + slots * 2
}

/// Why a stored image was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImageError {
    /// Never written, or overwritten by something else
    BadMagic,
    UnsupportedVersion,
    /// Written by a digest with a different slot count
    SlotMismatch,
    /// Cursors out of range or only one of them set
    BadCursors,
}

/// Decoded image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DigestHeader {
    pub slots: u16,
    pub active: Option<u16>,
    pub last_uploaded: Option<u16>,
}

impl DigestHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        out[4..6].copy_from_slice(&VERSION.to_le_bytes());
        out[6..8].copy_from_slice(&self.slots.to_le_bytes());
        out[8..10].copy_from_slice(&self.active.unwrap_or(UNSET).to_le_bytes());
        out[10..12].copy_from_slice(&self.last_uploaded.unwrap_or(UNSET).to_le_bytes());
        out
    }

    /// Decode and validate a header written for a digest of `slots` minutes
    pub fn decode(bytes: &[u8; HEADER_LEN], slots: u16) -> Result<Self, ImageError> {
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

        if magic != MAGIC {
            return Err(ImageError::BadMagic);
        }
        if u16_at(4) != VERSION {
            return Err(ImageError::UnsupportedVersion);
        }
        if u16_at(6) != slots {
            return Err(ImageError::SlotMismatch);
        }

        let cursor = |raw: u16| (raw != UNSET).then_some(raw);
        let active = cursor(u16_at(8));
        let last_uploaded = cursor(u16_at(10));

        match (active, last_uploaded) {
            (None, None) => {}
            (Some(a), Some(l)) if a < slots && l < slots => {}
            _ => return Err(ImageError::BadCursors),
        }

        Ok(Self {
            slots,
            active,
            last_uploaded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = DigestHeader {
            slots: 1440,
            active: Some(61),
            last_uploaded: Some(60),
        };
        let bytes = header.encode();
        assert_eq!(&bytes[0..4], b"ACTD");
        assert_eq!(&bytes[6..8], &1440u16.to_le_bytes());
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
        assert_eq!(DigestHeader::decode(&bytes, 1440), Ok(header));
    }

    #[test]
    fn test_unset_cursors() {
        let header = DigestHeader {
            slots: 1440,
            active: None,
            last_uploaded: None,
        };
        let bytes = header.encode();
        assert_eq!(&bytes[8..12], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(DigestHeader::decode(&bytes, 1440), Ok(header));
    }

    #[test]
    fn test_rejects_foreign_images() {
        assert_eq!(
            DigestHeader::decode(&[0u8; HEADER_LEN], 1440),
            Err(ImageError::BadMagic)
        );

        let header = DigestHeader {
            slots: 60,
            active: Some(1),
            last_uploaded: Some(0),
        };
        let mut bytes = header.encode();
        assert_eq!(DigestHeader::decode(&bytes, 1440), Err(ImageError::SlotMismatch));

        bytes[4] = 9;
        assert_eq!(DigestHeader::decode(&bytes, 60), Err(ImageError::UnsupportedVersion));

        let half_set = DigestHeader {
            slots: 60,
            active: Some(1),
            last_uploaded: None,
        };
        assert_eq!(
            DigestHeader::decode(&half_set.encode(), 60),
            Err(ImageError::BadCursors)
        );

        let out_of_range = DigestHeader {
            slots: 60,
            active: Some(60),
            last_uploaded: Some(0),
        };
        assert_eq!(
            DigestHeader::decode(&out_of_range.encode(), 60),
            Err(ImageError::BadCursors)
        );
    }
}
