//! Catalog accounts: the root singleton and its pages.
//!
//! The root tracks page bookkeeping and the global cartridge count; pages
//! are fixed-capacity append-only arrays of entries pointing at finalized
//! manifests. Entries are never removed, only flagged.

use bytes::{BufMut, Bytes, BytesMut};

use cart_core::{Address, ContentId, Decode, Encode};

use crate::{account_discriminator, LayoutError};

/// Entry flag bit: the cartridge is retired and hidden from default listings.
pub const FLAG_RETIRED: u8 = 0x01;

/// Catalog root singleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRoot {
    /// Schema version, currently 1
    pub version: u8,
    /// Public key authorized to add pages and rotate itself
    pub admin: Address,
    /// Monotonic count of finalized cartridges
    pub total_cartridges: u64,
    /// Number of existing pages
    pub page_count: u32,
    /// Index of the currently appendable page
    pub latest_page_index: u32,
    /// Derivation bump for this address
    pub bump: u8,
}

impl CatalogRoot {
    /// Record name used for the discriminator.
    pub const RECORD: &'static str = "CatalogRoot";

    /// Account length: discriminator + fields.
    pub const LEN: usize = 8 + 1 + 32 + 8 + 4 + 4 + 1;

    /// Current schema version.
    pub const VERSION: u8 = 1;

    /// Returns the discriminator constant for this record.
    pub fn discriminator() -> [u8; 8] {
        account_discriminator(Self::RECORD)
    }

    /// Creates the initial root for a fresh deployment.
    pub fn initial(admin: Address, bump: u8) -> Self {
        Self {
            version: Self::VERSION,
            admin,
            total_cartridges: 0,
            page_count: 0,
            latest_page_index: 0,
            bump,
        }
    }

    /// Encodes to account bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::LEN);
        Self::discriminator().encode(&mut buf);
        self.version.encode(&mut buf);
        self.admin.encode(&mut buf);
        self.total_cartridges.encode(&mut buf);
        self.page_count.encode(&mut buf);
        self.latest_page_index.encode(&mut buf);
        self.bump.encode(&mut buf);
        buf.to_vec()
    }

    /// Decodes from account bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() < Self::LEN {
            return Err(LayoutError::TooShort {
                record: Self::RECORD,
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let mut buf = Bytes::copy_from_slice(bytes);
        let discriminator = <[u8; 8]>::decode(&mut buf)?;
        if discriminator != Self::discriminator() {
            return Err(LayoutError::Discriminator {
                expected: Self::RECORD,
            });
        }
        Ok(Self {
            version: u8::decode(&mut buf)?,
            admin: Address::decode(&mut buf)?,
            total_cartridges: u64::decode(&mut buf)?,
            page_count: u32::decode(&mut buf)?,
            latest_page_index: u32::decode(&mut buf)?,
            bump: u8::decode(&mut buf)?,
        })
    }
}

/// A single catalog entry (120 bytes on disk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// SHA-256 of the blob; also the manifest seed
    pub content_id: ContentId,
    /// Derived address of the associated manifest
    pub manifest_address: Address,
    /// Size in bytes of the original blob
    pub blob_size: u64,
    /// Redundant copy of the content id, guarding the entry itself
    pub sha256: [u8; 32],
    /// Ledger slot at finalization
    pub created_slot: u64,
    /// Entry flags (bit 0: retired)
    pub flags: u8,
}

impl CatalogEntry {
    /// On-disk entry size, including trailing alignment.
    pub const LEN: usize = 32 + 32 + 8 + 32 + 8 + 1 + 7;

    /// Returns true when the retired flag is set.
    pub fn is_retired(&self) -> bool {
        self.flags & FLAG_RETIRED != 0
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        self.content_id.encode(buf);
        self.manifest_address.encode(buf);
        self.blob_size.encode(buf);
        self.sha256.encode(buf);
        self.created_slot.encode(buf);
        self.flags.encode(buf);
        buf.put_bytes(0, 7);
    }

    fn decode_from(buf: &mut Bytes) -> Result<Self, LayoutError> {
        let entry = Self {
            content_id: ContentId::decode(buf)?,
            manifest_address: Address::decode(buf)?,
            blob_size: u64::decode(buf)?,
            sha256: <[u8; 32]>::decode(buf)?,
            created_slot: u64::decode(buf)?,
            flags: u8::decode(buf)?,
        };
        let _padding = <[u8; 7]>::decode(buf)?;
        Ok(entry)
    }
}

/// A catalog page: header plus a fixed array of entries.
///
/// Only positions `[0, entries.len())` are populated; the remainder of the
/// on-disk array is uninitialised and ignored on read. The capacity comes
/// from the account length, never from a client-side constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    /// Page index, equal to the page's derivation seed
    pub page_index: u32,
    /// Derivation bump
    pub bump: u8,
    /// Populated entries, in append order
    pub entries: Vec<CatalogEntry>,
    /// Entry capacity implied by the account length
    pub capacity: u32,
}

impl CatalogPage {
    /// Record name used for the discriminator.
    pub const RECORD: &'static str = "CatalogPage";

    /// Header length before the entry array.
    pub const HEADER_LEN: usize = 8 + 4 + 4 + 1 + 7;

    /// Returns the discriminator constant for this record.
    pub fn discriminator() -> [u8; 8] {
        account_discriminator(Self::RECORD)
    }

    /// Account length for a page of the given capacity.
    pub const fn len_for_capacity(capacity: usize) -> usize {
        Self::HEADER_LEN + capacity * CatalogEntry::LEN
    }

    /// Creates an empty page.
    pub fn empty(page_index: u32, capacity: u32, bump: u8) -> Self {
        Self {
            page_index,
            bump,
            entries: Vec::new(),
            capacity,
        }
    }

    /// Number of populated entries.
    pub fn entry_count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Returns true when no further entry fits.
    pub fn is_full(&self) -> bool {
        self.entry_count() >= self.capacity
    }

    /// Encodes to account bytes, zero-filling unpopulated entries.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::len_for_capacity(self.capacity as usize));
        Self::discriminator().encode(&mut buf);
        self.page_index.encode(&mut buf);
        self.entry_count().encode(&mut buf);
        self.bump.encode(&mut buf);
        buf.put_bytes(0, 7);
        for entry in &self.entries {
            entry.encode_into(&mut buf);
        }
        let unused = self.capacity as usize - self.entries.len();
        buf.put_bytes(0, unused * CatalogEntry::LEN);
        buf.to_vec()
    }

    /// Decodes from account bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() < Self::HEADER_LEN {
            return Err(LayoutError::TooShort {
                record: Self::RECORD,
                expected: Self::HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let capacity = ((bytes.len() - Self::HEADER_LEN) / CatalogEntry::LEN) as u32;

        let mut buf = Bytes::copy_from_slice(bytes);
        let discriminator = <[u8; 8]>::decode(&mut buf)?;
        if discriminator != Self::discriminator() {
            return Err(LayoutError::Discriminator {
                expected: Self::RECORD,
            });
        }
        let page_index = u32::decode(&mut buf)?;
        let entry_count = u32::decode(&mut buf)?;
        let bump = u8::decode(&mut buf)?;
        let _padding = <[u8; 7]>::decode(&mut buf)?;

        if entry_count > capacity {
            return Err(LayoutError::EntryCountTooLarge {
                entry_count,
                capacity,
            });
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            entries.push(CatalogEntry::decode_from(&mut buf)?);
        }

        Ok(Self {
            page_index,
            bump,
            entries,
            capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PAGE_CAP;

    fn sample_entry(fill: u8) -> CatalogEntry {
        CatalogEntry {
            content_id: ContentId::new([fill; 32]),
            manifest_address: Address::new([fill.wrapping_add(1); 32]),
            blob_size: 1234,
            sha256: [fill; 32],
            created_slot: 99,
            flags: 0,
        }
    }

    #[test]
    fn test_root_roundtrip() {
        let root = CatalogRoot {
            version: 1,
            admin: Address::new([0x07; 32]),
            total_cartridges: 42,
            page_count: 3,
            latest_page_index: 2,
            bump: 254,
        };
        let bytes = root.encode();
        assert_eq!(bytes.len(), CatalogRoot::LEN);
        assert_eq!(CatalogRoot::decode(&bytes).unwrap(), root);
    }

    #[test]
    fn test_root_rejects_short_buffer() {
        let root = CatalogRoot::initial(Address::zero(), 255);
        let bytes = root.encode();
        let err = CatalogRoot::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, LayoutError::TooShort { .. }));
    }

    #[test]
    fn test_root_rejects_wrong_discriminator() {
        let mut bytes = CatalogRoot::initial(Address::zero(), 255).encode();
        bytes[0] ^= 0xff;
        let err = CatalogRoot::decode(&bytes).unwrap_err();
        assert!(matches!(err, LayoutError::Discriminator { .. }));
    }

    #[test]
    fn test_page_roundtrip() {
        let mut page = CatalogPage::empty(5, PAGE_CAP as u32, 251);
        page.entries.push(sample_entry(0xaa));
        page.entries.push(sample_entry(0xbb));

        let bytes = page.encode();
        assert_eq!(bytes.len(), CatalogPage::len_for_capacity(PAGE_CAP));
        let decoded = CatalogPage::decode(&bytes).unwrap();
        assert_eq!(decoded, page);
        assert_eq!(decoded.entry_count(), 2);
        assert_eq!(decoded.capacity, PAGE_CAP as u32);
    }

    #[test]
    fn test_page_capacity_comes_from_length() {
        // A page allocated with a different capacity still decodes; clients
        // must not assume a fixed PAGE_CAP.
        let page = CatalogPage::empty(0, 4, 255);
        let bytes = page.encode();
        let decoded = CatalogPage::decode(&bytes).unwrap();
        assert_eq!(decoded.capacity, 4);
    }

    #[test]
    fn test_page_rejects_entry_count_beyond_capacity() {
        let mut page = CatalogPage::empty(0, 2, 255);
        page.entries.push(sample_entry(1));
        let mut bytes = page.encode();
        // Forge entry_count = 9 at offset 12.
        bytes[12..16].copy_from_slice(&9u32.to_le_bytes());
        let err = CatalogPage::decode(&bytes).unwrap_err();
        assert!(matches!(err, LayoutError::EntryCountTooLarge { .. }));
    }

    #[test]
    fn test_entry_size_is_fixed() {
        assert_eq!(CatalogEntry::LEN, 120);
    }

    #[test]
    fn test_retired_flag() {
        let mut entry = sample_entry(0x01);
        assert!(!entry.is_retired());
        entry.flags |= FLAG_RETIRED;
        assert!(entry.is_retired());
    }

    #[test]
    fn test_full_page_roundtrip() {
        let mut page = CatalogPage::empty(1, PAGE_CAP as u32, 250);
        for i in 0..PAGE_CAP {
            page.entries.push(sample_entry(i as u8));
        }
        assert!(page.is_full());
        let decoded = CatalogPage::decode(&page.encode()).unwrap();
        assert_eq!(decoded.entries.len(), PAGE_CAP);
        assert_eq!(decoded, page);
    }
}
