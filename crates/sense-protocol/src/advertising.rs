//! Advertisement record parsing.
//!
//! Sense units advertise their device id in a 16-bit service data record and,
//! from hardware revision 1.5 on, a manufacturer record that identifies the
//! revision and ends with the low half of the MAC address.

use std::collections::BTreeMap;

use crate::constants::ADVERTISEMENT_SERVICE_16_BIT;
use crate::error::ProtocolError;

/// AD type: service data with a 16-bit UUID.
pub const AD_TYPE_SERVICE_DATA: u8 = 0x16;
/// AD type: manufacturer specific data.
pub const AD_TYPE_MANUFACTURER_SPECIFIC_DATA: u8 = 0xFF;

/// Manufacturer record prefix advertised by Sense 1.5 (company id + hardware id).
pub const SENSE_WITH_VOICE_PREFIX: [u8; 3] = [0xEA, 0x03, 0x22];
/// Smallest manufacturer record that carries the MAC suffix.
pub const SENSE_WITH_VOICE_RECORD_MIN_LEN: usize = 6;
/// Vendor prefix shared by every Sense 1.5 MAC address.
pub const SENSE_WITH_VOICE_MAC_PREFIX: &str = "5c:6b:4f";

/// Hardware revision inferred from advertising data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum HardwareVersion {
    /// Original Sense.
    Sense,
    /// Sense 1.5.
    SenseWithVoice,
    /// No records to decide from.
    Unknown,
}

/// Advertisement records grouped by AD type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisingData {
    records: BTreeMap<u8, Vec<Vec<u8>>>,
}

impl AdvertisingData {
    /// Create an empty record set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw advertisement (`[len][type][data...]` structures).
    ///
    /// A zero length byte ends the advertisement.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let mut data = Self::new();
        let mut rest = raw;
        while let Some((&len, tail)) = rest.split_first() {
            if len == 0 {
                break;
            }
            let len = len as usize;
            if tail.len() < len {
                return Err(ProtocolError::Truncated {
                    expected: len,
                    actual: tail.len(),
                });
            }
            let (record, next) = tail.split_at(len);
            data.add_record(record[0], record[1..].to_vec());
            rest = next;
        }
        Ok(data)
    }

    /// Add a record.
    pub fn add_record(&mut self, ad_type: u8, record: Vec<u8>) {
        self.records.entry(ad_type).or_default().push(record);
    }

    /// Records of one type.
    pub fn records(&self, ad_type: u8) -> &[Vec<u8>] {
        self.records.get(&ad_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether there are no records at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Device id: the hex text following the Sense service id in service data.
    pub fn device_id(&self) -> Option<String> {
        let prefix = hex::decode(ADVERTISEMENT_SERVICE_16_BIT).ok()?;
        self.records(AD_TYPE_SERVICE_DATA)
            .iter()
            .find(|record| record.starts_with(&prefix))
            .map(|record| hex::encode_upper(&record[prefix.len()..]))
    }

    /// Hardware revision.
    pub fn hardware_version(&self) -> HardwareVersion {
        if self.is_empty() {
            HardwareVersion::Unknown
        } else if self.sense_with_voice_record().is_some() {
            HardwareVersion::SenseWithVoice
        } else {
            HardwareVersion::Sense
        }
    }

    /// MAC address of a Sense 1.5, `None` for other hardware.
    pub fn mac_address(&self) -> Option<String> {
        let record = self.sense_with_voice_record()?;
        let suffix = &record[record.len() - 3..];
        Some(format!(
            "{}:{:02x}:{:02x}:{:02x}",
            SENSE_WITH_VOICE_MAC_PREFIX, suffix[0], suffix[1], suffix[2]
        ))
    }

    // Any record type may carry the revision marker.
    fn sense_with_voice_record(&self) -> Option<&[u8]> {
        self.records
            .values()
            .flatten()
            .find(|r| r.len() >= SENSE_WITH_VOICE_RECORD_MIN_LEN && r.starts_with(&SENSE_WITH_VOICE_PREFIX))
            .map(Vec::as_slice)
    }
}
