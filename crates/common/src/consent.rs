//! Minimal TCF v2 consent string decoding.
//!
//! Only the core segment is read: the policy version fields, purpose
//! consents and the vendor consent section. Other segments (disclosed
//! vendors, publisher TC) are ignored.

use std::ops::RangeInclusive;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use error_stack::{Report, ResultExt};

use crate::error::SetuidError;

const TCF_V2: u64 = 2;

const PURPOSES_CONSENT_OFFSET: usize = 152;
const PURPOSES_COUNT: usize = 24;
const VENDOR_SECTION_OFFSET: usize = 213;

const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The parts of a TCF v2 consent string the setuid flow relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcfConsent {
    purposes_consent: u32,
    vendor_consents: VendorConsents,
}

/// Vendor section as encoded. Ranges are kept as ranges, so decoding cost
/// follows the string length rather than the vendor ids it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VendorConsents {
    Bitfield(Vec<bool>),
    Ranges(Vec<RangeInclusive<u32>>),
}

impl VendorConsents {
    fn contains(&self, vendor_id: u32) -> bool {
        match self {
            Self::Bitfield(bits) => vendor_id
                .checked_sub(1)
                .and_then(|index| bits.get(usize::try_from(index).ok()?))
                .copied()
                .unwrap_or(false),
            Self::Ranges(ranges) => ranges.iter().any(|range| range.contains(&vendor_id)),
        }
    }
}

impl TcfConsent {
    /// Decode the core segment of a TCF v2 string.
    ///
    /// # Errors
    ///
    /// Returns [`SetuidError::PrivacyResolution`] when the string is not
    /// base64url, is not version 2, or is truncated.
    pub fn decode(consent: &str) -> Result<Self, Report<SetuidError>> {
        let core = consent.split('.').next().unwrap_or_default();
        let bytes = LENIENT_URL_SAFE
            .decode(core)
            .change_context(SetuidError::PrivacyResolution {
                message: "consent string is not base64url".to_string(),
            })?;

        let mut reader = BitReader::new(&bytes);
        let version = reader.read(6)?;
        if version != TCF_V2 {
            return Err(Report::new(SetuidError::PrivacyResolution {
                message: format!("unsupported TCF version {version}"),
            }));
        }

        reader.seek(PURPOSES_CONSENT_OFFSET);
        let purposes_consent = u32::try_from(reader.read(PURPOSES_COUNT)?).unwrap_or_default();

        reader.seek(VENDOR_SECTION_OFFSET);
        let vendor_consents = read_vendor_section(&mut reader)?;

        Ok(Self {
            purposes_consent,
            vendor_consents,
        })
    }

    /// Whether purpose `purpose` (1-based) has consent.
    #[must_use]
    pub fn purpose_consent(&self, purpose: usize) -> bool {
        if purpose == 0 || purpose > PURPOSES_COUNT {
            return false;
        }
        self.purposes_consent & (1 << (PURPOSES_COUNT - purpose)) != 0
    }

    #[must_use]
    pub fn vendor_consent(&self, vendor_id: u32) -> bool {
        self.vendor_consents.contains(vendor_id)
    }
}

fn read_vendor_section(reader: &mut BitReader<'_>) -> Result<VendorConsents, Report<SetuidError>> {
    let max_vendor_id = reader.read(16)?;
    let is_range_encoding = reader.read(1)? == 1;

    if !is_range_encoding {
        let bits = (0..max_vendor_id)
            .map(|_| reader.read(1).map(|bit| bit == 1))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(VendorConsents::Bitfield(bits));
    }

    let entries = reader.read(12)?;
    let mut ranges = Vec::new();
    for _ in 0..entries {
        let is_range = reader.read(1)? == 1;
        let start = reader.read(16)?;
        let end = if is_range { reader.read(16)? } else { start };
        if start == 0 || end < start || end > max_vendor_id {
            return Err(Report::new(SetuidError::PrivacyResolution {
                message: format!("invalid vendor range {start}-{end}"),
            }));
        }
        // both fit in 16 bits
        ranges.push(u32::try_from(start).unwrap_or(0)..=u32::try_from(end).unwrap_or(0));
    }

    Ok(VendorConsents::Ranges(ranges))
}

struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn seek(&mut self, position: usize) {
        self.position = position;
    }

    fn read(&mut self, bits: usize) -> Result<u64, Report<SetuidError>> {
        if self.position + bits > self.bytes.len() * 8 {
            return Err(Report::new(SetuidError::PrivacyResolution {
                message: "consent string is truncated".to_string(),
            }));
        }

        let mut value = 0u64;
        for _ in 0..bits {
            let byte = self.bytes[self.position / 8];
            let bit = (byte >> (7 - self.position % 8)) & 1;
            value = (value << 1) | u64::from(bit);
            self.position += 1;
        }
        Ok(value)
    }
}
