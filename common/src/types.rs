//! Common Types for the simulated E2 node
//!
//! Defines the network, cell, subscriber and RIC identifiers used throughout the node

use crate::IdError;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

const MASK_ECI: u64 = 0x0fff_ffff;
const MASK_ENB: u64 = 0x0fff_ff00;

/// PLMN Identity (MCC + MNC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlmnId {
    /// Mobile Country Code
    pub mcc: [u8; 3],
    /// Mobile Network Code (2 or 3 digits)
    pub mnc: [u8; 3],
    /// MNC length (2 or 3)
    pub mnc_len: u8,
}

impl PlmnId {
    /// Create a new PLMN ID
    pub fn new(mcc: [u8; 3], mnc: [u8; 3], mnc_len: u8) -> Option<Self> {
        let digits_ok = mcc.iter().chain(mnc.iter()).all(|d| *d <= 9);
        if digits_ok && (mnc_len == 2 || mnc_len == 3) {
            Some(Self { mcc, mnc, mnc_len })
        } else {
            None
        }
    }

    /// Parse a PLMN string of 5 or 6 decimal digits (e.g. "00101")
    pub fn parse(plmn: &str) -> Result<Self, IdError> {
        if !(plmn.len() == 5 || plmn.len() == 6) || !plmn.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::InvalidPlmn(plmn.to_string()));
        }

        let digits: Vec<u8> = plmn.bytes().map(|b| b - b'0').collect();
        let mut mnc = [0u8; 3];
        for (slot, digit) in mnc.iter_mut().zip(&digits[3..]) {
            *slot = *digit;
        }

        Self::new([digits[0], digits[1], digits[2]], mnc, (digits.len() - 3) as u8)
            .ok_or_else(|| IdError::InvalidPlmn(plmn.to_string()))
    }

    /// Encode to 3-byte format used in 3GPP
    pub fn encode(&self) -> [u8; 3] {
        let mut encoded = [0u8; 3];
        encoded[0] = (self.mcc[1] << 4) | self.mcc[0];
        encoded[1] = if self.mnc_len == 2 {
            0xF0 | self.mcc[2]
        } else {
            (self.mnc[2] << 4) | self.mcc[2]
        };
        encoded[2] = (self.mnc[1] << 4) | self.mnc[0];
        encoded
    }

    /// The encoded identity as a 24-bit integer
    pub fn to_u24(&self) -> u32 {
        crate::utils::u24_from_be(self.encode())
    }
}

impl fmt::Display for PlmnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnc = &self.mnc[..self.mnc_len as usize];
        write!(
            f,
            "{}{}{}-{}",
            self.mcc[0],
            self.mcc[1],
            self.mcc[2],
            mnc.iter().map(|d| d.to_string()).collect::<String>()
        )
    }
}

/// Node-local cell identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub u8);

/// eNodeB / gNodeB identifier (20 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnbId(pub u32);

impl EnbId {
    /// Maximum valid value (20 bits)
    pub const MAX: u32 = 0x000f_ffff;

    /// Create a new identifier with validation
    pub fn new(value: u32) -> Result<Self, IdError> {
        if value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(IdError::OutOfRange {
                name: "EnbId",
                value: value as u64,
                max: Self::MAX as u64,
            })
        }
    }
}

/// E2 node (gNB) identifier as announced to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GnbId(pub u64);

/// E-UTRAN Cell Identifier: eNB id in the upper 20 bits, cell id in the lower 8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Eci(pub u32);

impl Eci {
    pub fn new(enb_id: EnbId, cell_id: CellId) -> Self {
        Self((enb_id.0 << 8) | cell_id.0 as u32)
    }
}

/// E-UTRAN Cell Global Identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ecgi(pub u64);

impl Ecgi {
    pub fn new(plmn_id: PlmnId, eci: Eci) -> Self {
        Self(((plmn_id.to_u24() as u64) << 28) | (eci.0 as u64 & MASK_ECI))
    }

    pub fn plmn_u24(&self) -> u32 {
        (self.0 >> 28) as u32
    }

    pub fn eci(&self) -> Eci {
        Eci((self.0 & MASK_ECI) as u32)
    }

    pub fn enb_id(&self) -> EnbId {
        EnbId(((self.0 & MASK_ENB) >> 8) as u32)
    }

    pub fn cell_id(&self) -> CellId {
        CellId((self.0 & 0xff) as u8)
    }
}

impl fmt::Display for Ecgi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Globally unique eNodeB identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GEnbId(pub u64);

impl GEnbId {
    pub fn new(plmn_id: PlmnId, enb_id: EnbId) -> Self {
        Self(((plmn_id.to_u24() as u64) << 28) | (((enb_id.0 as u64) << 8) & MASK_ENB))
    }

    pub fn enb_id(&self) -> EnbId {
        EnbId(((self.0 & MASK_ENB) >> 8) as u32)
    }
}

impl From<Ecgi> for GEnbId {
    fn from(ecgi: Ecgi) -> Self {
        Self(ecgi.0 & !0xff)
    }
}

/// International Mobile Subscriber Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Imsi(pub u64);

impl fmt::Display for Imsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cell-specific temporary UE identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crnti(pub u32);

/// Geographic location
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
}

/// A 2D arc emanating from a location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub center: Coordinate,
    /// Azimuth in degrees
    pub azimuth: i32,
    /// Arc width in degrees
    pub arc: i32,
}

/// RAN function identifier, selects the service model a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RanFunctionId(pub u16);

impl RanFunctionId {
    /// Maximum valid value (0-4095)
    pub const MAX: u16 = 4095;
}

impl fmt::Display for RanFunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// RIC action identifier within a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RicActionId(pub u8);

/// RIC request identity (requestor + instance)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RicRequestId {
    /// Controller-side requestor identifier
    pub requestor_id: u32,
    /// Controller-assigned instance identifier
    pub instance_id: u32,
}

/// RIC action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum RicActionType {
    Report = 0,
    Insert = 1,
    Policy = 2,
}

/// RIC indication types
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum RicIndicationType {
    Report = 0,
    Insert = 1,
}
