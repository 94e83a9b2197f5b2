//! Position side.

use std::fmt;
use std::io::{Read, Write};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Direction of a leveraged position.
///
/// The ledger stores side as a single byte; that byte only appears in
/// address derivation and in the account codec below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Ledger byte for this side. 0 is the ledger's "none" and is never produced.
    pub(crate) fn ledger_byte(self) -> u8 {
        match self {
            Side::Long => 1,
            Side::Short => 2,
        }
    }

    pub(crate) fn from_ledger_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Side::Long),
            2 => Some(Side::Short),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            other => Err(format!("invalid side '{other}', expected long or short")),
        }
    }
}

impl BorshSerialize for Side {
    fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&[self.ledger_byte()])
    }
}

impl BorshDeserialize for Side {
    fn deserialize_reader<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let byte = u8::deserialize_reader(reader)?;
        Side::from_ledger_byte(byte).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid position side byte {byte}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_codec() {
        assert_eq!(borsh::to_vec(&Side::Long).unwrap(), vec![1]);
        assert_eq!(borsh::to_vec(&Side::Short).unwrap(), vec![2]);
        assert_eq!(Side::try_from_slice(&[2]).unwrap(), Side::Short);
        assert!(Side::try_from_slice(&[0]).is_err());
        assert!(Side::try_from_slice(&[3]).is_err());
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("LONG".parse::<Side>().unwrap(), Side::Long);
        assert_eq!("short".parse::<Side>().unwrap(), Side::Short);
        assert!("none".parse::<Side>().is_err());
    }
}
