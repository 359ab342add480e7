//! Three-part message addresses
//!
//! An address names a manager, a component hosted by that manager, and a
//! channel owned by that component. Zero in the trailing fields selects the
//! enclosing entity, so `(m,0,0)` is manager `m` itself and `(0,0,0)` is the
//! root manager.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::{Result, SwitchyardError};

/// Value of an unset address field
pub const UNSET_FIELD: i32 = -1;

/// Size of the binary form
pub const ADDRESS_SIZE: usize = 12;

// ----------------------------------------------------------------------------
// Address
// ----------------------------------------------------------------------------

/// Message address `(manager, component, channel)`
///
/// Equality and ordering are lexicographic over the three fields; they exist
/// for map keys and diagnostics, never for message ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    pub manager: i32,
    pub component: i32,
    pub channel: i32,
}

impl Address {
    /// The unset address
    pub const UNSET: Self = Self {
        manager: UNSET_FIELD,
        component: UNSET_FIELD,
        channel: UNSET_FIELD,
    };

    /// The root manager
    pub const ROOT: Self = Self {
        manager: 0,
        component: 0,
        channel: 0,
    };

    pub const fn new(manager: i32, component: i32, channel: i32) -> Self {
        Self {
            manager,
            component,
            channel,
        }
    }

    /// Address of manager `number`
    pub const fn manager(number: i32) -> Self {
        Self::new(number, 0, 0)
    }

    /// Address of a component hosted by `manager`
    pub const fn component(manager: i32, component: i32) -> Self {
        Self::new(manager, component, 0)
    }

    /// Address of a channel owned by a component
    pub const fn channel(manager: i32, component: i32, channel: i32) -> Self {
        Self::new(manager, component, channel)
    }

    /// True when no field is unset (or otherwise negative)
    pub fn is_valid(&self) -> bool {
        self.manager >= 0 && self.component >= 0 && self.channel >= 0
    }

    pub fn is_channel(&self) -> bool {
        self.is_valid() && self.channel > 0
    }

    pub fn is_component(&self) -> bool {
        self.is_valid() && self.channel == 0 && self.component > 0
    }

    pub fn is_component_manager(&self) -> bool {
        self.is_valid() && self.channel == 0 && self.component == 0
    }

    /// True for `(0,0,0)`
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    /// The component this address belongs to (drops the channel)
    pub fn to_component(&self) -> Self {
        Self::new(self.manager, self.component, 0)
    }

    /// The manager this address belongs to
    pub fn to_manager(&self) -> Self {
        Self::manager(self.manager)
    }

    /// Whether `other` is this address or lies underneath it
    ///
    /// A manager address covers all of its components and channels, a
    /// component address covers its channels, a channel covers only itself.
    pub fn covers(&self, other: &Address) -> bool {
        if self.manager != other.manager {
            return false;
        }
        if self.component == 0 {
            return true;
        }
        if self.component != other.component {
            return false;
        }
        self.channel == 0 || self.channel == other.channel
    }

    /// Encode as 12 big-endian bytes
    pub fn to_bytes(&self) -> [u8; ADDRESS_SIZE] {
        let mut out = [0u8; ADDRESS_SIZE];
        out[0..4].copy_from_slice(&self.manager.to_be_bytes());
        out[4..8].copy_from_slice(&self.component.to_be_bytes());
        out[8..12].copy_from_slice(&self.channel.to_be_bytes());
        out
    }

    /// Decode from the 12-byte big-endian form
    pub fn from_bytes(bytes: &[u8; ADDRESS_SIZE]) -> Self {
        let field = |at: usize| {
            i32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Self::new(field(0), field(4), field(8))
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.manager, self.component, self.channel)
    }
}

impl FromStr for Address {
    type Err = SwitchyardError;

    fn from_str(s: &str) -> Result<Self> {
        let syntax = || SwitchyardError::AddressSyntax {
            text: s.to_string(),
        };

        let mut fields = s.trim().split('.');
        let mut next = || -> Result<i32> {
            fields
                .next()
                .ok_or_else(|| syntax())?
                .parse::<i32>()
                .map_err(|_| syntax())
        };

        let manager = next()?;
        let component = next()?;
        let channel = next()?;

        if fields.next().is_some() {
            return Err(syntax());
        }

        Ok(Self::new(manager, component, channel))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Address::ROOT.is_component_manager());
        assert!(Address::manager(3).is_component_manager());
        assert!(Address::component(0, 1).is_component());
        assert!(Address::channel(2, 5, 1).is_channel());

        assert!(!Address::UNSET.is_valid());
        assert!(!Address::UNSET.is_channel());
        assert!(!Address::UNSET.is_component());
        assert!(!Address::UNSET.is_component_manager());

        // A channel on a manager-level address is still a channel
        assert!(Address::new(1, 0, 4).is_channel());
    }

    #[test]
    fn test_text_form() {
        let address = Address::new(2, 5, 0);
        assert_eq!(address.to_string(), "2.5.0");
        assert_eq!("2.5.0".parse::<Address>().unwrap(), address);
        assert_eq!(" 0.0.0 ".parse::<Address>().unwrap(), Address::ROOT);
        assert_eq!("-1.-1.-1".parse::<Address>().unwrap(), Address::UNSET);

        assert!("2.5".parse::<Address>().is_err());
        assert!("2.5.0.1".parse::<Address>().is_err());
        assert!("a.b.c".parse::<Address>().is_err());
    }

    #[test]
    fn test_binary_form() {
        let address = Address::new(7, 65_536, -1);
        let bytes = address.to_bytes();
        assert_eq!(&bytes[0..4], &[0, 0, 0, 7]);
        assert_eq!(Address::from_bytes(&bytes), address);
    }

    #[test]
    fn test_covers() {
        let manager = Address::manager(1);
        let component = Address::component(1, 4);
        let channel = Address::channel(1, 4, 2);

        assert!(manager.covers(&channel));
        assert!(component.covers(&channel));
        assert!(channel.covers(&channel));
        assert!(!channel.covers(&component));
        assert!(!component.covers(&Address::component(1, 5)));
        assert!(!manager.covers(&Address::component(2, 4)));
    }

    #[test]
    fn test_lexicographic_ordering() {
        let mut addresses = vec![
            Address::new(1, 0, 0),
            Address::new(0, 2, 0),
            Address::new(0, 1, 3),
            Address::new(0, 1, 0),
        ];
        addresses.sort();
        assert_eq!(
            addresses,
            vec![
                Address::new(0, 1, 0),
                Address::new(0, 1, 3),
                Address::new(0, 2, 0),
                Address::new(1, 0, 0),
            ]
        );
    }
}
