//! Observed network path state.
//!
//! A [`PathSnapshot`] is produced for every path change the platform
//! reports and is consumed synchronously by the classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    /// 802.11 wireless.
    Wifi,
    /// Cellular modem (WWAN, PPP, raw-IP).
    Cellular,
    /// Wired ethernet.
    Ethernet,
    /// Anything else (tunnels, bridges, VPNs).
    Other,
}

impl InterfaceType {
    /// All interface types, in connection-type priority order.
    pub const ALL: [InterfaceType; 4] = [
        InterfaceType::Wifi,
        InterfaceType::Cellular,
        InterfaceType::Ethernet,
        InterfaceType::Other,
    ];

    fn bit(self) -> u8 {
        match self {
            InterfaceType::Wifi => 1 << 0,
            InterfaceType::Cellular => 1 << 1,
            InterfaceType::Ethernet => 1 << 2,
            InterfaceType::Other => 1 << 3,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            InterfaceType::Wifi => "wifi",
            InterfaceType::Cellular => "cellular",
            InterfaceType::Ethernet => "ethernet",
            InterfaceType::Other => "other",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A small set of [`InterfaceType`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InterfaceSet(u8);

impl InterfaceSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Add an interface type.
    pub fn insert(&mut self, kind: InterfaceType) {
        self.0 |= kind.bit();
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, kind: InterfaceType) -> Self {
        self.insert(kind);
        self
    }

    /// Check membership.
    pub fn contains(&self, kind: InterfaceType) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns true if no interface type is present.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of interface types present.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate members in priority order (wifi, cellular, ethernet, other).
    pub fn iter(&self) -> impl Iterator<Item = InterfaceType> + '_ {
        InterfaceType::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl FromIterator<InterfaceType> for InterfaceSet {
    fn from_iter<I: IntoIterator<Item = InterfaceType>>(iter: I) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl<const N: usize> From<[InterfaceType; N]> for InterfaceSet {
    fn from(kinds: [InterfaceType; N]) -> Self {
        kinds.into_iter().collect()
    }
}

impl fmt::Debug for InterfaceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for InterfaceSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for InterfaceSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kinds = Vec::<InterfaceType>::deserialize(deserializer)?;
        Ok(kinds.into_iter().collect())
    }
}

/// One observed description of the network path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSnapshot {
    /// The platform reports the path as usable.
    pub satisfied: bool,
    /// Usable but degraded (metered / low-data).
    pub constrained: bool,
    /// Interfaces present and up.
    pub available: InterfaceSet,
    /// Interfaces the path is actually routed through.
    pub used: InterfaceSet,
}

impl PathSnapshot {
    /// An unsatisfied path with no interfaces.
    pub fn unsatisfied() -> Self {
        Self::default()
    }

    /// A satisfied path routed through `kind`, which is also available.
    pub fn through(kind: InterfaceType) -> Self {
        Self {
            satisfied: true,
            constrained: false,
            available: InterfaceSet::from([kind]),
            used: InterfaceSet::from([kind]),
        }
    }

    /// Set the satisfied flag.
    pub fn satisfied(mut self, satisfied: bool) -> Self {
        self.satisfied = satisfied;
        self
    }

    /// Set the constrained flag.
    pub fn constrained(mut self, constrained: bool) -> Self {
        self.constrained = constrained;
        self
    }

    /// Set the available interfaces.
    pub fn available(mut self, available: impl Into<InterfaceSet>) -> Self {
        self.available = available.into();
        self
    }

    /// Set the used interfaces.
    pub fn used(mut self, used: impl Into<InterfaceSet>) -> Self {
        self.used = used.into();
        self
    }
}
