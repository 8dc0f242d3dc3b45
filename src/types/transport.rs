//! Transport path for a data network.

use std::fmt;

/// WWAN (cellular) or WLAN (Wi-Fi offload) path for a data network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Wwan,
    Wlan,
}

impl Transport {
    /// The opposite path; the handover target for a network currently on `self`.
    pub fn other(self) -> Self {
        match self {
            Self::Wwan => Self::Wlan,
            Self::Wlan => Self::Wwan,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wwan => "wwan",
            Self::Wlan => "wlan",
        })
    }
}
