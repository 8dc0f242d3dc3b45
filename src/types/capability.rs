//! Network capabilities used for request and retry-rule matching.

use std::fmt;

/// A requested network property, used both for request matching and retry-rule
/// matching. The lowercase token names are what operator rule strings use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Internet,
    Mms,
    Supl,
    Dun,
    Fota,
    Ims,
    Cbs,
    Xcap,
    Eims,
    Enterprise,
    Mcx,
    Rcs,
    PrioritizeLatency,
    PrioritizeBandwidth,
}

impl Capability {
    /// Parse a rule-string token. Matching is case-insensitive.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        Some(match token.as_str() {
            "internet" => Self::Internet,
            "mms" => Self::Mms,
            "supl" => Self::Supl,
            "dun" => Self::Dun,
            "fota" => Self::Fota,
            "ims" => Self::Ims,
            "cbs" => Self::Cbs,
            "xcap" => Self::Xcap,
            "eims" => Self::Eims,
            "enterprise" => Self::Enterprise,
            "mcx" => Self::Mcx,
            "rcs" => Self::Rcs,
            "prioritize_latency" => Self::PrioritizeLatency,
            "prioritize_bandwidth" => Self::PrioritizeBandwidth,
            _ => return None,
        })
    }

    /// Canonical lowercase token, the inverse of [`Capability::from_token`].
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Internet => "internet",
            Self::Mms => "mms",
            Self::Supl => "supl",
            Self::Dun => "dun",
            Self::Fota => "fota",
            Self::Ims => "ims",
            Self::Cbs => "cbs",
            Self::Xcap => "xcap",
            Self::Eims => "eims",
            Self::Enterprise => "enterprise",
            Self::Mcx => "mcx",
            Self::Rcs => "rcs",
            Self::PrioritizeLatency => "prioritize_latency",
            Self::PrioritizeBandwidth => "prioritize_bandwidth",
        }
    }

    /// APN-type capabilities identify a concrete connection type; the rest are
    /// request modifiers that can still be matched by rules.
    pub fn is_apn_type(self) -> bool {
        !matches!(self, Self::PrioritizeLatency | Self::PrioritizeBandwidth)
    }

    /// Relative priority used to pick a request's primary capability.
    pub(crate) fn priority(self) -> u8 {
        match self {
            Self::Eims => 90,
            Self::Ims => 85,
            Self::Mcx => 80,
            Self::Enterprise => 75,
            Self::Xcap => 70,
            Self::Cbs => 65,
            Self::Supl => 60,
            Self::Dun => 55,
            Self::Fota => 50,
            Self::Mms => 45,
            Self::Rcs => 40,
            Self::Internet => 20,
            Self::PrioritizeBandwidth => 10,
            Self::PrioritizeLatency => 5,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}
