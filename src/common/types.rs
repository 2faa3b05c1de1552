//! Shared type definitions for the Arcadium platform
//!
//! Identifiers, currencies and the player record used by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Opaque player identity (wallet address or computer seat id)
    Identity
);

string_id!(
    /// Room identifier
    RoomId
);

string_id!(
    /// Game session identifier
    SessionId
);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl RoomId {
    pub fn generate() -> Self {
        Self(format!("room_{}", Uuid::new_v4().simple()))
    }
}

/// Currencies held in a wallet. `Jup` is the canonical base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Jup,
    Sol,
    Usdc,
    Btc,
    Eth,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Jup,
        Currency::Sol,
        Currency::Usdc,
        Currency::Btc,
        Currency::Eth,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Jup => "JUP",
            Currency::Sol => "SOL",
            Currency::Usdc => "USDC",
            Currency::Btc => "BTC",
            Currency::Eth => "ETH",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.symbol().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown currency '{}'", s))
    }
}

/// Profile supplied by the identity/wallet provider at connect time.
/// Identity is asserted, not verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletProfile {
    pub identity: Identity,
    pub display_name: String,
    pub avatar: String,
    pub base_balance: f64,
}

/// A participant in a session or a room seat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub identity: Identity,
    pub display_name: String,
    pub avatar: String,
    pub is_computer: bool,
    pub is_online: bool,
    /// Displayed score; only the owning session or feed mutates it
    pub score: u32,
}

impl Player {
    /// Human player backed by a wallet profile
    pub fn human(profile: &WalletProfile) -> Self {
        Self {
            identity: profile.identity.clone(),
            display_name: profile.display_name.clone(),
            avatar: profile.avatar.clone(),
            is_computer: false,
            is_online: true,
            score: 0,
        }
    }

    /// Computer-controlled seat
    pub fn computer(identity: impl Into<Identity>, display_name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            display_name: display_name.into(),
            avatar: avatar.into(),
            is_computer: true,
            is_online: true,
            score: 0,
        }
    }

    /// A known profile whose moves are driven locally by the computer
    pub fn simulated(profile: &WalletProfile) -> Self {
        Self {
            is_computer: true,
            ..Self::human(profile)
        }
    }
}

/// Current wall-clock time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
