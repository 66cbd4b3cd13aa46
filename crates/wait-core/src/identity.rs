//! SessionIdentity: the synthetic participant name a wait session registers under.
//!
//! The name is a fixed prefix followed by a random suffix drawn from `A-Z0-9`,
//! long enough that colliding with a real participant (or another session
//! running in the same process group) is negligible.

use rand::Rng;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Prefix used when no other prefix is configured.
pub const DEFAULT_IDENTITY_PREFIX: &str = "_test_node_";

/// Number of random characters appended to the prefix.
pub const IDENTITY_SUFFIX_LEN: usize = 10;

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid session identity: expected a 10-char [A-Z0-9] suffix")]
    InvalidSuffix,
}

/// Name under which a wait session's discovery handle is registered.
///
/// # Examples
/// ```
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use wait_core::SessionIdentity;
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let identity = SessionIdentity::generate(&mut rng);
/// assert!(identity.as_str().starts_with("_test_node_"));
/// assert_eq!(identity.suffix().len(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    /// Generate an identity with the default prefix from the given entropy source.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::generate_with_prefix(DEFAULT_IDENTITY_PREFIX, rng)
    }

    /// Generate an identity with a custom prefix.
    ///
    /// Pure with respect to `rng`: the same seeded RNG yields the same name.
    pub fn generate_with_prefix<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> Self {
        let mut name = String::with_capacity(prefix.len() + IDENTITY_SUFFIX_LEN);
        name.push_str(prefix);
        for _ in 0..IDENTITY_SUFFIX_LEN {
            let idx = rng.random_range(0..SUFFIX_ALPHABET.len());
            name.push(SUFFIX_ALPHABET[idx] as char);
        }
        Self(name)
    }

    /// Generate from the thread-local CSPRNG.
    pub fn random(prefix: &str) -> Self {
        Self::generate_with_prefix(prefix, &mut rand::rng())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The random part of the name.
    pub fn suffix(&self) -> &str {
        &self.0[self.0.len() - IDENTITY_SUFFIX_LEN..]
    }
}

impl Display for SessionIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionIdentity {
    type Err = IdentityError;

    /// Accepts any prefix; only the trailing random suffix is checked.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < IDENTITY_SUFFIX_LEN || !s.is_ascii() {
            return Err(IdentityError::InvalidSuffix);
        }
        let suffix = &s.as_bytes()[s.len() - IDENTITY_SUFFIX_LEN..];
        if suffix.iter().all(|b| SUFFIX_ALPHABET.contains(b)) {
            Ok(Self(s.to_string()))
        } else {
            Err(IdentityError::InvalidSuffix)
        }
    }
}

impl serde::Serialize for SessionIdentity {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for SessionIdentity {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
