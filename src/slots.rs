// Copyright 2024 Felix Engl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::request::Request;
use thiserror::Error;

/// Errors while assigning a slot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("The request {0} has no fingerprint.")]
    MissingFingerprint(String),
    #[error("The fingerprint {0:?} is not a hex string.")]
    InvalidFingerprint(String),
    #[error("Can not assign a slot for {0}, the number of slots is 0.")]
    NoSlots(String),
}

/// Decides the producer slot of a request.
pub trait SlotAssigner {
    fn slot_for(&self, request: &Request) -> Result<String, SlotError>;
}

impl<F> SlotAssigner for F
where
    F: Fn(&Request) -> Result<String, SlotError>,
{
    #[inline]
    fn slot_for(&self, request: &Request) -> Result<String, SlotError> {
        self(request)
    }
}

/// Spreads the requests over `prefix0..prefixN` by their hex fingerprint.
///
/// A slot in the meta of a request is used verbatim. The number of slots can be
/// overridden per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSlotAssigner {
    prefix: String,
    number_of_slots: u64,
}

impl HashSlotAssigner {
    pub fn new(prefix: impl Into<String>, number_of_slots: u64) -> Self {
        Self {
            prefix: prefix.into(),
            number_of_slots,
        }
    }
}

impl SlotAssigner for HashSlotAssigner {
    fn slot_for(&self, request: &Request) -> Result<String, SlotError> {
        if let Some(slot) = request.producer_slot() {
            return Ok(slot.to_string());
        }
        let n = request
            .producer_number_of_slots()
            .unwrap_or(self.number_of_slots);
        if n == 0 {
            return Err(SlotError::NoSlots(request.url.clone()));
        }
        let fingerprint = request
            .fingerprint()
            .ok_or_else(|| SlotError::MissingFingerprint(request.url.clone()))?;
        let slot = hex_mod(fingerprint, n)
            .ok_or_else(|| SlotError::InvalidFingerprint(fingerprint.to_string()))?;
        Ok(format!("{}{}", self.prefix, slot))
    }
}

/// `value mod n` for a hex string of any length.
fn hex_mod(value: &str, n: u64) -> Option<u64> {
    if value.is_empty() {
        return None;
    }
    let n = n as u128;
    let mut remainder = 0u128;
    for c in value.chars() {
        let digit = c.to_digit(16)? as u128;
        remainder = (remainder * 16 + digit) % n;
    }
    Some(remainder as u64)
}

#[cfg(test)]
mod test {
    use super::hex_mod;
    use crate::request::{meta_keys, Request};
    use crate::slots::{HashSlotAssigner, SlotAssigner, SlotError};

    fn request(fingerprint: &str) -> Request {
        Request::new("https://www.example.com/").with_fingerprint(fingerprint)
    }

    #[test]
    fn hashes_the_fingerprint() {
        let assigner = HashSlotAssigner::new("s", 8);
        assert_eq!("s7", assigner.slot_for(&request("0f")).unwrap());
        assert_eq!("s2", assigner.slot_for(&request("1a")).unwrap());
        assert_eq!(
            assigner.slot_for(&request("deadbeef")).unwrap(),
            assigner.slot_for(&request("deadbeef")).unwrap()
        );
    }

    #[test]
    fn long_fingerprints_work() {
        let fingerprint = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        // 0x...09 is odd
        assert_eq!(Some(1), hex_mod(fingerprint, 2));
        assert_eq!(Some(9), hex_mod(fingerprint, 16));
        let assigner = HashSlotAssigner::new("", 1);
        assert_eq!("0", assigner.slot_for(&request(fingerprint)).unwrap());
    }

    #[test]
    fn overrides_win() {
        let assigner = HashSlotAssigner::new("s", 8);
        let forced = request("0f").with_meta(meta_keys::PRODUCER_SLOT, "special");
        assert_eq!("special", assigner.slot_for(&forced).unwrap());
        let narrowed = request("0f").with_meta(meta_keys::PRODUCER_NUMBER_OF_SLOTS, 4);
        assert_eq!("s3", assigner.slot_for(&narrowed).unwrap());
    }

    #[test]
    fn bad_input_is_an_error() {
        let assigner = HashSlotAssigner::new("", 8);
        assert!(matches!(
            assigner.slot_for(&Request::new("https://www.example.com/")),
            Err(SlotError::MissingFingerprint(_))
        ));
        assert!(matches!(
            assigner.slot_for(&request("xyz")),
            Err(SlotError::InvalidFingerprint(_))
        ));
        assert!(matches!(
            HashSlotAssigner::new("", 0).slot_for(&request("ab")),
            Err(SlotError::NoSlots(_))
        ));
    }

    #[test]
    fn closures_can_assign() {
        let assigner = |_: &Request| Ok::<_, SlotError>("fixed".to_string());
        assert_eq!("fixed", assigner.slot_for(&request("ab")).unwrap());
    }
}
