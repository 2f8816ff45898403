use crate::{
    Result,
    constants::{MAX_CARD_LENGTH, MIN_CARD_LENGTH, NAME_BLOCKED, NAME_UNKNOWN, READER_COUNT},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card number as decoded from a Wiegand frame (decimal digits).
///
/// The decimal rendering of the frame's data bits is the card identity
/// used everywhere: store keys, blocklist membership, transaction records
/// and remote documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardNumber(String);

impl CardNumber {
    /// Create a new card number with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardFormat` if:
    /// - The card number is empty or longer than 20 characters
    /// - The card number contains non-digit characters
    pub fn new(number: &str) -> Result<Self> {
        let number = number.trim();

        let len = number.len();
        if !(MIN_CARD_LENGTH..=MAX_CARD_LENGTH).contains(&len) {
            return Err(Error::InvalidCardFormat(format!(
                "Card number must be {MIN_CARD_LENGTH}-{MAX_CARD_LENGTH} digits, got {len}"
            )));
        }

        if !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidCardFormat(
                "Card number must be decimal digits".to_string(),
            ));
        }

        Ok(CardNumber(number.to_string()))
    }

    /// Create a card number from a decoded Wiegand frame value.
    #[must_use]
    pub fn from_raw(value: u64) -> Self {
        CardNumber(value.to_string())
    }

    /// Get the card number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardNumber::new(s)
    }
}

/// Reader identifier (1-based; reader N actuates relay N)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReaderId(u8);

impl ReaderId {
    /// Create a new reader ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidReaderId` if the ID is outside 1..=READER_COUNT.
    pub fn new(id: u8) -> Result<Self> {
        if !(1..=READER_COUNT).contains(&id) {
            return Err(Error::InvalidReaderId(id));
        }
        Ok(ReaderId(id))
    }

    /// Get the raw reader ID.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Zero-based index of the relay paired with this reader.
    #[must_use]
    pub fn relay_index(&self) -> usize {
        usize::from(self.0) - 1
    }
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of an access decision.
///
/// Serialized with the exact wire strings the dashboard and the remote
/// store expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessStatus {
    #[serde(rename = "Access Granted")]
    Granted,
    #[serde(rename = "Access Denied")]
    Denied,
    #[serde(rename = "Blocked")]
    Blocked,
}

impl AccessStatus {
    /// Wire string for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Granted => "Access Granted",
            AccessStatus::Denied => "Access Denied",
            AccessStatus::Blocked => "Blocked",
        }
    }

    /// Returns `true` if the decision opens the door.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessStatus::Granted)
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single access decision, immutable once appended to the local log.
///
/// Wire schema: `{"name": str, "card": str, "reader": int,
/// "status": "Access Granted"|"Access Denied"|"Blocked", "timestamp": int}`.
/// Remote documents additionally carry a server-generated creation
/// timestamp and an `entity_id`; those fields never appear locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub name: String,
    pub card: CardNumber,
    pub reader: ReaderId,
    pub status: AccessStatus,
    pub timestamp: i64,
}

impl Transaction {
    /// Construct a transaction stamped at the moment of decision.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        card: CardNumber,
        reader: ReaderId,
        status: AccessStatus,
        timestamp: i64,
    ) -> Self {
        Self {
            name: name.into(),
            card,
            reader,
            status,
            timestamp,
        }
    }

    /// The display name recorded for a decision with no resolved user.
    #[must_use]
    pub fn placeholder_name(status: AccessStatus) -> &'static str {
        match status {
            AccessStatus::Blocked => NAME_BLOCKED,
            _ => NAME_UNKNOWN,
        }
    }
}

/// A registered card holder.
///
/// The `blocked` flag is not stored here: the blocklist is a separate,
/// redundantly persisted set for O(1) checks on the scan hot path.
/// Unknown keys in persisted files are accepted for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub card_number: CardNumber,
    #[serde(default)]
    pub ref_id: String,
    #[serde(default)]
    pub privacy_protected: bool,
}

impl User {
    /// Validate the fields required for enrollment.
    ///
    /// # Errors
    /// Returns `Error::Validation` if id or name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation("id required"));
        }
        if self.name.is_empty() {
            return Err(Error::validation("name required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("12345678", "12345678")]
    #[case("  12345678  ", "12345678")]
    #[case("0", "0")]
    #[case("12345678901234567890", "12345678901234567890")]
    fn test_card_number_valid(#[case] input: &str, #[case] expected: &str) {
        let card = CardNumber::new(input).unwrap();
        assert_eq!(card.as_str(), expected);
    }

    #[rstest]
    #[case("")] // empty
    #[case("123456789012345678901")] // too long
    #[case("12AB")] // non-digit
    #[case("-42")] // sign is not a digit
    fn test_card_number_invalid(#[case] input: &str) {
        assert!(CardNumber::new(input).is_err());
    }

    #[test]
    fn test_card_number_from_raw() {
        assert_eq!(CardNumber::from_raw(12345678).as_str(), "12345678");
        assert_eq!(CardNumber::from_raw(0).as_str(), "0");
    }

    #[rstest]
    #[case(1, 0)]
    #[case(2, 1)]
    #[case(3, 2)]
    fn test_reader_id_valid(#[case] id: u8, #[case] relay: usize) {
        let reader = ReaderId::new(id).unwrap();
        assert_eq!(reader.as_u8(), id);
        assert_eq!(reader.relay_index(), relay);
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    fn test_reader_id_invalid(#[case] id: u8) {
        assert!(ReaderId::new(id).is_err());
    }

    #[test]
    fn test_access_status_wire_strings() {
        assert_eq!(AccessStatus::Granted.as_str(), "Access Granted");
        assert_eq!(AccessStatus::Denied.as_str(), "Access Denied");
        assert_eq!(AccessStatus::Blocked.as_str(), "Blocked");
        assert!(AccessStatus::Granted.is_granted());
        assert!(!AccessStatus::Blocked.is_granted());
    }

    #[test]
    fn test_transaction_json_schema() {
        let tx = Transaction::new(
            "John",
            CardNumber::new("12345678").unwrap(),
            ReaderId::new(1).unwrap(),
            AccessStatus::Granted,
            1_700_000_000,
        );
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "John",
                "card": "12345678",
                "reader": 1,
                "status": "Access Granted",
                "timestamp": 1_700_000_000i64,
            })
        );

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_transaction_placeholder_names() {
        assert_eq!(Transaction::placeholder_name(AccessStatus::Blocked), "Blocked");
        assert_eq!(Transaction::placeholder_name(AccessStatus::Denied), "Unknown");
    }

    #[test]
    fn test_user_tolerates_unknown_keys() {
        let json = r#"{
            "id": "42",
            "name": "John",
            "card_number": "12345678",
            "department": "facilities"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.name, "John");
        assert_eq!(user.ref_id, "");
        assert!(!user.privacy_protected);
    }

    #[test]
    fn test_user_validation() {
        let mut user = User {
            id: "42".to_string(),
            name: "John".to_string(),
            card_number: CardNumber::new("12345678").unwrap(),
            ref_id: String::new(),
            privacy_protected: false,
        };
        assert!(user.validate().is_ok());

        user.name.clear();
        assert!(user.validate().is_err());
    }
}
