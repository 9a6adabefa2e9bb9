//! Plaintext layouts for the structured record kinds.
//!
//! - login + password: `login:password` (split at the first `:`)
//! - credit card: `number|expiry|cvc`
//! - text and files: raw bytes

use keepsafe_core::{Record, RecordType, VaultError, VaultResult};
use std::fmt::Write as _;

pub fn encode_login_password(login: &str, password: &str) -> VaultResult<Vec<u8>> {
    if login.contains(':') {
        return Err(VaultError::validation("stored login must not contain ':'"));
    }
    Ok(format!("{login}:{password}").into_bytes())
}

pub fn decode_login_password(bytes: &[u8]) -> VaultResult<(String, String)> {
    let text = utf8(bytes)?;
    let (login, password) = text
        .split_once(':')
        .ok_or_else(|| VaultError::validation("login record has no ':' separator"))?;
    Ok((login.to_string(), password.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub number: String,
    pub expiry: String,
    pub cvc: String,
}

impl Card {
    pub fn encode(&self) -> VaultResult<Vec<u8>> {
        for (name, field) in [("number", &self.number), ("expiry", &self.expiry), ("cvc", &self.cvc)] {
            if field.contains('|') {
                return Err(VaultError::validation(format!("card {name} must not contain '|'")));
            }
        }
        Ok(format!("{}|{}|{}", self.number, self.expiry, self.cvc).into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> VaultResult<Self> {
        let text = utf8(bytes)?;
        let mut parts = text.splitn(3, '|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(number), Some(expiry), Some(cvc)) => Ok(Self {
                number: number.to_string(),
                expiry: expiry.to_string(),
                cvc: cvc.to_string(),
            }),
            _ => Err(VaultError::validation("card record needs number|expiry|cvc")),
        }
    }
}

fn utf8(bytes: &[u8]) -> VaultResult<&str> {
    std::str::from_utf8(bytes).map_err(|_| VaultError::validation("record payload is not UTF-8"))
}

/// Human-readable rendering of a decrypted record.
///
/// File payloads are summarised by size; their bytes go to disk instead.
pub fn render(record: &Record) -> String {
    let mut out = String::new();
    let metadata = if record.metadata.is_empty() {
        "no metadata"
    } else {
        record.metadata.as_str()
    };
    let _ = writeln!(out, "{} | {}", metadata, record.record_type);
    let _ = writeln!(out, "id: {}", record.id);

    match record.record_type {
        RecordType::LoginPassword => match decode_login_password(&record.payload) {
            Ok((login, password)) => {
                let _ = writeln!(out, "login:    {login}");
                let _ = writeln!(out, "password: {password}");
            }
            Err(_) => {
                let _ = writeln!(out, "{}", String::from_utf8_lossy(&record.payload));
            }
        },
        RecordType::CreditCard => match Card::decode(&record.payload) {
            Ok(card) => {
                let _ = writeln!(out, "number: {}", card.number);
                let _ = writeln!(out, "expiry: {}", card.expiry);
                let _ = writeln!(out, "cvc:    {}", card.cvc);
            }
            Err(_) => {
                let _ = writeln!(out, "{}", String::from_utf8_lossy(&record.payload));
            }
        },
        RecordType::Text => {
            let _ = writeln!(out, "{}", String::from_utf8_lossy(&record.payload));
        }
        RecordType::File => {
            let _ = writeln!(out, "{} bytes", record.payload.len());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsafe_core::RecordId;

    #[test]
    fn test_login_password_split_at_first_colon() {
        let bytes = encode_login_password("alice", "pa:ss").unwrap();
        assert_eq!(bytes, b"alice:pa:ss");
        let (login, password) = decode_login_password(&bytes).unwrap();
        assert_eq!(login, "alice");
        assert_eq!(password, "pa:ss");
        assert!(decode_login_password(b"nocolon").is_err());
    }

    #[test]
    fn test_login_with_colon_rejected() {
        let err = encode_login_password("a:b", "c").unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)), "{err:?}");
    }

    #[test]
    fn test_card_layout() {
        let card = Card {
            number: "4111111111111111".into(),
            expiry: "12/29".into(),
            cvc: "123".into(),
        };
        let bytes = card.encode().unwrap();
        assert_eq!(bytes, b"4111111111111111|12/29|123");
        assert_eq!(Card::decode(&bytes).unwrap(), card);
        assert!(Card::decode(b"4111|12/29").is_err());

        let bad = Card {
            cvc: "1|2".into(),
            ..card
        };
        assert!(bad.encode().is_err());
    }

    #[test]
    fn test_render_marks_missing_metadata() {
        let record = Record {
            id: RecordId::new("r1"),
            record_type: RecordType::Text,
            metadata: String::new(),
            payload: b"hello".to_vec(),
        };
        let shown = render(&record);
        assert!(shown.starts_with("no metadata | Text\n"));
        assert!(shown.contains("hello"));
    }

    #[test]
    fn test_render_file_shows_size_only() {
        let record = Record {
            id: RecordId::new("r2"),
            record_type: RecordType::File,
            metadata: "photo.jpg".into(),
            payload: vec![0u8; 42],
        };
        assert!(render(&record).contains("42 bytes"));
    }
}
