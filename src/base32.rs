use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid base32 character {ch:?} at position {position}")]
    InvalidCharacter { ch: char, position: usize },
}

fn symbol_value(ch: char) -> Option<u8> {
    match ch {
        'A'..='Z' => Some(ch as u8 - b'A'),
        '2'..='7' => Some(ch as u8 - b'2' + 26),
        _ => None,
    }
}

/// Decode a Base32 secret. Case-insensitive, `=` padding is stripped and
/// not required.
///
/// Length is not validated: a trailing partial byte is kept when it carries
/// non-zero bits and dropped otherwise.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let mut out = Vec::with_capacity(cleaned.len() * 5 / 8 + 1);
    let mut current: u8 = 0;
    // free bits left in `current`
    let mut remaining: u32 = 8;

    for (position, ch) in cleaned.chars().enumerate() {
        let value = symbol_value(ch).ok_or(DecodeError::InvalidCharacter { ch, position })?;

        if remaining > 5 {
            current |= value << (remaining - 5);
            remaining -= 5;
        } else {
            current |= value >> (5 - remaining);
            out.push(current);
            current = ((value as u16) << (3 + remaining)) as u8;
            remaining += 3;
        }
    }

    if remaining < 8 && current != 0 {
        out.push(current);
    }

    Ok(out)
}

/// Encode bytes as uppercase, unpadded RFC 4648 Base32.
pub fn encode(bytes: &[u8]) -> String {
    ::base32::encode(::base32::Alphabet::Rfc4648 { padding: false }, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, RngCore};

    #[test]
    fn decodes_rfc4648_vectors() {
        assert_eq!(decode("").unwrap(), b"");
        assert_eq!(decode("MY======").unwrap(), b"f");
        assert_eq!(decode("MZXQ====").unwrap(), b"fo");
        assert_eq!(decode("MZXW6===").unwrap(), b"foo");
        assert_eq!(decode("MZXW6YQ=").unwrap(), b"foob");
        assert_eq!(decode("MZXW6YTB").unwrap(), b"fooba");
        assert_eq!(decode("MZXW6YTBOI======").unwrap(), b"foobar");
    }

    #[test]
    fn decode_is_case_insensitive_and_padding_optional() {
        assert_eq!(decode("mzxw6ytboi").unwrap(), b"foobar");
        assert_eq!(decode("JBSWY3DPEHPK3PXP").unwrap(), b"Hello!\xde\xad\xbe\xef");
    }

    #[test]
    fn decode_rejects_characters_outside_alphabet() {
        assert_eq!(
            decode("JBSW1"),
            Err(DecodeError::InvalidCharacter { ch: '1', position: 4 })
        );
        assert!(decode("JBSW Y3DP").is_err());
        assert!(decode("ABC8").is_err());
    }

    #[test]
    fn decode_keeps_non_zero_trailing_bits() {
        // "MZ" carries 10 bits, the trailing 2 are non-zero
        assert_eq!(decode("MZ").unwrap(), vec![0x66, 0x40]);
    }

    #[test]
    fn encodes_rfc4648_vectors_without_padding() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "MY");
        assert_eq!(encode(b"fo"), "MZXQ");
        assert_eq!(encode(b"foo"), "MZXW6");
        assert_eq!(encode(b"foob"), "MZXW6YQ");
        assert_eq!(encode(b"fooba"), "MZXW6YTB");
        assert_eq!(encode(b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn random_bytes_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let len = rng.gen_range(0..64);
            let mut bytes = vec![0u8; len];
            rng.fill_bytes(&mut bytes);
            assert_eq!(decode(&encode(&bytes)).unwrap(), bytes, "len {len}");
        }
    }

    #[test]
    fn decode_agrees_with_base32_crate() {
        let alphabet = || ::base32::Alphabet::Rfc4648 { padding: false };
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let mut bytes = vec![0u8; rng.gen_range(1..40)];
            rng.fill_bytes(&mut bytes);
            let text = ::base32::encode(alphabet(), &bytes);
            assert_eq!(decode(&text).ok(), ::base32::decode(alphabet(), &text), "{text}");
            assert_eq!(decode(&text.to_lowercase()).unwrap(), bytes);
        }
    }
}
