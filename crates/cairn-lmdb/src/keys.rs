use cairn_core::error::{CairnError, Result};
use std::borrow::Cow;

/// Largest key LMDB accepts with its default page size
pub const MAX_KEY_LEN: usize = 511;

/// Reject keys LMDB cannot store before touching a transaction
pub fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(CairnError::InvalidArgument("key must not be empty".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(CairnError::InvalidArgument(format!(
            "key is {} bytes, maximum is {}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    Ok(())
}

/// Human-readable form of a key for errors and logs
pub fn display_key(key: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bounds() {
        assert!(validate_key(b"a").is_ok());
        assert!(validate_key(&[7u8; MAX_KEY_LEN]).is_ok());
        assert!(matches!(
            validate_key(b""),
            Err(CairnError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_key(&[7u8; MAX_KEY_LEN + 1]),
            Err(CairnError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_display_key_lossy() {
        assert_eq!(display_key(b"user:1"), "user:1");
        assert_eq!(display_key(&[0xff, b'a']), "\u{fffd}a");
    }
}
