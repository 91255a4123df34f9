//! DNS name validation according to RFC1035, but with underscores allowed.
use alloc::string::String;
use core::fmt;
use core::hash::{Hash, Hasher};

/// An owned, syntactically valid DNS name.
///
/// The name keeps the spelling it was made from, so that a `public_name`
/// re-encodes exactly as published. Comparison ignores ASCII case and a
/// trailing dot.
#[derive(Clone, Debug)]
pub struct DnsName(String);

impl DnsName {
    /// Validate the given bytes are a DNS name if they are viewed as ASCII.
    pub fn try_from_ascii(bytes: &[u8]) -> Result<Self, InvalidDnsNameError> {
        validate(bytes)?;
        // validated bytes are ASCII
        let name = core::str::from_utf8(bytes).map_err(|_| InvalidDnsNameError)?;
        Ok(Self(String::from(name)))
    }

    /// The name without any trailing dot, as it is sent in `server_name`.
    pub fn without_trailing_dot(&self) -> &str {
        self.0.strip_suffix('.').unwrap_or(&self.0)
    }

    /// Length in bytes of the name as it appears in `server_name`.
    pub fn wire_len(&self) -> usize {
        self.without_trailing_dot().len()
    }
}

impl PartialEq for DnsName {
    fn eq(&self, other: &Self) -> bool {
        self.without_trailing_dot()
            .eq_ignore_ascii_case(other.without_trailing_dot())
    }
}

impl Eq for DnsName {}

impl Hash for DnsName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.without_trailing_dot().bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl TryFrom<String> for DnsName {
    type Error = InvalidDnsNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate(value.as_bytes())?;
        Ok(Self(value))
    }
}

impl TryFrom<&str> for DnsName {
    type Error = InvalidDnsNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(String::from(value))
    }
}

impl AsRef<str> for DnsName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The input is not a syntactically valid host name.
#[derive(Debug, PartialEq)]
pub struct InvalidDnsNameError;

impl fmt::Display for InvalidDnsNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid dns name")
    }
}

impl core::error::Error for InvalidDnsNameError {}

/// Longest name accepted, in bytes, trailing dot included.
const MAX_NAME_LEN: usize = 253;

/// Longest label accepted, in bytes.
const MAX_LABEL_LEN: usize = 63;

fn validate(input: &[u8]) -> Result<(), InvalidDnsNameError> {
    if input.len() > MAX_NAME_LEN {
        return Err(InvalidDnsNameError);
    }

    // One trailing dot marks an absolute name.
    let name = input.strip_suffix(b".").unwrap_or(input);

    let mut last_numeric = true;
    for label in name.split(|b| *b == b'.') {
        if !valid_label(label) {
            return Err(InvalidDnsNameError);
        }
        last_numeric = label.iter().all(u8::is_ascii_digit);
    }

    // An all-digit final label would make this an IP address.
    match last_numeric {
        true => Err(InvalidDnsNameError),
        false => Ok(()),
    }
}

fn valid_label(label: &[u8]) -> bool {
    match (label.first(), label.last()) {
        (Some(b'-'), _) | (_, Some(b'-')) | (None, _) => false,
        _ => {
            label.len() <= MAX_LABEL_LEN
                && label
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'))
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use std::println;

    use super::*;

    #[test]
    fn accepts_host_names() {
        for name in [
            "localhost",
            "PUBLIC.example",
            "cloudflare-esni.com",
            "fully.qualified.",
            "_service.example",
            "10.in-addr.example",
            "a-b_c.d",
        ] {
            println!("{name}");
            assert!(DnsName::try_from(name).is_ok());
        }
    }

    #[test]
    fn rejects_non_names() {
        let long_label = "x".repeat(64) + ".example";
        let long_name = "abcdefghi.".repeat(25) + "example";
        for name in [
            "",
            ".",
            "double..dot",
            "trailing.dots..",
            ".leading",
            "-leading-hyphen.example",
            "trailing-hyphen-.example",
            "192.0.2.1",
            "final.label.42",
            "spa ce.example",
            "caf\u{e9}.example",
            long_label.as_str(),
            long_name.as_str(),
        ] {
            println!("{name:?}");
            assert!(DnsName::try_from(name).is_err());
        }
        assert!(DnsName::try_from("x".repeat(63) + ".example").is_ok());
    }

    #[test]
    fn spelling_is_kept_but_not_compared() {
        let name = DnsName::try_from("Public.Example.COM").unwrap();
        assert_eq!(name.as_ref(), "Public.Example.COM");
        assert_eq!(name, DnsName::try_from("public.example.com").unwrap());
        assert_eq!(name, DnsName::try_from("public.example.com.").unwrap());
        assert_ne!(name, DnsName::try_from("public.example.co").unwrap());

        let mut set = std::collections::HashSet::new();
        set.insert(name);
        assert!(set.contains(&DnsName::try_from("PUBLIC.example.com.").unwrap()));
    }

    #[test]
    fn trailing_dot_is_not_on_the_wire() {
        let name = DnsName::try_from("example.com.").unwrap();
        assert_eq!(name.without_trailing_dot(), "example.com");
        assert_eq!(name.wire_len(), 11);
    }

    #[test]
    fn try_from_ascii_rejects_bad_utf8() {
        assert_eq!(
            format!("{:?}", DnsName::try_from_ascii(b"\x80")),
            "Err(InvalidDnsNameError)"
        );
    }

    #[test]
    fn error_is_display() {
        assert_eq!(format!("{}", InvalidDnsNameError), "invalid dns name");
    }
}
