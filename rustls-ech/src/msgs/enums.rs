#![allow(clippy::upper_case_acronyms)]
#![allow(non_camel_case_types)]

enum_builder! {
    /// The `HandshakeType` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognised ordinals.
    #[repr(u8)]
    pub enum HandshakeType {
        ClientHello => 0x01,
        ServerHello => 0x02,
        MessageHash => 0xfe,
    }
}

enum_builder! {
    /// The `ProtocolVersion` TLS protocol enum.
    #[repr(u16)]
    pub enum ProtocolVersion {
        TLSv1_0 => 0x0301,
        TLSv1_2 => 0x0303,
        TLSv1_3 => 0x0304,
    }
}

enum_builder! {
    /// The `CipherSuite` TLS protocol enum.  Only the TLS1.3 suites are
    /// named; the codec carries everything else as `Unknown`.
    #[repr(u16)]
    pub enum CipherSuite {
        TLS13_AES_128_GCM_SHA256 => 0x1301,
        TLS13_AES_256_GCM_SHA384 => 0x1302,
        TLS13_CHACHA20_POLY1305_SHA256 => 0x1303,
        TLS_EMPTY_RENEGOTIATION_INFO_SCSV => 0x00ff,
    }
}

enum_builder! {
    /// The `Compression` TLS protocol enum.
    #[repr(u8)]
    pub enum Compression {
        Null => 0x00,
    }
}

enum_builder! {
    /// The `ServerNameType` TLS protocol enum.
    #[repr(u8)]
    pub enum ServerNameType {
        HostName => 0x00,
    }
}

enum_builder! {
    /// The `ExtensionType` TLS protocol enum.  Only the code points the ECH
    /// compression policy has an opinion about are named; everything else is
    /// carried as `Unknown`.
    #[repr(u16)]
    pub enum ExtensionType {
        ServerName => 0x0000,
        MaxFragmentLength => 0x0001,
        StatusRequest => 0x0005,
        EllipticCurves => 0x000a,
        ECPointFormats => 0x000b,
        SRP => 0x000c,
        SignatureAlgorithms => 0x000d,
        ALProtocolNegotiation => 0x0010,
        Padding => 0x0015,
        ExtendedMasterSecret => 0x0017,
        SessionTicket => 0x0023,
        PreSharedKey => 0x0029,
        EarlyData => 0x002a,
        SupportedVersions => 0x002b,
        Cookie => 0x002c,
        PSKKeyExchangeModes => 0x002d,
        KeyShare => 0x0033,
        EncryptedClientHelloOuterExtensions => 0xfd00,
        EncryptedClientHello => 0xfe09,
        RenegotiationInfo => 0xff01,
    }
}

enum_builder! {
    /// The Key Encapsulation Mechanism (`Kem`) type for HPKE operations.
    /// Listed by IANA, as specified in [RFC 9180 Section 7.1]
    ///
    /// [RFC 9180 Section 7.1]: <https://datatracker.ietf.org/doc/html/rfc9180#kemid-values>
    #[repr(u16)]
    pub enum HpkeKem {
        DHKEM_P256_HKDF_SHA256 => 0x0010,
        DHKEM_P384_HKDF_SHA384 => 0x0011,
        DHKEM_P521_HKDF_SHA512 => 0x0012,
        DHKEM_X25519_HKDF_SHA256 => 0x0020,
        DHKEM_X448_HKDF_SHA512 => 0x0021,
    }
}

enum_builder! {
    /// The Key Derivation Function (`Kdf`) type for HPKE operations.
    /// Listed by IANA, as specified in [RFC 9180 Section 7.2]
    ///
    /// [RFC 9180 Section 7.2]: <https://datatracker.ietf.org/doc/html/rfc9180#name-key-derivation-functions-kd>
    #[repr(u16)]
    pub enum HpkeKdf {
        HKDF_SHA256 => 0x0001,
        HKDF_SHA384 => 0x0002,
        HKDF_SHA512 => 0x0003,
    }
}

impl Default for HpkeKdf {
    fn default() -> Self {
        Self::HKDF_SHA256
    }
}

enum_builder! {
    /// The Authenticated Encryption with Associated Data (`Aead`) type for HPKE operations.
    /// Listed by IANA, as specified in [RFC 9180 Section 7.3]
    ///
    /// [RFC 9180 Section 7.3]: <https://datatracker.ietf.org/doc/html/rfc9180#name-authenticated-encryption-wi>
    #[repr(u16)]
    pub enum HpkeAead {
        AES_128_GCM => 0x0001,
        AES_256_GCM => 0x0002,
        CHACHA20_POLY_1305 => 0x0003,
        EXPORT_ONLY => 0xffff,
    }
}

impl Default for HpkeAead {
    fn default() -> Self {
        Self::AES_128_GCM
    }
}

impl HpkeAead {
    /// Returns the length of the tag for the AEAD algorithm, or none if the AEAD is EXPORT_ONLY.
    pub(crate) fn tag_len(&self) -> Option<usize> {
        match self {
            // See RFC 9180 Section 7.3, column `Nt`, the length in bytes of the authentication tag
            // for the algorithm.
            // https://www.rfc-editor.org/rfc/rfc9180.html#section-7.3
            Self::AES_128_GCM | Self::AES_256_GCM | Self::CHACHA20_POLY_1305 => Some(16),
            _ => None,
        }
    }
}

enum_builder! {
    /// The Encrypted Client Hello protocol version (`EchVersion`).
    ///
    /// Specified in [draft-ietf-tls-esni-09 Section 4].
    ///
    /// [draft-ietf-tls-esni-09 Section 4]: <https://www.ietf.org/archive/id/draft-ietf-tls-esni-09.html#section-4>
    #[repr(u16)]
    pub enum EchVersion {
        V09 => 0xfe09,
    }
}
