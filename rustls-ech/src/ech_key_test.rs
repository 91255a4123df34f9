use std::string::ToString;
use std::vec::Vec;
use std::{format, vec};

use base64::prelude::*;

use super::*;
use crate::crypto::HPKE_PROVIDER;
use crate::msgs::enums::{HpkeAead, HpkeKdf, HpkeKem};
use crate::msgs::handshake::HpkeSymmetricCipherSuite;

// Two later-draft (0xfe0a) records, which this crate skips.
const CLOUDFLARE_V0A: &str = "AJD+CgBEAAAgACCLVO6NYnbfqTVUAx5GfKwpsOKDEukOz8AZ0SjArwqIGQAEAAEAAQAAABNjbG91ZGZsYXJlLWVzbmkuY29tAAD+CgBEAQAgACBnVG7W7IZfo30dizn+kATcrBRdEMEcPQF2dryg/i5UTAAEAAEAAQAAABNjbG91ZGZsYXJlLWVzbmkuY29tAAA=";

const X25519_SUITE: HpkeSuite = HpkeSuite {
    kem: HpkeKem::DHKEM_X25519_HKDF_SHA256,
    sym: HpkeSymmetricCipherSuite {
        kdf_id: HpkeKdf::HKDF_SHA256,
        aead_id: HpkeAead::AES_128_GCM,
    },
};

fn name(s: &str) -> DnsName {
    DnsName::try_from(s).unwrap()
}

fn binding(source: &str, secs: u64) -> EchKeyBinding {
    let pair = EchKeyPair::generate(HPKE_PROVIDER, X25519_SUITE).unwrap();
    let list = pair
        .config_list(name("public.example"), 32)
        .get_encoding();
    EchKeyBinding::new(source, &list, pair.private_key, Duration::from_secs(secs)).unwrap()
}

#[test]
fn generated_key_pairs_have_kem_sizes() {
    for (kem, pk_len, sk_len) in [
        (HpkeKem::DHKEM_X25519_HKDF_SHA256, 32, 32),
        (HpkeKem::DHKEM_P256_HKDF_SHA256, 65, 32),
        (HpkeKem::DHKEM_P384_HKDF_SHA384, 97, 48),
    ] {
        let suite = HpkeSuite {
            kem,
            ..X25519_SUITE
        };
        let pair = EchKeyPair::generate(HPKE_PROVIDER, suite).unwrap();
        assert_eq!(pair.public_key.0.len(), pk_len);
        assert_eq!(pair.private_key.secret_bytes().len(), sk_len);
        assert!(format!("{pair:?}").starts_with("EchKeyPair {"));
    }

    let unsupported = HpkeSuite {
        kem: HpkeKem::DHKEM_X448_HKDF_SHA512,
        ..X25519_SUITE
    };
    assert!(EchKeyPair::generate(HPKE_PROVIDER, unsupported).is_err());
}

#[test]
fn generated_binding_publishes_its_key() {
    let b = EchKeyBinding::generate("gen", HPKE_PROVIDER, X25519_SUITE, name("public.example"))
        .unwrap();
    assert_eq!(b.source(), "gen");
    assert_eq!(b.config_list().usable_count(), 1);

    let contents = b.config_list().usable().next().unwrap();
    assert_eq!(contents.public_name, name("public.example"));
    assert_eq!(contents.kem_id, HpkeKem::DHKEM_X25519_HKDF_SHA256);
    assert_eq!(contents.symmetric_cipher_suites, vec![X25519_SUITE.sym]);

    let reparsed = EchConfigList::from_bytes(&b.config_list_bytes()).unwrap();
    assert_eq!(&reparsed, b.config_list());
}

#[test]
fn binding_needs_a_usable_config() {
    let bytes = BASE64_STANDARD
        .decode(CLOUDFLARE_V0A)
        .unwrap();
    let err = EchKeyBinding::new("cf", &bytes, HpkePrivateKey::from(vec![1; 32]), Duration::ZERO)
        .unwrap_err();
    assert_eq!(err, Error::NoCompatibleConfig);

    assert!(
        EchKeyBinding::new("junk", &[0, 1], HpkePrivateKey::from(vec![1; 32]), Duration::ZERO)
            .is_err()
    );
}

#[test]
fn binding_debug_hides_the_key() {
    let b = binding("a", 1);
    let debug = format!("{b:?}");
    assert!(debug.starts_with("EchKeyBinding {"));
    assert!(!debug.contains("private_key"));
}

#[test]
fn outer_name_filter() {
    let open = binding("a", 1);
    assert!(open.accepts_outer_name(None));
    assert!(open.accepts_outer_name(Some(&name("anything.example"))));

    let pinned = binding("b", 1).with_outer_name(name("public.example"));
    assert!(pinned.accepts_outer_name(Some(&name("PUBLIC.example"))));
    assert!(!pinned.accepts_outer_name(Some(&name("other.example"))));
    assert!(!pinned.accepts_outer_name(None));

    let named = binding("c", 1).with_inner_name(name("hidden.example"));
    assert_eq!(named.inner_name(), Some(&name("hidden.example")));
    assert_eq!(named.outer_name(), None);
}

#[test]
fn reload_only_when_newer() {
    let store = EchKeyStore::new();
    assert!(store.is_empty());

    assert!(store.reload_if_newer(binding("a", 10)));
    assert!(store.reload_if_newer(binding("b", 10)));
    assert_eq!(store.len(), 2);

    let old = store.snapshot();

    // same age: kept
    assert!(!store.reload_if_newer(binding("a", 10)));
    // older: kept
    assert!(!store.reload_if_newer(binding("a", 5)));
    assert!(Arc::ptr_eq(&old, &store.snapshot()));

    // newer: replaced in place
    assert!(store.reload_if_newer(binding("a", 20)));
    let new = store.snapshot();
    assert_eq!(new.len(), 2);
    assert_eq!(new[0].source(), "a");
    assert_eq!(new[0].loaded_at(), Duration::from_secs(20));
    assert_eq!(new[1].source(), "b");

    // the old snapshot is untouched
    assert_eq!(old[0].loaded_at(), Duration::from_secs(10));
}

#[test]
fn superseded_keys_live_while_snapshots_do() {
    let store = EchKeyStore::from_bindings(vec![binding("a", 1)]);
    let held = store.snapshot();
    let key = Arc::clone(held[0].private_key());
    assert_eq!(Arc::strong_count(&key), 2);

    assert!(store.reload_if_newer(binding("a", 2)));
    assert_eq!(Arc::strong_count(&key), 2);

    drop(held);
    assert_eq!(Arc::strong_count(&key), 1);
}

#[test]
fn flush_drops_old_bindings() {
    let store = EchKeyStore::default();
    store.add(binding("a", 10));
    store.add(binding("b", 20));
    store.add(binding("c", 30));

    assert_eq!(store.flush_older_than(Duration::from_secs(20)), 1);
    let left = store
        .snapshot()
        .iter()
        .map(|b| b.source().to_string())
        .collect::<Vec<_>>();
    assert_eq!(left, vec!["b", "c"]);

    let before = store.snapshot();
    assert_eq!(store.flush_older_than(Duration::from_secs(5)), 0);
    assert!(Arc::ptr_eq(&before, &store.snapshot()));

    // far in the past relative to now
    assert_eq!(store.flush_older_than_age(Duration::from_secs(60)), 2);
    assert!(store.is_empty());
}

#[test]
fn fresh_bindings_survive_an_age_flush() {
    let store = EchKeyStore::new();
    store.add(
        EchKeyBinding::generate("now", HPKE_PROVIDER, X25519_SUITE, name("public.example"))
            .unwrap(),
    );
    assert_eq!(store.flush_older_than_age(Duration::from_secs(3600)), 0);
    assert_eq!(store.len(), 1);
}
