//! Wire formats: the codec primitives, the slice of the ClientHello and
//! ServerHello that ECH touches, and ECH's own structures.
//!
//! Everything here parses through a bounds-checked [`codec::Reader`]; see
//! <https://langsec.org/ForWantOfANail-h2hc2014.pdf> for why.

#[macro_use]
mod macros;

pub mod base;
pub mod codec;
pub mod ech;
pub mod enums;
pub mod handshake;
pub mod inner_hello;
