//! Items for use in a server.

mod ech;

pub use ech::{
    DecryptedInner, EchServerSession, EchServerState, PromotedHandshake, ServerNameDecision,
};
