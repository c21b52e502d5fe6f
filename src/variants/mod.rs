//! Board configurations for the generic video engine.
//!
//! A variant never touches engine internals: it only picks dimensions and
//! binds hooks into a fresh [`VideoHooks`](crate::video::VideoHooks).

pub mod powerins;
