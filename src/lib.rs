//! Deterministic 7 Wonders Duel engine with an MCTS decision core.
//!
//! Three pieces: a cheaply copyable rules engine (`game`), two tree
//! searchers over root-level determinizations (`strategies::mcts`), and a
//! parallel self-play driver producing training datasets (`tournament`).
//! Network inference is abstracted behind `net`; loading weights is the
//! caller's job.

pub mod game;
pub mod net;
pub mod strategies;
pub mod tournament;
