//! Query helpers for decision making

mod legal;

pub use legal::{Action, LegalActions};
