//! Domain types for battle state tracking

mod combatant;
mod conditions;
mod field;
mod move_log;
mod side;

pub use combatant::{Combatant, hp_percent};
pub use conditions::{SideCondition, SideConditionState};
pub use field::FieldState;
pub use move_log::{MOVE_LOG_CAPACITY, MoveEntry, MoveLog};
pub use side::SideState;
