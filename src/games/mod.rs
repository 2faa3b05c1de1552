pub mod types;
pub mod grid;
pub mod pairs;
pub mod combat;
pub mod engine;
pub mod opponent;

pub use types::*;
pub use engine::{GameEngine, SessionHandle};
pub use opponent::{ComputerOpponent, MoveSource};
