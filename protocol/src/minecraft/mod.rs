mod player;

pub use player::{Player, PlayerAction, PlayerActionKind};
