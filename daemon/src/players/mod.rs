mod roster;

pub use roster::PlayerRoster;
