pub mod health;
pub mod proxy;
pub mod tracks;
pub mod xtream;
