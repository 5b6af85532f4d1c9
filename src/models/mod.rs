pub mod playlist;

pub use playlist::{Playlist, Tag, Track, TrackConfig};
