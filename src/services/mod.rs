pub mod hls;
pub mod m3u_parser;
pub mod proxyfier;
pub mod refresh;
pub mod xtream;
