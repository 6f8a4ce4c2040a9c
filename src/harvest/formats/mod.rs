//! Playlist output formats.
//!
//! Each format consumes the ordered [`HarvestResult`](crate::model::HarvestResult)
//! sequence together with the scanned items.

pub mod xspf;

pub use xspf::{XspfPlaylist, XspfTrack};
