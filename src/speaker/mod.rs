// File: src/speaker/mod.rs
//
// Routing speaker: state and neighbor set in `types`, the updates it emits in
// `events`, route processing in `manager`.

mod events;
mod manager;
mod types;


pub use events::Update;
pub use types::{Speaker, SpeakerBuilder, SpeakerState};
