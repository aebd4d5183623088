//! Game-state protocol codec.
//!
//! Encodes and decodes the authoritative replaceable record of a game and
//! builds the relay filters used to fetch it. Nothing here performs I/O.

pub mod event;
pub mod game_state;

pub use event::{find_tag, Event, Filter, Tag, UnsignedEvent};
pub use game_state::{
    advance, decode, encode, extract_game_id, extract_players, is_well_formed_record,
    latest_state_filter, metadata_filter, player_games_filter, CodecError, GameStateContent,
    GameStateRecord, CONTENT_VERSION, GAME_STATE_KIND, METADATA_KIND,
};
