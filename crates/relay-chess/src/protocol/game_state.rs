//! Authoritative game-state records (replaceable events of kind 30005).
//!
//! Each move replaces the previous record for the same `d` tag. The content is
//! a JSON object carrying the current position, the PGN-like history and a
//! move counter that only moves forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::event::{find_tag, Event, Filter, Tag, UnsignedEvent};
use crate::rules::{moves_from_pgn, validate_move_sequence, Replay, RulesError, SequenceError};
use crate::types::chess::Position;
use crate::types::game::{GameId, GameResult, PlayerKey};

/// Event kind of a game-state record.
pub const GAME_STATE_KIND: u16 = 30005;

/// Event kind of profile metadata.
pub const METADATA_KIND: u16 = 0;

/// Content format version written by this crate.
pub const CONTENT_VERSION: &str = "1";

/// Failure while decoding a game-state record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed game state content: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("game state content is missing `{field}`")]
    MissingField { field: &'static str },

    #[error("game state event is missing the `{tag}` tag")]
    MissingTag { tag: &'static str },

    #[error("expected a game state event (kind 30005), got kind {kind}")]
    WrongKind { kind: u16 },

    #[error("game state carries an invalid position: {0}")]
    MalformedPosition(#[from] RulesError),

    #[error("game history does not replay: {0}")]
    InvalidHistory(#[from] SequenceError),

    #[error("game history ends at {replayed}, record claims {claimed}")]
    HistoryMismatch { replayed: String, claimed: String },
}

/// JSON content of a game-state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateContent {
    pub version: String,
    pub fen: String,
    pub pgn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move: Option<String>,
    pub move_number: u32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
}

impl GameStateContent {
    /// Content for a game that has not started yet.
    #[must_use]
    pub fn new_game() -> Self {
        Self {
            version: CONTENT_VERSION.to_string(),
            fen: Position::STARTING_FEN.to_string(),
            pgn: String::new(),
            last_move: None,
            move_number: 0,
            timestamp: Utc::now().timestamp_millis(),
            result: Some(GameResult::Ongoing),
        }
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    version: Option<String>,
    fen: Option<String>,
    pgn: Option<String>,
    last_move: Option<String>,
    move_number: Option<u32>,
    timestamp: Option<i64>,
    result: Option<GameResult>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, CodecError> {
    value.ok_or(CodecError::MissingField { field })
}

/// Build the unsigned record for `content`.
///
/// `content.move_number` must already be incremented. The record is authored
/// by `white`; `started_at` (seconds) defaults to now.
pub fn encode(
    game_id: &GameId,
    white: &PlayerKey,
    black: &PlayerKey,
    content: &GameStateContent,
    started_at: Option<i64>,
) -> Result<UnsignedEvent, CodecError> {
    let now = Utc::now().timestamp();
    let started = started_at.unwrap_or(now);
    let tags: Vec<Tag> = vec![
        vec!["d".into(), game_id.to_string()],
        vec!["white".into(), white.to_string()],
        vec!["black".into(), black.to_string()],
        vec!["started".into(), started.to_string()],
    ];
    Ok(UnsignedEvent {
        pubkey: white.to_string(),
        created_at: now,
        kind: GAME_STATE_KIND,
        tags,
        content: content.to_json()?,
    })
}

/// Parse record content.
///
/// `version` and `fen` must be present and non-empty; `pgn` must be present
/// but is empty before the first move. A missing `moveNumber` reads as 0 and
/// a missing `timestamp` as now.
pub fn decode(raw: &str) -> Result<GameStateContent, CodecError> {
    let parsed: RawContent = serde_json::from_str(raw)?;
    let version = required(parsed.version.filter(|v| !v.is_empty()), "version")?;
    let fen = required(parsed.fen.filter(|f| !f.is_empty()), "fen")?;
    let pgn = required(parsed.pgn, "pgn")?;
    Ok(GameStateContent {
        version,
        fen,
        pgn,
        last_move: parsed.last_move,
        move_number: parsed.move_number.unwrap_or(0),
        timestamp: parsed
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp_millis()),
        result: parsed.result,
    })
}

/// Content after one more move.
///
/// `move_number` goes up by exactly one and `timestamp` is set to now. The
/// previous result is kept unless `termination` supplies a new one.
#[must_use]
pub fn advance(
    prev: &GameStateContent,
    new_position: &Position,
    new_move: &str,
    new_history: &str,
    termination: Option<GameResult>,
) -> GameStateContent {
    GameStateContent {
        version: CONTENT_VERSION.to_string(),
        fen: new_position.to_string(),
        pgn: new_history.to_string(),
        last_move: Some(new_move.to_string()),
        move_number: prev.move_number.saturating_add(1),
        timestamp: Utc::now().timestamp_millis(),
        result: termination.or(prev.result).or(Some(GameResult::Ongoing)),
    }
}

/// Filter for the newest record of `game_id`.
#[must_use]
pub fn latest_state_filter(game_id: &GameId) -> Filter {
    Filter {
        kinds: vec![GAME_STATE_KIND],
        d_tags: Some(vec![game_id.to_string()]),
        limit: Some(1),
        ..Default::default()
    }
}

/// Filter for every record authored by `pubkey`.
#[must_use]
pub fn player_games_filter(pubkey: &PlayerKey) -> Filter {
    Filter {
        kinds: vec![GAME_STATE_KIND],
        authors: Some(vec![pubkey.to_string()]),
        ..Default::default()
    }
}

/// Filter for the profile metadata of `pubkeys`.
#[must_use]
pub fn metadata_filter<'a, I>(pubkeys: I) -> Filter
where
    I: IntoIterator<Item = &'a PlayerKey>,
{
    let authors: Vec<String> = pubkeys.into_iter().map(ToString::to_string).collect();
    Filter {
        kinds: vec![METADATA_KIND],
        limit: Some(authors.len()),
        authors: Some(authors),
        ..Default::default()
    }
}

/// True iff `event` is a game-state record carrying `d`, `white` and `black`
/// tags.
#[must_use]
pub fn is_well_formed_record(event: &Event) -> bool {
    event.kind == GAME_STATE_KIND
        && ["d", "white", "black"]
            .iter()
            .all(|name| event.tags.iter().any(|t| t.first().map(String::as_str) == Some(*name)))
}

#[must_use]
pub fn extract_game_id(event: &Event) -> Option<GameId> {
    event.tag("d").map(GameId::new)
}

/// White and black keys, if both tags are present.
#[must_use]
pub fn extract_players(event: &Event) -> Option<(PlayerKey, PlayerKey)> {
    let white = find_tag(&event.tags, "white")?;
    let black = find_tag(&event.tags, "black")?;
    Some((PlayerKey::new(white), PlayerKey::new(black)))
}

/// A decoded and validated game-state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateRecord {
    pub game_id: GameId,
    pub white: PlayerKey,
    pub black: PlayerKey,
    pub position: Position,
    pub move_history: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move: Option<String>,
    pub move_number: u32,
    pub updated_at: DateTime<Utc>,
    pub result: GameResult,
    /// Seconds since the Unix epoch, from the `started` tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
}

impl GameStateRecord {
    /// Decode a relay event, checking kind, tags, content and position.
    pub fn from_event(event: &Event) -> Result<Self, CodecError> {
        if event.kind != GAME_STATE_KIND {
            return Err(CodecError::WrongKind { kind: event.kind });
        }
        let game_id = extract_game_id(event).ok_or(CodecError::MissingTag { tag: "d" })?;
        let white = event.tag("white").ok_or(CodecError::MissingTag { tag: "white" })?;
        let black = event.tag("black").ok_or(CodecError::MissingTag { tag: "black" })?;
        let started_at = event.tag("started").and_then(|s| s.parse().ok());

        let content = decode(&event.content)?;
        let mut record = Self::from_content(
            game_id,
            PlayerKey::new(white),
            PlayerKey::new(black),
            &content,
        )?;
        record.started_at = started_at;
        Ok(record)
    }

    /// Build a record from already-decoded content.
    pub fn from_content(
        game_id: GameId,
        white: PlayerKey,
        black: PlayerKey,
        content: &GameStateContent,
    ) -> Result<Self, CodecError> {
        let position = Position::parse(&content.fen)?;
        let updated_at = DateTime::from_timestamp_millis(content.timestamp)
            .ok_or(CodecError::MissingField { field: "timestamp" })?;
        Ok(Self {
            game_id,
            white,
            black,
            position,
            move_history: content.pgn.clone(),
            last_move: content.last_move.clone(),
            move_number: content.move_number,
            updated_at,
            result: content.result.unwrap_or_default(),
            started_at: None,
        })
    }

    #[must_use]
    pub fn to_content(&self) -> GameStateContent {
        GameStateContent {
            version: CONTENT_VERSION.to_string(),
            fen: self.position.to_string(),
            pgn: self.move_history.clone(),
            last_move: self.last_move.clone(),
            move_number: self.move_number,
            timestamp: self.updated_at.timestamp_millis(),
            result: Some(self.result),
        }
    }

    /// Replay the claimed history from the initial position and require it to
    /// reach the claimed position.
    pub fn verify_history(&self) -> Result<Replay, CodecError> {
        let replay = validate_move_sequence(moves_from_pgn(&self.move_history), None)?;
        let reached = replay.position();
        if !reached.same_board(&self.position) {
            return Err(CodecError::HistoryMismatch {
                replayed: reached.to_string(),
                claimed: self.position.to_string(),
            });
        }
        Ok(replay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    fn players() -> (GameId, PlayerKey, PlayerKey) {
        (GameId::new("game-1"), PlayerKey::new("white-pk"), PlayerKey::new("black-pk"))
    }

    fn signed(content: &GameStateContent) -> Event {
        let (id, white, black) = players();
        encode(&id, &white, &black, content, Some(1_700_000_000))
            .unwrap()
            .into_signed("event-id", "sig")
    }

    #[test]
    fn encode_sets_tags_and_author() {
        let (id, white, black) = players();
        let event = encode(&id, &white, &black, &GameStateContent::new_game(), Some(123)).unwrap();
        assert_eq!(event.kind, GAME_STATE_KIND);
        assert_eq!(event.pubkey, "white-pk");
        assert_eq!(
            event.tags,
            vec![
                vec!["d".to_string(), "game-1".to_string()],
                vec!["white".to_string(), "white-pk".to_string()],
                vec!["black".to_string(), "black-pk".to_string()],
                vec!["started".to_string(), "123".to_string()],
            ]
        );
    }

    #[test]
    fn decode_accepts_new_game_content() {
        let content = GameStateContent::new_game();
        let decoded = decode(&content.to_json().unwrap()).unwrap();
        assert_eq!(decoded, content);
        assert_eq!(decoded.pgn, "");
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let err = decode(r#"{"fen":"x","pgn":"","moveNumber":0,"timestamp":0}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingField { field: "version" }));

        let err = decode(r#"{"version":"1","fen":"","pgn":"","moveNumber":0,"timestamp":0}"#)
            .unwrap_err();
        assert!(matches!(err, CodecError::MissingField { field: "fen" }));

        let err = decode(r#"{"version":"1","fen":"x","moveNumber":0,"timestamp":0}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingField { field: "pgn" }));

        assert!(matches!(decode("not json"), Err(CodecError::InvalidJson(_))));
    }

    #[test]
    fn decode_defaults_counter_and_timestamp() {
        let before = Utc::now().timestamp_millis();
        let decoded = decode(&format!(
            r#"{{"version":"1","fen":"{}","pgn":""}}"#,
            Position::STARTING_FEN
        ))
        .unwrap();
        assert_eq!(decoded.move_number, 0);
        assert!(decoded.timestamp >= before);
        assert_eq!(decoded.last_move, None);
    }

    #[test]
    fn advance_increments_and_keeps_result() {
        let prev = GameStateContent::new_game();
        let position = Position::parse(AFTER_E4).unwrap();
        let next = advance(&prev, &position, "e2e4", "1. e4", None);
        assert_eq!(next.move_number, prev.move_number + 1);
        assert_eq!(next.fen, AFTER_E4);
        assert_eq!(next.last_move.as_deref(), Some("e2e4"));
        assert_eq!(next.result, Some(GameResult::Ongoing));

        let finished = advance(&next, &position, "d8h4", "1. e4", Some(GameResult::Black));
        assert_eq!(finished.result, Some(GameResult::Black));
        let after = advance(&finished, &position, "x", "1. e4", None);
        assert_eq!(after.result, Some(GameResult::Black));
    }

    #[test]
    fn filters() {
        let (id, white, black) = players();
        let latest = latest_state_filter(&id);
        assert_eq!(latest.kinds, vec![GAME_STATE_KIND]);
        assert_eq!(latest.d_tags, Some(vec!["game-1".to_string()]));
        assert_eq!(latest.limit, Some(1));

        let games = player_games_filter(&white);
        assert_eq!(games.authors, Some(vec!["white-pk".to_string()]));
        assert_eq!(games.limit, None);

        let meta = metadata_filter([&white, &black]);
        assert_eq!(meta.kinds, vec![METADATA_KIND]);
        assert_eq!(meta.limit, Some(2));
        assert_eq!(meta.authors.map(|a| a.len()), Some(2));
    }

    #[test]
    fn well_formed_record_needs_all_tags() {
        let mut event = signed(&GameStateContent::new_game());
        assert!(is_well_formed_record(&event));
        assert_eq!(extract_game_id(&event), Some(GameId::new("game-1")));
        assert_eq!(
            extract_players(&event),
            Some((PlayerKey::new("white-pk"), PlayerKey::new("black-pk")))
        );

        event.tags.retain(|t| t[0] != "black");
        assert!(!is_well_formed_record(&event));
        assert_eq!(extract_players(&event), None);

        let mut other_kind = signed(&GameStateContent::new_game());
        other_kind.kind = 1;
        assert!(!is_well_formed_record(&other_kind));
    }

    #[test]
    fn record_from_event() {
        let content = advance(
            &GameStateContent::new_game(),
            &Position::parse(AFTER_E4).unwrap(),
            "e2e4",
            "1. e4",
            None,
        );
        let record = GameStateRecord::from_event(&signed(&content)).unwrap();
        assert_eq!(record.game_id, GameId::new("game-1"));
        assert_eq!(record.move_number, 1);
        assert_eq!(record.position.as_str(), AFTER_E4);
        assert_eq!(record.started_at, Some(1_700_000_000));
        assert_eq!(record.result, GameResult::Ongoing);
        assert_eq!(record.to_content().move_number, 1);
    }

    #[test]
    fn record_from_event_rejects_bad_input() {
        let mut wrong_kind = signed(&GameStateContent::new_game());
        wrong_kind.kind = 1;
        assert!(matches!(
            GameStateRecord::from_event(&wrong_kind),
            Err(CodecError::WrongKind { kind: 1 })
        ));

        let mut no_d = signed(&GameStateContent::new_game());
        no_d.tags.remove(0);
        assert!(matches!(
            GameStateRecord::from_event(&no_d),
            Err(CodecError::MissingTag { tag: "d" })
        ));

        let mut bad_fen = GameStateContent::new_game();
        bad_fen.fen = "not a fen".into();
        assert!(matches!(
            GameStateRecord::from_event(&signed(&bad_fen)),
            Err(CodecError::MalformedPosition(_))
        ));
    }

    #[test]
    fn verify_history_replays_pgn() {
        let content = advance(
            &GameStateContent::new_game(),
            &Position::parse(AFTER_E4).unwrap(),
            "e2e4",
            "1. e4",
            None,
        );
        let record = GameStateRecord::from_event(&signed(&content)).unwrap();
        let replay = record.verify_history().unwrap();
        assert_eq!(replay.moves(), ["e4"]);

        let mut lying = record.clone();
        lying.move_history = "1. d4".into();
        assert!(matches!(
            lying.verify_history(),
            Err(CodecError::HistoryMismatch { .. })
        ));

        lying.move_history = "1. e5".into();
        assert!(matches!(
            lying.verify_history(),
            Err(CodecError::InvalidHistory(SequenceError::IllegalMove { index: 1, .. }))
        ));
    }
}
