//! Chess value types wrapping shakmaty.
//!
//! These are the serializable, validated types that cross module and crate
//! boundaries: colors, squares, moves and FEN positions.

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};

use crate::rules::RulesError;

/// Chess piece color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// White pieces.
    White,
    /// Black pieces.
    Black,
}

impl Color {
    /// Get the opposite color.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Returns true if this is white.
    #[must_use]
    pub const fn is_white(self) -> bool {
        matches!(self, Self::White)
    }

    /// The FEN side-to-move character.
    #[must_use]
    pub const fn fen_char(self) -> char {
        match self {
            Self::White => 'w',
            Self::Black => 'b',
        }
    }
}

impl From<shakmaty::Color> for Color {
    fn from(c: shakmaty::Color) -> Self {
        match c {
            shakmaty::Color::White => Self::White,
            shakmaty::Color::Black => Self::Black,
        }
    }
}

impl From<Color> for shakmaty::Color {
    fn from(c: Color) -> Self {
        match c {
            Color::White => Self::White,
            Color::Black => Self::Black,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// Chess piece type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceType {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceType {
    /// Lowercase letter used for promotions in coordinate notation.
    #[must_use]
    pub const fn char(self) -> char {
        match self {
            Self::Pawn => 'p',
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
            Self::King => 'k',
        }
    }

    /// Parse a promotion letter (`q`, `r`, `b`, `n`, case-insensitive).
    #[must_use]
    pub fn from_promotion_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'q' => Some(Self::Queen),
            'r' => Some(Self::Rook),
            'b' => Some(Self::Bishop),
            'n' => Some(Self::Knight),
            _ => None,
        }
    }
}

impl From<shakmaty::Role> for PieceType {
    fn from(r: shakmaty::Role) -> Self {
        match r {
            shakmaty::Role::Pawn => Self::Pawn,
            shakmaty::Role::Knight => Self::Knight,
            shakmaty::Role::Bishop => Self::Bishop,
            shakmaty::Role::Rook => Self::Rook,
            shakmaty::Role::Queen => Self::Queen,
            shakmaty::Role::King => Self::King,
        }
    }
}

impl From<PieceType> for shakmaty::Role {
    fn from(p: PieceType) -> Self {
        match p {
            PieceType::Pawn => Self::Pawn,
            PieceType::Knight => Self::Knight,
            PieceType::Bishop => Self::Bishop,
            PieceType::Rook => Self::Rook,
            PieceType::Queen => Self::Queen,
            PieceType::King => Self::King,
        }
    }
}

impl std::fmt::Display for PieceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pawn => write!(f, "pawn"),
            Self::Knight => write!(f, "knight"),
            Self::Bishop => write!(f, "bishop"),
            Self::Rook => write!(f, "rook"),
            Self::Queen => write!(f, "queen"),
            Self::King => write!(f, "king"),
        }
    }
}

/// A chess piece with color and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub piece_type: PieceType,
}

impl From<shakmaty::Piece> for Piece {
    fn from(p: shakmaty::Piece) -> Self {
        Self {
            color: p.color.into(),
            piece_type: p.role.into(),
        }
    }
}

/// A square on the chess board (a1-h8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    /// Create a square from file (0-7) and rank (0-7).
    #[must_use]
    pub const fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Self(rank * 8 + file))
        } else {
            None
        }
    }

    /// Get the file (0-7, a-h).
    #[must_use]
    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    /// Get the rank (0-7, 1-8).
    #[must_use]
    pub const fn rank(self) -> u8 {
        self.0 / 8
    }
}

impl From<shakmaty::Square> for Square {
    fn from(s: shakmaty::Square) -> Self {
        Self(s as u8)
    }
}

impl From<Square> for shakmaty::Square {
    fn from(s: Square) -> Self {
        // Square is always in the range 0-63.
        Self::new(u32::from(s.0))
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let file = (b'a' + self.file()) as char;
        let rank = (b'1' + self.rank()) as char;
        write!(f, "{file}{rank}")
    }
}

impl std::str::FromStr for Square {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let file = chars.next().ok_or("missing file")?;
        let rank = chars.next().ok_or("missing rank")?;
        if chars.next().is_some() {
            return Err("square must be 2 characters");
        }

        if !('a'..='h').contains(&file) {
            return Err("file must be a-h");
        }
        if !('1'..='8').contains(&rank) {
            return Err("rank must be 1-8");
        }

        let file_idx = (file as u8) - b'a';
        let rank_idx = (rank as u8) - b'1';

        Self::new(file_idx, rank_idx).ok_or("invalid square")
    }
}

impl Serialize for Square {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Square {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A proposed move: origin, destination and optional promotion piece.
///
/// Origin and destination always differ. Legality is only known relative to
/// a [`Position`]; see [`crate::rules::validate_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMove")]
pub struct Move {
    from: Square,
    to: Square,
    #[serde(skip_serializing_if = "Option::is_none")]
    promotion: Option<PieceType>,
}

#[derive(Deserialize)]
struct RawMove {
    from: Square,
    to: Square,
    #[serde(default)]
    promotion: Option<PieceType>,
}

impl TryFrom<RawMove> for Move {
    type Error = RulesError;

    fn try_from(raw: RawMove) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.from, raw.to)?.with_promotion(raw.promotion))
    }
}

impl Move {
    /// Create a move between two distinct squares.
    pub fn new(from: Square, to: Square) -> Result<Self, RulesError> {
        if from == to {
            return Err(RulesError::InvalidMove {
                notation: format!("{from}{to}"),
                reason: "origin and destination are the same square".to_string(),
            });
        }
        Ok(Self {
            from,
            to,
            promotion: None,
        })
    }

    /// Set (or clear) the promotion piece.
    #[must_use]
    pub const fn with_promotion(mut self, promotion: Option<PieceType>) -> Self {
        self.promotion = promotion;
        self
    }

    #[must_use]
    pub const fn from(&self) -> Square {
        self.from
    }

    #[must_use]
    pub const fn to(&self) -> Square {
        self.to
    }

    #[must_use]
    pub const fn promotion(&self) -> Option<PieceType> {
        self.promotion
    }

    /// Coordinate (UCI) notation, e.g. `e2e4` or `e7e8q`.
    #[must_use]
    pub fn uci(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion.char())?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Move {
    type Err = RulesError;

    /// Parse coordinate notation (`e2e4`, `e7e8q`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| RulesError::InvalidMove {
            notation: s.to_string(),
            reason: reason.to_string(),
        };
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(invalid("coordinate move must be 4-5 characters"));
        }
        let from: Square = s[0..2].parse().map_err(invalid)?;
        let to: Square = s[2..4].parse().map_err(invalid)?;
        let promotion = match s[4..].chars().next() {
            Some(c) => Some(
                PieceType::from_promotion_char(c)
                    .ok_or_else(|| invalid("promotion must be q, r, b, or n"))?,
            ),
            None => None,
        };
        Ok(Self::new(from, to)?.with_promotion(promotion))
    }
}

/// A board position in Forsyth-Edwards Notation.
///
/// Construction always validates, so every `Position` outside this module is
/// a syntactically valid, playable FEN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Position(String);

impl Position {
    /// Standard starting FEN.
    pub const STARTING_FEN: &'static str =
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// The standard initial position.
    #[must_use]
    pub fn initial() -> Self {
        Self(Self::STARTING_FEN.to_string())
    }

    /// Parse and validate a FEN string.
    pub fn parse(fen: &str) -> Result<Self, RulesError> {
        let fen = fen.trim();
        let parsed: Fen = fen.parse().map_err(|e| RulesError::MalformedPosition {
            reason: format!("{e}"),
        })?;
        parsed
            .into_position::<Chess>(CastlingMode::Standard)
            .map_err(|e| RulesError::MalformedPosition {
                reason: format!("{e}"),
            })?;
        Ok(Self(fen.to_string()))
    }

    /// Wrap a FEN produced by the rules engine itself.
    pub(crate) fn from_engine(fen: String) -> Self {
        Self(fen)
    }

    /// The FEN string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The side to move encoded in the FEN.
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        match self.0.split_whitespace().nth(1) {
            Some("b") => Color::Black,
            _ => Color::White,
        }
    }

    /// Compare piece placement, side to move and castling rights.
    ///
    /// En-passant and clock fields are ignored: different encoders disagree on
    /// when to emit the en-passant square.
    #[must_use]
    pub fn same_board(&self, other: &Self) -> bool {
        let a = self.0.split_whitespace().take(3);
        let b = other.0.split_whitespace().take(3);
        a.eq(b)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::initial()
    }
}

impl TryFrom<String> for Position {
    type Error = RulesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Position> for String {
    fn from(p: Position) -> Self {
        p.0
    }
}

impl std::str::FromStr for Position {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_opposite() {
        assert_eq!(Color::White.opposite(), Color::Black);
        assert_eq!(Color::Black.opposite(), Color::White);
    }

    #[test]
    fn test_color_conversion() {
        let shak_white: shakmaty::Color = Color::White.into();
        assert_eq!(shak_white, shakmaty::Color::White);
        let back: Color = shak_white.into();
        assert_eq!(back, Color::White);
    }

    #[test]
    fn test_square_roundtrip() {
        let sq = Square::new(4, 3).unwrap(); // e4
        assert_eq!(sq.file(), 4);
        assert_eq!(sq.rank(), 3);
        assert_eq!(sq.to_string(), "e4");

        let parsed: Square = "e4".parse().unwrap();
        assert_eq!(parsed, sq);
    }

    #[test]
    fn test_square_bounds() {
        assert!(Square::new(0, 0).is_some());
        assert!(Square::new(7, 7).is_some());
        assert!(Square::new(8, 0).is_none());
        assert!(Square::new(0, 8).is_none());
        assert!("e9".parse::<Square>().is_err());
        assert!("i1".parse::<Square>().is_err());
        assert!("e44".parse::<Square>().is_err());
    }

    #[test]
    fn test_move_parse() {
        let m: Move = "e2e4".parse().unwrap();
        assert_eq!(m.from().to_string(), "e2");
        assert_eq!(m.to().to_string(), "e4");
        assert!(m.promotion().is_none());

        let promo: Move = "e7e8q".parse().unwrap();
        assert_eq!(promo.promotion(), Some(PieceType::Queen));
        assert_eq!(promo.uci(), "e7e8q");
    }

    #[test]
    fn test_move_invalid() {
        assert!("e2".parse::<Move>().is_err());
        assert!("e2e4e5".parse::<Move>().is_err());
        assert!("e2e4x".parse::<Move>().is_err());
        assert!("e2e2".parse::<Move>().is_err());
    }

    #[test]
    fn test_move_serde_rejects_same_square() {
        let json = r#"{"from":"e2","to":"e2"}"#;
        assert!(serde_json::from_str::<Move>(json).is_err());

        let json = r#"{"from":"e2","to":"e4"}"#;
        let m: Move = serde_json::from_str(json).unwrap();
        assert_eq!(m.uci(), "e2e4");
    }

    #[test]
    fn test_position_parse() {
        let pos = Position::parse(Position::STARTING_FEN).unwrap();
        assert_eq!(pos.side_to_move(), Color::White);
        assert!(Position::parse("not a fen").is_err());
        // Both kings missing
        assert!(Position::parse("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
    }

    #[test]
    fn test_position_same_board_ignores_clocks_and_en_passant() {
        let a = Position::parse("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")
            .unwrap();
        let b = Position::parse("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
            .unwrap();
        assert!(a.same_board(&b));
        assert!(!a.same_board(&Position::initial()));
    }

    #[test]
    fn test_position_serde_validates() {
        let json = serde_json::to_string(&Position::initial()).unwrap();
        let back: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Position::initial());
        assert!(serde_json::from_str::<Position>("\"garbage\"").is_err());
    }
}
