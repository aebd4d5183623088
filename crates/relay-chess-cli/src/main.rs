//! Relay Chess - inspect positions and game histories
//!
//! Run with: `cargo run --package relay-chess-cli -- <command>`

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relay_chess::rules::{
    self, moves_from_pgn, parse_user_move_input, validate_move_sequence, ChessPosition,
};
use relay_chess::types::{PieceType, Position, Square, Termination};

/// Relay Chess - move validation for chess over relays
#[derive(Parser, Debug)]
#[command(name = "relay-chess")]
#[command(about = "Validate chess moves, positions and game histories", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a game history and report where it ends
    Validate {
        /// Starting position (defaults to the initial position)
        #[arg(long, env = "RELAY_CHESS_FEN")]
        fen: Option<String>,

        /// Moves in SAN or coordinate notation, or PGN movetext
        #[arg(required = true)]
        moves: Vec<String>,
    },

    /// Report whether a position is over, and why
    Status {
        fen: String,
    },

    /// List legal moves of a position
    Moves {
        fen: String,

        /// Only moves starting on this square
        #[arg(short, long)]
        square: Option<Square>,
    },

    /// Apply a typed move such as "e2e4", "e2-e4" or "e2 e4"
    Play {
        fen: String,

        input: String,

        /// Promotion piece: q, r, b or n
        #[arg(short, long)]
        promotion: Option<char>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("relay_chess=info".parse()?))
        .init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed arguments");

    match cli.command {
        Command::Validate { fen, moves } => validate(fen.as_deref(), &moves),
        Command::Status { fen } => status(&fen),
        Command::Moves { fen, square } => list_moves(&fen, square),
        Command::Play {
            fen,
            input,
            promotion,
        } => play(&fen, &input, promotion),
    }
}

fn validate(fen: Option<&str>, moves: &[String]) -> anyhow::Result<()> {
    let start = fen
        .map(Position::parse)
        .transpose()
        .context("invalid starting position")?;
    let tokens = moves_from_pgn(&moves.join(" "));
    let replay = validate_move_sequence(&tokens, start.as_ref())?;

    println!("moves:  {}", replay.to_pgn());
    println!("fen:    {}", replay.position());
    println!("status: {}", describe(&replay.termination()));
    Ok(())
}

fn status(fen: &str) -> anyhow::Result<()> {
    let position = Position::parse(fen)?;
    let termination = rules::check_termination(&position)?;
    println!("to move: {}", position.side_to_move());
    println!("status:  {}", describe(&termination));
    Ok(())
}

fn list_moves(fen: &str, square: Option<Square>) -> anyhow::Result<()> {
    let position = ChessPosition::from_fen(fen)?;
    let moves = position.legal_move_details(square);
    if moves.is_empty() {
        println!("no legal moves");
    }
    for m in moves {
        let mut flags = String::new();
        if m.is_capture {
            flags.push_str(" capture");
        }
        if m.is_check {
            flags.push_str(" check");
        }
        println!("{:<6} {:<8}{}", m.uci, m.san, flags);
    }
    Ok(())
}

fn play(fen: &str, input: &str, promotion: Option<char>) -> anyhow::Result<()> {
    let position = Position::parse(fen)?;
    let parsed =
        parse_user_move_input(input).ok_or_else(|| anyhow!("cannot read move {input:?}"))?;
    let promotion = promotion
        .map(|c| {
            PieceType::from_promotion_char(c).ok_or_else(|| anyhow!("invalid promotion piece {c:?}"))
        })
        .transpose()?;
    let mv = parsed.into_move(promotion)?;
    if promotion.is_none() && rules::requires_promotion(&position, &mv) {
        bail!("{mv} promotes a pawn; pass --promotion");
    }

    let played = rules::validate_move(&position, &mv)?;
    println!("move:   {}", played.san);
    println!("fen:    {}", played.resulting_position);
    println!(
        "status: {}",
        describe(&rules::check_termination(&played.resulting_position)?)
    );
    Ok(())
}

fn describe(termination: &Termination) -> String {
    match (termination.reason, termination.winner) {
        (Some(reason), Some(winner)) => format!("over ({reason}), winner: {winner}"),
        (Some(reason), None) => format!("over ({reason})"),
        _ if termination.in_check => "ongoing, in check".to_string(),
        _ => "ongoing".to_string(),
    }
}
