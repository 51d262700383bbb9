//! UCI command parsing.

use rampart_core::{Board, Move, generate_moves};

use crate::error::UciError;

/// A parsed line of UCI input.
#[derive(Debug)]
pub enum Command {
    Uci,
    IsReady,
    NewGame,
    /// `position ...` with all moves already applied.
    Position(Board),
    Go(GoParams),
    Stop,
    PonderHit,
    Quit,
    /// Unrecognized input, ignored per the UCI convention.
    Unknown(String),
}

/// Arguments of a `go` command. `search_moves` stays textual here; the
/// engine resolves the strings against the board current at `go` time.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GoParams {
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub search_moves: Vec<String>,
    pub white_time: Option<u64>,
    pub black_time: Option<u64>,
    pub white_increment: Option<u64>,
    pub black_increment: Option<u64>,
    pub moves_to_go: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
}

/// Parse one line of input.
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&head) = tokens.first() else {
        return Ok(Command::Unknown(String::new()));
    };

    match head {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::NewGame),
        "stop" => Ok(Command::Stop),
        "ponderhit" => Ok(Command::PonderHit),
        "quit" => Ok(Command::Quit),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        other => Ok(Command::Unknown(other.to_string())),
    }
}

/// Find the legal move matching a coordinate string such as "e2e4" or
/// "e7e8q".
pub fn resolve_move(board: &Board, text: &str) -> Option<Move> {
    generate_moves(board)
        .iter()
        .copied()
        .find(|mv| mv.to_string() == text)
}

/// `position startpos|fen <fen> [moves ...]`.
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    let (mut board, rest) = match tokens.first() {
        Some(&"startpos") => (Board::start_position(), &tokens[1..]),
        Some(&"fen") => {
            if tokens.len() < 7 {
                return Err(UciError::InvalidFen {
                    fen: tokens[1..].join(" "),
                });
            }
            let fen = tokens[1..7].join(" ");
            let board = fen
                .parse()
                .map_err(|_| UciError::InvalidFen { fen: fen.clone() })?;
            (board, &tokens[7..])
        }
        _ => return Err(UciError::MalformedPosition),
    };

    if let Some((&"moves", moves)) = rest.split_first() {
        for text in moves {
            let mv = resolve_move(&board, text).ok_or_else(|| UciError::IllegalMove {
                text: text.to_string(),
            })?;
            board.make_move(mv);
        }
    }

    Ok(Command::Position(board))
}

fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();
    let mut i = 0;

    fn value<T: std::str::FromStr>(
        tokens: &[&str],
        i: usize,
        param: &'static str,
    ) -> Result<T, UciError> {
        let text = tokens
            .get(i + 1)
            .ok_or(UciError::MissingValue { param })?;
        text.parse().map_err(|_| UciError::InvalidValue {
            param,
            value: text.to_string(),
        })
    }

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                params.depth = Some(value(tokens, i, "depth")?);
                i += 2;
            }
            "nodes" => {
                params.nodes = Some(value(tokens, i, "nodes")?);
                i += 2;
            }
            "movetime" => {
                params.movetime = Some(value(tokens, i, "movetime")?);
                i += 2;
            }
            "wtime" => {
                params.white_time = Some(value(tokens, i, "wtime")?);
                i += 2;
            }
            "btime" => {
                params.black_time = Some(value(tokens, i, "btime")?);
                i += 2;
            }
            "winc" => {
                params.white_increment = Some(value(tokens, i, "winc")?);
                i += 2;
            }
            "binc" => {
                params.black_increment = Some(value(tokens, i, "binc")?);
                i += 2;
            }
            "movestogo" => {
                params.moves_to_go = Some(value(tokens, i, "movestogo")?);
                i += 2;
            }
            "searchmoves" => {
                // Consume every following token that looks like a move.
                i += 1;
                while i < tokens.len() && tokens[i].len() >= 4 && tokens[i].len() <= 5 {
                    params.search_moves.push(tokens[i].to_string());
                    i += 1;
                }
            }
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            "ponder" => {
                params.ponder = true;
                i += 1;
            }
            _ => i += 1,
        }
    }

    Ok(Command::Go(params))
}
