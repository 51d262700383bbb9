//! FEN parsing and formatting.

use std::fmt;
use std::str::FromStr;

use crate::bitboard::Bitboard;
use crate::board::Board;
use crate::castling::CastleRights;
use crate::error::FenError;
use crate::piece::{Color, Piece};
use crate::square::Square;

/// The standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl FromStr for Board {
    type Err = FenError;

    fn from_str(fen: &str) -> Result<Board, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(FenError::FieldCount {
                found: fields.len(),
            });
        }

        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::RankCount { found: ranks.len() });
        }

        let mut pieces = [[Bitboard::EMPTY; Piece::COUNT]; Color::COUNT];
        for (row, text) in ranks.iter().enumerate() {
            // FEN lists rank 8 first.
            let rank = 7 - row as u8;
            let mut file = 0u8;
            for c in text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(FenError::BadPiece { character: c });
                    }
                    file += skip as u8;
                } else {
                    let piece = Piece::from_letter(c).ok_or(FenError::BadPiece { character: c })?;
                    let color = if c.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    if file >= 8 {
                        return Err(FenError::RankWidth {
                            rank: row,
                            squares: file as usize + 1,
                        });
                    }
                    pieces[color.index()][piece.index()] |= Square::at(file, rank).bit();
                    file += 1;
                }
            }
            if file != 8 {
                return Err(FenError::RankWidth {
                    rank: row,
                    squares: file as usize,
                });
            }
        }

        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(FenError::BadColor {
                    found: other.to_string(),
                });
            }
        };

        let castling = CastleRights::from_fen(fields[2])?;

        let en_passant = match fields[3] {
            "-" => None,
            text => Some(Square::parse(text).ok_or_else(|| FenError::BadEnPassant {
                found: text.to_string(),
            })?),
        };

        let halfmove_clock = fields[4].parse().map_err(|_| FenError::BadCounter {
            field: "halfmove clock",
            found: fields[4].to_string(),
        })?;
        let fullmove_number = fields[5].parse().map_err(|_| FenError::BadCounter {
            field: "fullmove number",
            found: fields[5].to_string(),
        })?;

        Ok(Board::from_parts(
            pieces,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        )?)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                let sq = Square::at(file, rank);
                match (self.piece_on(sq), self.color_on(sq)) {
                    (Some(piece), Some(color)) => {
                        if empty > 0 {
                            write!(f, "{empty}")?;
                            empty = 0;
                        }
                        let letter = match color {
                            Color::White => piece.letter().to_ascii_uppercase(),
                            Color::Black => piece.letter(),
                        };
                        write!(f, "{letter}")?;
                    }
                    _ => empty += 1,
                }
            }
            if empty > 0 {
                write!(f, "{empty}")?;
            }
            if rank > 0 {
                write!(f, "/")?;
            }
        }

        write!(f, " {} {}", self.side_to_move(), self.castle_rights())?;
        match self.en_passant() {
            Some(sq) => write!(f, " {sq}")?,
            None => write!(f, " -")?,
        }
        write!(f, " {} {}", self.halfmove_clock(), self.fullmove_number())
    }
}
