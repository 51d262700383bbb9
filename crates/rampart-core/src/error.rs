//! Error types for position parsing and validation.

use thiserror::Error;

/// Errors from parsing a FEN string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("expected 6 FEN fields, found {found}")]
    FieldCount { found: usize },
    #[error("expected 8 ranks in piece placement, found {found}")]
    RankCount { found: usize },
    #[error("rank {rank} describes {squares} squares, expected 8")]
    RankWidth { rank: usize, squares: usize },
    #[error("unknown piece character '{character}'")]
    BadPiece { character: char },
    #[error("active color must be \"w\" or \"b\", found {found:?}")]
    BadColor { found: String },
    #[error("unknown castling character '{character}'")]
    BadCastling { character: char },
    #[error("invalid en passant square {found:?}")]
    BadEnPassant { found: String },
    #[error("invalid {field}: {found:?}")]
    BadCounter {
        field: &'static str,
        found: String,
    },
    #[error("position is not playable: {0}")]
    BadPosition(#[from] BoardError),
}

/// Structural problems with a position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("expected 1 {color} king, found {count}")]
    KingCount { color: &'static str, count: u32 },
    #[error("pawns on the first or eighth rank")]
    PawnOnBackRank,
    #[error("two pieces share a square")]
    OverlappingPieces,
}

#[cfg(test)]
mod tests {
    use super::{BoardError, FenError};

    #[test]
    fn fen_error_messages() {
        let err = FenError::FieldCount { found: 3 };
        assert_eq!(err.to_string(), "expected 6 FEN fields, found 3");
        let err = FenError::BadPiece { character: 'x' };
        assert_eq!(err.to_string(), "unknown piece character 'x'");
    }

    #[test]
    fn board_error_wraps_into_fen_error() {
        let err: FenError = BoardError::PawnOnBackRank.into();
        assert!(matches!(err, FenError::BadPosition(_)));
        assert!(err.to_string().contains("pawns"));
    }
}
