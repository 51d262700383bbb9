//! Material counting.

use rampart_core::{Board, Color, Piece};

pub const PAWN_VALUE: i32 = 100;
pub const KNIGHT_VALUE: i32 = 325;
pub const BISHOP_VALUE: i32 = 325;
pub const ROOK_VALUE: i32 = 500;
pub const QUEEN_VALUE: i32 = 975;

/// Centipawn value of a piece kind; kings carry no material value.
pub const fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => 0,
    }
}

/// Total material for one side.
pub(crate) fn score(board: &Board, color: Color) -> i32 {
    Piece::ALL
        .into_iter()
        .map(|piece| piece_value(piece) * board.pieces(color, piece).count() as i32)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{piece_value, score};
    use rampart_core::{Board, Color, Piece};

    #[test]
    fn start_position_sides_match() {
        let board = Board::start_position();
        let white = score(&board, Color::White);
        assert_eq!(white, score(&board, Color::Black));
        // 8 pawns + 2 each of N/B/R + 1 queen
        assert_eq!(white, 8 * 100 + 2 * 325 + 2 * 325 + 2 * 500 + 975);
    }

    #[test]
    fn king_is_priceless_not_counted() {
        assert_eq!(piece_value(Piece::King), 0);
        let board: Board = "4k3/8/8/8/8/8/8/4K3 w - - 0 1".parse().unwrap();
        assert_eq!(score(&board, Color::White), 0);
    }
}
