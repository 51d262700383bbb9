//! The chess position: piece placement, game state, and reversible
//! make/undo move execution.

use std::fmt;

use crate::attacks::{bishop_rays, king_reach, knight_reach, pawn_reach, rook_rays};
use crate::bitboard::Bitboard;
use crate::castling::CastleRights;
use crate::error::BoardError;
use crate::moves::{Move, MoveKind};
use crate::piece::{Color, Piece};
use crate::square::Square;
use crate::zobrist::{self, KEYS};

/// State that cannot be recomputed after a move and must be saved for undo.
#[derive(Clone, Copy)]
struct Undo {
    castling: CastleRights,
    en_passant: Option<Square>,
    halfmove_clock: u16,
    hash: u64,
}

/// Castling rights lost when a move touches the given square.
const RIGHTS_LOST: [CastleRights; 64] = {
    let mut table = [CastleRights::NONE; 64];
    table[Square::E1.index()] = CastleRights::WHITE;
    table[Square::A1.index()] = CastleRights::WHITE_QUEEN_SIDE;
    table[Square::H1.index()] = CastleRights::WHITE_KING_SIDE;
    table[Square::E8.index()] = CastleRights::BLACK;
    table[Square::A8.index()] = CastleRights::BLACK_QUEEN_SIDE;
    table[Square::H8.index()] = CastleRights::BLACK_KING_SIDE;
    table
};

/// A complete position with the move history needed for undo and
/// repetition detection.
///
/// There is exactly one mutable board per search; the search threads moves
/// through it with [`make_move`](Board::make_move) /
/// [`undo_move`](Board::undo_move), which are exact inverses.
#[derive(Clone)]
pub struct Board {
    /// Piece placement indexed by `[color][piece]`.
    pieces: [[Bitboard; Piece::COUNT]; Color::COUNT],
    /// Occupancy per color, kept in sync with `pieces`.
    occupancy: [Bitboard; Color::COUNT],
    side_to_move: Color,
    castling: CastleRights,
    en_passant: Option<Square>,
    halfmove_clock: u16,
    fullmove_number: u16,
    hash: u64,
    history: Vec<Undo>,
}

impl Board {
    /// The standard starting position.
    pub fn start_position() -> Board {
        crate::fen::START_FEN
            .parse()
            .expect("start position FEN is valid")
    }

    pub(crate) fn from_parts(
        pieces: [[Bitboard; Piece::COUNT]; Color::COUNT],
        side_to_move: Color,
        castling: CastleRights,
        en_passant: Option<Square>,
        halfmove_clock: u16,
        fullmove_number: u16,
    ) -> Result<Board, BoardError> {
        let mut occupancy = [Bitboard::EMPTY; Color::COUNT];
        for color in Color::BOTH {
            for piece in Piece::ALL {
                occupancy[color.index()] |= pieces[color.index()][piece.index()];
            }
        }
        let mut board = Board {
            pieces,
            occupancy,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
            hash: 0,
            history: Vec::with_capacity(64),
        };
        board.validate()?;
        board.hash = zobrist::full_hash(&board);
        Ok(board)
    }

    #[inline]
    pub fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    /// All pieces of one kind, both colors.
    #[inline]
    pub fn kind(&self, piece: Piece) -> Bitboard {
        self.pieces[0][piece.index()] | self.pieces[1][piece.index()]
    }

    #[inline]
    pub fn occupied(&self, color: Color) -> Bitboard {
        self.occupancy[color.index()]
    }

    #[inline]
    pub fn all_occupied(&self) -> Bitboard {
        self.occupancy[0] | self.occupancy[1]
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castle_rights(&self) -> CastleRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u16 {
        self.fullmove_number
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The piece on `sq`, if any.
    pub fn piece_on(&self, sq: Square) -> Option<Piece> {
        let color = self.color_on(sq)?;
        Piece::ALL
            .into_iter()
            .find(|&p| self.pieces[color.index()][p.index()].contains(sq))
    }

    pub fn color_on(&self, sq: Square) -> Option<Color> {
        if self.occupancy[0].contains(sq) {
            Some(Color::White)
        } else if self.occupancy[1].contains(sq) {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// The king square of `color`.
    ///
    /// # Panics
    ///
    /// Panics when the position has no king of that color; `from_parts`
    /// validation rules that out.
    pub fn king_square(&self, color: Color) -> Square {
        self.pieces(color, Piece::King)
            .first()
            .expect("each side has exactly one king")
    }

    /// Is `sq` attacked by any piece of `by`, with sliding rays cast over
    /// `occupied`?
    pub fn attacked(&self, sq: Square, by: Color, occupied: Bitboard) -> bool {
        let theirs = |p: Piece| self.pieces(by, p);
        if (knight_reach(sq) & theirs(Piece::Knight)).any() {
            return true;
        }
        if (king_reach(sq) & theirs(Piece::King)).any() {
            return true;
        }
        // A pawn of `by` attacks `sq` exactly when a pawn of the other color
        // standing on `sq` would attack the pawn's square.
        if (pawn_reach(by.opponent(), sq) & theirs(Piece::Pawn)).any() {
            return true;
        }
        if (rook_rays(sq, occupied) & (theirs(Piece::Rook) | theirs(Piece::Queen))).any() {
            return true;
        }
        (bishop_rays(sq, occupied) & (theirs(Piece::Bishop) | theirs(Piece::Queen))).any()
    }

    /// Is the side to move in check?
    pub fn is_check(&self) -> bool {
        let us = self.side_to_move;
        self.attacked(self.king_square(us), us.opponent(), self.all_occupied())
    }

    /// Has the current position occurred before since the last irreversible
    /// move? A single prior occurrence counts; inside a search tree that is
    /// enough to score the position as drawn.
    pub fn is_repetition(&self) -> bool {
        let lookback = (self.halfmove_clock as usize).min(self.history.len());
        self.history
            .iter()
            .rev()
            .take(lookback)
            .any(|undo| undo.hash == self.hash)
    }

    /// Neither side can deliver mate: no pawns, rooks, or queens on the
    /// board and at most one minor piece per side.
    pub fn has_insufficient_material(&self) -> bool {
        if (self.kind(Piece::Pawn) | self.kind(Piece::Rook) | self.kind(Piece::Queen)).any() {
            return false;
        }
        Color::BOTH.into_iter().all(|color| {
            (self.pieces(color, Piece::Knight) | self.pieces(color, Piece::Bishop)).count() <= 1
        })
    }

    #[inline]
    fn toggle(&mut self, color: Color, piece: Piece, sq: Square) {
        self.pieces[color.index()][piece.index()] ^= sq.bit();
        self.occupancy[color.index()] ^= sq.bit();
    }

    #[inline]
    fn toggle_hashed(&mut self, color: Color, piece: Piece, sq: Square) {
        self.toggle(color, piece, sq);
        self.hash ^= KEYS.pieces[color.index()][piece.index()][sq.index()];
    }

    /// The square of the pawn removed by an en-passant capture.
    #[inline]
    fn en_passant_victim(mover: Color, target: Square) -> Square {
        let delta = match mover {
            Color::White => -8,
            Color::Black => 8,
        };
        target
            .offset(delta)
            .expect("en passant target is on rank 3 or 6")
    }

    /// The rook's origin and target for a castling move, keyed by the
    /// king's destination.
    fn castle_rook_squares(king_target: Square) -> (Square, Square) {
        match king_target {
            Square::G1 => (Square::H1, Square::F1),
            Square::C1 => (Square::A1, Square::D1),
            Square::G8 => (Square::H8, Square::F8),
            _ => (Square::A8, Square::D8),
        }
    }

    /// Apply `mv` to the position. Every call must be paired with exactly
    /// one [`undo_move`](Board::undo_move) with the same move.
    pub fn make_move(&mut self, mv: Move) {
        self.history.push(Undo {
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
        });

        let us = self.side_to_move;
        let them = us.opponent();
        let origin = mv.origin();
        let target = mv.target();
        let piece = mv.piece();

        if let Some(ep) = self.en_passant {
            self.hash ^= KEYS.ep_file[ep.file() as usize];
        }
        self.hash ^= KEYS.castling[self.castling.bits() as usize];
        self.en_passant = None;

        match mv.kind() {
            MoveKind::Normal => {
                if let Some(victim) = mv.captured() {
                    self.toggle_hashed(them, victim, target);
                }
                self.toggle_hashed(us, piece, origin);
                self.toggle_hashed(us, piece, target);
            }
            MoveKind::DoublePush => {
                self.toggle_hashed(us, Piece::Pawn, origin);
                self.toggle_hashed(us, Piece::Pawn, target);
                self.en_passant = Some(Self::en_passant_victim(us, target));
            }
            MoveKind::EnPassant => {
                self.toggle_hashed(them, Piece::Pawn, Self::en_passant_victim(us, target));
                self.toggle_hashed(us, Piece::Pawn, origin);
                self.toggle_hashed(us, Piece::Pawn, target);
            }
            MoveKind::Castle => {
                let (rook_origin, rook_target) = Self::castle_rook_squares(target);
                self.toggle_hashed(us, Piece::King, origin);
                self.toggle_hashed(us, Piece::King, target);
                self.toggle_hashed(us, Piece::Rook, rook_origin);
                self.toggle_hashed(us, Piece::Rook, rook_target);
            }
            MoveKind::Promotion => {
                if let Some(victim) = mv.captured() {
                    self.toggle_hashed(them, victim, target);
                }
                self.toggle_hashed(us, Piece::Pawn, origin);
                let promoted = mv.promoted().expect("promotion move carries a piece");
                self.toggle_hashed(us, promoted, target);
            }
        }

        self.castling = self
            .castling
            .revoke(RIGHTS_LOST[origin.index()])
            .revoke(RIGHTS_LOST[target.index()]);
        self.hash ^= KEYS.castling[self.castling.bits() as usize];
        if let Some(ep) = self.en_passant {
            self.hash ^= KEYS.ep_file[ep.file() as usize];
        }

        if piece == Piece::Pawn || mv.is_capture() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }

        self.side_to_move = them;
        self.hash ^= KEYS.side;
        if us == Color::Black {
            self.fullmove_number += 1;
        }
    }

    /// Revert the most recent [`make_move`](Board::make_move), which must
    /// have applied `mv`.
    ///
    /// # Panics
    ///
    /// Panics when no move is left to undo.
    pub fn undo_move(&mut self, mv: Move) {
        let undo = self.history.pop().expect("undo_move without matching make_move");

        let us = self.side_to_move.opponent();
        let them = self.side_to_move;
        let origin = mv.origin();
        let target = mv.target();

        match mv.kind() {
            MoveKind::Normal => {
                self.toggle(us, mv.piece(), target);
                self.toggle(us, mv.piece(), origin);
                if let Some(victim) = mv.captured() {
                    self.toggle(them, victim, target);
                }
            }
            MoveKind::DoublePush => {
                self.toggle(us, Piece::Pawn, target);
                self.toggle(us, Piece::Pawn, origin);
            }
            MoveKind::EnPassant => {
                self.toggle(us, Piece::Pawn, target);
                self.toggle(us, Piece::Pawn, origin);
                self.toggle(them, Piece::Pawn, Self::en_passant_victim(us, target));
            }
            MoveKind::Castle => {
                let (rook_origin, rook_target) = Self::castle_rook_squares(target);
                self.toggle(us, Piece::King, target);
                self.toggle(us, Piece::King, origin);
                self.toggle(us, Piece::Rook, rook_target);
                self.toggle(us, Piece::Rook, rook_origin);
            }
            MoveKind::Promotion => {
                let promoted = mv.promoted().expect("promotion move carries a piece");
                self.toggle(us, promoted, target);
                self.toggle(us, Piece::Pawn, origin);
                if let Some(victim) = mv.captured() {
                    self.toggle(them, victim, target);
                }
            }
        }

        self.side_to_move = us;
        if us == Color::Black {
            self.fullmove_number -= 1;
        }
        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.hash = undo.hash;
    }

    pub fn validate(&self) -> Result<(), BoardError> {
        for color in Color::BOTH {
            let kings = self.pieces(color, Piece::King).count();
            if kings != 1 {
                return Err(BoardError::KingCount {
                    color: match color {
                        Color::White => "white",
                        Color::Black => "black",
                    },
                    count: kings,
                });
            }
        }

        let back_ranks = Bitboard::RANKS[0] | Bitboard::RANKS[7];
        if (self.kind(Piece::Pawn) & back_ranks).any() {
            return Err(BoardError::PawnOnBackRank);
        }

        let mut seen = Bitboard::EMPTY;
        for color in Color::BOTH {
            for piece in Piece::ALL {
                let bb = self.pieces(color, piece);
                if (seen & bb).any() {
                    return Err(BoardError::OverlappingPieces);
                }
                seen |= bb;
            }
        }

        Ok(())
    }
}

/// Position equality ignores the move history: two boards reached by
/// different paths compare equal when the positions match.
impl PartialEq for Board {
    fn eq(&self, other: &Board) -> bool {
        self.pieces == other.pieces
            && self.side_to_move == other.side_to_move
            && self.castling == other.castling
            && self.en_passant == other.en_passant
            && self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
    }
}

impl Eq for Board {}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board(\"{self}\")")
    }
}
