//! Castling rights as a 4-bit flag set.

use std::fmt;

use crate::error::FenError;

/// Bit 0 = white king-side, 1 = white queen-side, 2 = black king-side,
/// 3 = black queen-side.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastleRights(u8);

impl CastleRights {
    pub const NONE: CastleRights = CastleRights(0);
    pub const FULL: CastleRights = CastleRights(0b1111);

    pub const WHITE_KING_SIDE: CastleRights = CastleRights(0b0001);
    pub const WHITE_QUEEN_SIDE: CastleRights = CastleRights(0b0010);
    pub const BLACK_KING_SIDE: CastleRights = CastleRights(0b0100);
    pub const BLACK_QUEEN_SIDE: CastleRights = CastleRights(0b1000);

    pub const WHITE: CastleRights = CastleRights(0b0011);
    pub const BLACK: CastleRights = CastleRights(0b1100);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn allows(self, rights: CastleRights) -> bool {
        self.0 & rights.0 == rights.0
    }

    #[inline]
    pub const fn grant(self, rights: CastleRights) -> CastleRights {
        CastleRights(self.0 | rights.0)
    }

    #[inline]
    pub const fn revoke(self, rights: CastleRights) -> CastleRights {
        CastleRights(self.0 & !rights.0)
    }

    /// Parse the FEN castling field ("KQkq", "Kq", "-", ...).
    pub fn from_fen(field: &str) -> Result<CastleRights, FenError> {
        if field == "-" {
            return Ok(CastleRights::NONE);
        }
        let mut rights = CastleRights::NONE;
        for c in field.chars() {
            rights = rights.grant(match c {
                'K' => CastleRights::WHITE_KING_SIDE,
                'Q' => CastleRights::WHITE_QUEEN_SIDE,
                'k' => CastleRights::BLACK_KING_SIDE,
                'q' => CastleRights::BLACK_QUEEN_SIDE,
                _ => return Err(FenError::BadCastling { character: c }),
            });
        }
        Ok(rights)
    }
}

impl fmt::Display for CastleRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        for (flag, c) in [
            (CastleRights::WHITE_KING_SIDE, 'K'),
            (CastleRights::WHITE_QUEEN_SIDE, 'Q'),
            (CastleRights::BLACK_KING_SIDE, 'k'),
            (CastleRights::BLACK_QUEEN_SIDE, 'q'),
        ] {
            if self.allows(flag) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CastleRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CastleRights({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::CastleRights;

    #[test]
    fn grant_and_revoke() {
        let rights = CastleRights::NONE
            .grant(CastleRights::WHITE_KING_SIDE)
            .grant(CastleRights::BLACK_QUEEN_SIDE);
        assert!(rights.allows(CastleRights::WHITE_KING_SIDE));
        assert!(!rights.allows(CastleRights::WHITE_QUEEN_SIDE));

        let rights = rights.revoke(CastleRights::WHITE);
        assert!(!rights.allows(CastleRights::WHITE_KING_SIDE));
        assert!(rights.allows(CastleRights::BLACK_QUEEN_SIDE));
    }

    #[test]
    fn fen_roundtrip() {
        for field in ["KQkq", "Kq", "k", "KQ", "-"] {
            let rights = CastleRights::from_fen(field).unwrap();
            assert_eq!(format!("{rights}"), *field);
        }
    }

    #[test]
    fn fen_rejects_unknown_letters() {
        assert!(CastleRights::from_fen("KXkq").is_err());
        assert!(CastleRights::from_fen("0").is_err());
    }

    #[test]
    fn full_allows_everything() {
        assert!(CastleRights::FULL.allows(CastleRights::WHITE));
        assert!(CastleRights::FULL.allows(CastleRights::BLACK));
        assert!(!CastleRights::NONE.allows(CastleRights::WHITE_KING_SIDE));
    }
}
