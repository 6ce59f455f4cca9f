//! Dense per-game move matrices: one for SAN, one for clocks

use shakmaty::Color;

use crate::games::record::GAME_ID_COLUMN;
use crate::games::NormalizedGameRecord;
use crate::parser::{PlyKey, PlyRecord};
use crate::storage::Table;

const SIDES: [Color; 2] = [Color::White, Color::Black];

/// `Game ID, 1w, 1b, ..., Nw, Nb`
pub fn ply_columns(max_move: u32) -> Vec<String> {
    std::iter::once(GAME_ID_COLUMN.to_string())
        .chain((1..=max_move).flat_map(|n| SIDES.iter().map(move |&side| PlyKey::new(n, side).label())))
        .collect()
}

/// Highest move number present in a move matrix header.
pub fn max_move_from_columns(columns: &[String]) -> u32 {
    columns
        .iter()
        .filter_map(|c| PlyKey::from_label(c))
        .map(|k| k.move_number)
        .max()
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveTables {
    pub san: Table,
    pub clock: Table,
}

fn matrix_row(
    record: &NormalizedGameRecord,
    width: u32,
    cell: impl Fn(&PlyRecord) -> String,
) -> Vec<String> {
    let cell = &cell;
    std::iter::once(record.game_id.clone())
        .chain((1..=width).flat_map(|n| {
            SIDES
                .iter()
                .map(move |&side| record.plies.get(n, side).map(cell).unwrap_or_default())
        }))
        .collect()
}

/// One row per record, in the order given. The header is wide enough for the
/// longest game and never narrower than `min_moves`, so rows can be appended
/// under a header that has already grown.
pub fn build_move_tables(records: &[NormalizedGameRecord], min_moves: u32) -> MoveTables {
    let width = records
        .iter()
        .map(|r| r.plies.max_move_number())
        .fold(min_moves, u32::max);
    let columns = ply_columns(width);

    MoveTables {
        san: Table {
            columns: columns.clone(),
            rows: records
                .iter()
                .map(|r| matrix_row(r, width, |ply| ply.san.clone()))
                .collect(),
        },
        clock: Table {
            columns,
            rows: records
                .iter()
                .map(|r| matrix_row(r, width, |ply| ply.clock_str().to_string()))
                .collect(),
        },
    }
}
