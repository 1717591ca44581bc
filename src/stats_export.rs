use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use crate::model::{RefereeRole, RoleCounts};

const ROLE_HEADER: &[&str] = &["Referee", "Slug", "Season", "League", "Role", "Matches"];
const TEAM_HEADER: &[&str] = &[
    "Referee",
    "Slug",
    "Team",
    "Assignments",
    "Main",
    "Assistant",
    "VAR",
    "Waiting",
    "Yellow Cards",
    "Red Cards",
    "Fan Rating",
    "Fan Votes",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub role_rows: usize,
    pub team_rows: usize,
}

/// One spreadsheet cell. Counts stay numeric so the sheet can be sorted and summed.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Count(i64),
    Rating(f64),
    /// Role columns of a pair with no assignments.
    Empty,
}

/// Writes the aggregate tables to an `.xlsx` workbook with names instead of keys.
pub fn export_referee_stats(conn: &Connection, path: &Path) -> Result<ExportReport> {
    let role_rows = query_rows(
        conn,
        r#"
        SELECT r.name, r.slug, s.year, l.name, st.role, st.match_count
        FROM referee_role_stats st
        JOIN referees r ON r.id = st.referee_id
        JOIN seasons s ON s.id = st.season_id
        JOIN leagues l ON l.id = st.league_id
        ORDER BY r.slug, s.year, l.slug, st.role
        "#,
        |row| {
            let role: RefereeRole = row.get(4)?;
            Ok(vec![
                Cell::Text(row.get(0)?),
                Cell::Text(row.get(1)?),
                Cell::Count(row.get(2)?),
                Cell::Text(row.get(3)?),
                Cell::Text(role.label().to_string()),
                Cell::Count(row.get(5)?),
            ])
        },
    )?;

    let team_rows = query_rows(
        conn,
        r#"
        SELECT r.name, r.slug, t.name, st.total_assignments,
               st.role_main, st.role_assistant, st.role_var, st.role_waiting,
               st.total_yellow_cards, st.total_red_cards,
               st.fan_average_rating, st.fan_rating_count
        FROM referee_team_stats st
        JOIN referees r ON r.id = st.referee_id
        JOIN teams t ON t.id = st.team_id
        ORDER BY r.slug, t.slug
        "#,
        |row| {
            let counts =
                RoleCounts::from_columns(row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?);
            let mut cells = vec![
                Cell::Text(row.get(0)?),
                Cell::Text(row.get(1)?),
                Cell::Text(row.get(2)?),
                Cell::Count(row.get(3)?),
            ];
            cells.extend(role_cells(counts));
            cells.extend([
                Cell::Count(row.get(8)?),
                Cell::Count(row.get(9)?),
                Cell::Rating(row.get(10)?),
                Cell::Count(row.get(11)?),
            ]);
            Ok(cells)
        },
    )?;

    let mut workbook = Workbook::new();
    write_sheet(&mut workbook, "RoleStats", ROLE_HEADER, &role_rows)?;
    write_sheet(&mut workbook, "TeamStats", TEAM_HEADER, &team_rows)?;
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        role_rows: role_rows.len(),
        team_rows: team_rows.len(),
    })
}

/// Main, assistant, VAR and waiting columns; blank when the pair has no assignments.
fn role_cells(counts: Option<RoleCounts>) -> [Cell; 4] {
    RefereeRole::ALL.map(|role| match counts {
        Some(counts) => Cell::Count(i64::from(counts.get(role))),
        None => Cell::Empty,
    })
}

fn query_rows<F>(conn: &Connection, sql: &str, map: F) -> Result<Vec<Vec<Cell>>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<Vec<Cell>>,
{
    let mut stmt = conn.prepare(sql).context("prepare export query")?;
    let rows = stmt.query_map([], map).context("query export rows")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode export row")?);
    }
    Ok(out)
}

/// Bold frozen header row, then one row per record.
fn write_sheet(
    workbook: &mut Workbook,
    name: &str,
    header: &[&str],
    rows: &[Vec<Cell>],
) -> Result<()> {
    let bold = Format::new().set_bold();
    let rating = Format::new().set_num_format("0.00");
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    for (col, title) in header.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *title, &bold)
            .with_context(|| format!("write {name} header {col}"))?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (idx, row) in rows.iter().enumerate() {
        let row_idx = idx as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(value) => sheet.write_string(row_idx, col, value.as_str()),
                Cell::Count(value) => sheet.write_number(row_idx, col, *value as f64),
                Cell::Rating(value) => {
                    sheet.write_number_with_format(row_idx, col, *value, &rating)
                }
                Cell::Empty => continue,
            }
            .with_context(|| format!("write {name} cell ({row_idx},{col})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_columns_blank_without_assignments() {
        assert_eq!(role_cells(None), [Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty]);
        let counts = RoleCounts {
            main: 2,
            var: 1,
            ..RoleCounts::default()
        };
        assert_eq!(
            role_cells(Some(counts)),
            [Cell::Count(2), Cell::Count(0), Cell::Count(1), Cell::Count(0)]
        );
    }

    #[test]
    fn empty_store_exports_headers_only() {
        let conn = crate::db::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let report = export_referee_stats(&conn, &path).unwrap();
        assert_eq!(report, ExportReport::default());
        assert!(path.exists());
    }
}
