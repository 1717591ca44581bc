use std::fmt::Display;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use seevar::admin::ActionResponse;
use seevar::config::{AppConfig, CliArgs};
use seevar::{
    bulk_assignments, bulk_referees, bulk_results, db, logging, stats_export, stats_rebuild,
    stats_store,
};

const USAGE: &str = "\
usage: seevar [--db <path>] <command>

commands:
  import-assignments <file.json>   bulk-import referee assignments
  import-results <file.json>       bulk-import match results and cards
  import-referees <file.json>      bulk-import referees
  rebuild-stats                    recompute all referee aggregates
  export-stats <out.xlsx>          write referee aggregates to a workbook
  referee-stats <slug>             print one referee's aggregates";

fn main() -> Result<()> {
    let cli = CliArgs::parse(std::env::args().skip(1));
    let config = AppConfig::from_env()?.with_db_override(cli.db_path);
    logging::init(&config.log_filter);

    let positional = cli.positional;
    let Some(command) = positional.first() else {
        println!("{USAGE}");
        return Ok(());
    };
    let operand = positional.get(1).map(String::as_str);

    let mut conn = db::open_db(&config.db_path)?;
    let ok = match command.as_str() {
        "import-assignments" => {
            let raw = read_payload(operand)?;
            print_response(bulk_assignments::import_assignments(&mut conn, &raw))
        }
        "import-results" => {
            let raw = read_payload(operand)?;
            print_response(bulk_results::import_results(&mut conn, &raw))
        }
        "import-referees" => {
            let raw = read_payload(operand)?;
            print_response(bulk_referees::import_referees(&mut conn, &raw))
        }
        "rebuild-stats" => print_response(
            stats_rebuild::rebuild_all_stats(&mut conn)
                .map_err(|err| internal_failure(err, "통계 재계산에 실패했습니다.")),
        ),
        "export-stats" => {
            let path = operand
                .map(PathBuf::from)
                .context("export-stats needs an output path")?;
            print_response(
                stats_export::export_referee_stats(&conn, &path)
                    .map_err(|err| internal_failure(err, "통계 내보내기에 실패했습니다.")),
            )
        }
        "referee-stats" => {
            let slug = operand.context("referee-stats needs a referee slug")?;
            print_response(referee_stats(&conn, slug))
        }
        other => {
            eprintln!("unknown command: {other}\n\n{USAGE}");
            false
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn read_payload(path: Option<&str>) -> Result<String> {
    let path = path.context("missing JSON file argument")?;
    fs::read_to_string(path).with_context(|| format!("read {path}"))
}

fn internal_failure(err: anyhow::Error, message: &str) -> String {
    error!(error = ?err, "{message}");
    message.to_string()
}

fn referee_stats(conn: &rusqlite::Connection, slug: &str) -> Result<serde_json::Value, String> {
    let lookup = || -> Result<Option<serde_json::Value>> {
        let Some(referee_id) = db::referee_id_by_slug(conn, slug)? else {
            return Ok(None);
        };
        Ok(Some(json!({
            "refereeId": referee_id,
            "roleStats": stats_store::role_stats_for_referee(conn, &referee_id)?,
            "teamStats": stats_store::team_stats_for_referee(conn, &referee_id)?,
        })))
    };
    match lookup() {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(format!("심판 '{slug}'을(를) 찾을 수 없습니다.")),
        Err(err) => Err(internal_failure(err, "통계 조회에 실패했습니다.")),
    }
}

fn print_response<T: Serialize, E: Display>(result: Result<T, E>) -> bool {
    let response = ActionResponse::from_result(result);
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to encode response: {err}"),
    }
    response.ok
}
