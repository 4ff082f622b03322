// mongo-bridge-core/src/programs.rs
// The two entry programs, written against `Write` so hosts and tests can
// capture their output

use std::io::Write;
use std::sync::Arc;

use crate::database::DatabaseFacade;
use crate::doc;
use crate::document::{Document, ID_FIELD, NS_FIELD};
use crate::error::Result;
use crate::find_options::FindOptions;
use crate::scope::{AmbientScope, DatabaseSlot, ScopeBinder};
use crate::log_info;

/// Collection used by the round-trip exercise
pub const EXERCISE_COLLECTION: &str = "test";

/// Fields printed per result, in order
pub const RESULT_FIELDS: [&str; 4] = [ID_FIELD, NS_FIELD, "name", "value"];

/// Remove everything from `test`, save one document, query it back and
/// print each result.
pub fn run_exercise<W: Write>(db: &DatabaseFacade, out: &mut W) -> Result<()> {
    writeln!(out, "starting..")?;

    let test = db.collection(EXERCISE_COLLECTION)?;
    let removed = test.remove(&Document::new())?;
    log_info!("cleared {} documents from {}", removed, test.full_name());

    test.save(doc! { "name" => "mongo", "value" => 123 })?;

    for result in test.find(&doc! { "name" => "mongo" }, None, FindOptions::new())? {
        print_result(&result, out)?;
    }

    writeln!(out, "done.")?;
    Ok(())
}

fn print_result<W: Write>(result: &Document, out: &mut W) -> Result<()> {
    for field in RESULT_FIELDS {
        writeln!(out, "got result {}: {}", field, result.display_field(field))?;
    }
    Ok(())
}

/// Bind the scope's `db` into `slot` and report success
pub fn run_scope_binder<W: Write>(
    scope: &AmbientScope,
    slot: &DatabaseSlot,
    out: &mut W,
) -> Result<Arc<DatabaseFacade>> {
    let db = ScopeBinder::bind(scope, slot)?;
    writeln!(out, "done.")?;
    Ok(db)
}
