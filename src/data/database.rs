//! Event database queries
//!
//! Selection-level access to the SQLite event stores. Per-event reads live
//! in [`crate::data::dataset`]; this module only answers "which events are
//! in this database".

use std::path::Path;

use rand::{rngs::StdRng, SeedableRng};
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Cap on the number of events drawn from a single database
pub const MAX_EVENTS: usize = 5_000_000;

/// Seed for the capped sample of oversized databases
const SAMPLE_SEED: u64 = 42;

/// Read the full event-number population from a database's `truth` table.
///
/// Databases larger than [`MAX_EVENTS`] are sampled down to the cap with a
/// seeded RNG so repeated runs see the same selection.
pub fn read_event_selection(database: &Path) -> Result<Vec<i64>> {
    let conn = Connection::open(database)?;
    let mut stmt = conn.prepare("SELECT event_no FROM truth")?;
    let events = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;

    debug!(database = %database.display(), events = events.len(), "read event selection");

    if events.len() > MAX_EVENTS {
        let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
        let sampled = rand::seq::index::sample(&mut rng, events.len(), MAX_EVENTS)
            .into_iter()
            .map(|i| events[i])
            .collect();
        return Ok(sampled);
    }

    Ok(events)
}
