//! License family materializer
//!
//! The license state is upserted under the event-timestamp gate; the
//! customer snapshot then mirrors whatever the gate settled on, so a late
//! event bumps the counter without rolling back newer state.

use sqlx::PgConnection;

use sb_protocol::NormalizedEvent;
use sb_store::license::LicenseUpdate;
use sb_store::{customer, license};

use crate::error::Result;

/// Materialize one license event.
pub async fn materialize(conn: &mut PgConnection, ev: &NormalizedEvent) -> Result<()> {
    let update = LicenseUpdate::from_event(ev);
    let settled = license::upsert(&mut *conn, &update).await?;
    customer::apply_license(&mut *conn, ev, &settled.state).await?;
    Ok(())
}
