// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation queries.

use chrono::Utc;
use courier_core::{Conversation, CourierError};
use rusqlite::{Row, params};

use super::{new_id, opt_time_col, time_col, to_text};
use crate::database::{Database, map_tr_err};

fn from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        contact_id: row.get(2)?,
        last_message_at: opt_time_col(row, 3)?,
        created_at: time_col(row, 4)?,
    })
}

/// Returns the conversation for `(user_id, contact_id)`, creating it if needed.
pub async fn find_or_create(
    db: &Database,
    user_id: &str,
    contact_id: &str,
) -> Result<Conversation, CourierError> {
    let user_id = user_id.to_string();
    let contact_id = contact_id.to_string();
    let id = new_id();
    let created_at = to_text(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, contact_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, contact_id) DO NOTHING",
                params![id, user_id, contact_id, created_at],
            )?;
            conn.query_row(
                "SELECT id, user_id, contact_id, last_message_at, created_at
                 FROM conversations WHERE user_id = ?1 AND contact_id = ?2",
                params![user_id, contact_id],
                from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}
