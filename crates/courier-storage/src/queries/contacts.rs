// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact queries.

use chrono::Utc;
use courier_core::{Contact, CourierError};
use rusqlite::{OptionalExtension, Row, params};

use super::{new_id, time_col, to_text};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, user_id, phone_number, name, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        user_id: row.get(1)?,
        phone_number: row.get(2)?,
        name: row.get(3)?,
        created_at: time_col(row, 4)?,
    })
}

/// Returns the contact for `(user_id, phone_number)`, inserting it first
/// if absent. A concurrent insert of the same pair is absorbed by the
/// unique index, so every caller reads back the same row.
pub async fn find_or_create(
    db: &Database,
    user_id: &str,
    phone_number: &str,
    name: Option<String>,
) -> Result<Contact, CourierError> {
    let user_id = user_id.to_string();
    let phone_number = phone_number.to_string();
    let id = new_id();
    let created_at = to_text(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (id, user_id, phone_number, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id, phone_number) DO NOTHING",
                params![id, user_id, phone_number, name, created_at],
            )?;
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM contacts WHERE user_id = ?1 AND phone_number = ?2"
                ),
                params![user_id, phone_number],
                from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_id(db: &Database, id: &str) -> Result<Option<Contact>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM contacts WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
