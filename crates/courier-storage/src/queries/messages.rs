// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use chrono::Utc;
use courier_core::{CourierError, Message, MessagePatch, NewMessage};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{enum_col, new_id, opt_time_col, time_col, to_text};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, user_id, contact_id, conversation_id, direction, kind, content, \
                       media_url, status, external_id, created_at, delivered_at, read_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        user_id: row.get(1)?,
        contact_id: row.get(2)?,
        conversation_id: row.get(3)?,
        direction: enum_col(row, 4)?,
        kind: enum_col(row, 5)?,
        content: row.get(6)?,
        media_url: row.get(7)?,
        status: enum_col(row, 8)?,
        external_id: row.get(9)?,
        created_at: time_col(row, 10)?,
        delivered_at: opt_time_col(row, 11)?,
        read_at: opt_time_col(row, 12)?,
    })
}

fn select_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Inserts a message and touches its conversation's `last_message_at`.
pub async fn insert_message(db: &Database, fields: NewMessage) -> Result<Message, CourierError> {
    let now = Utc::now();
    let message = Message {
        id: new_id(),
        user_id: fields.user_id,
        contact_id: fields.contact_id,
        conversation_id: fields.conversation_id,
        direction: fields.direction,
        kind: fields.kind,
        content: fields.content,
        media_url: fields.media_url,
        status: fields.status,
        external_id: None,
        created_at: now,
        delivered_at: None,
        read_at: None,
    };
    let row = message.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let created_at = to_text(&row.created_at);
            tx.execute(
                &format!(
                    "INSERT INTO messages ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, NULL, NULL)"
                ),
                params![
                    row.id,
                    row.user_id,
                    row.contact_id,
                    row.conversation_id,
                    row.direction.to_string(),
                    row.kind.to_string(),
                    row.content,
                    row.media_url,
                    row.status.to_string(),
                    created_at,
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET last_message_at = ?2 WHERE id = ?1",
                params![row.conversation_id, created_at],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)?;
    Ok(message)
}

/// Applies the non-`None` fields of `patch`. Returns `None` if no row matched.
pub async fn update_message(
    db: &Database,
    id: &str,
    patch: MessagePatch,
) -> Result<Option<Message>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET
                     status = COALESCE(?2, status),
                     external_id = COALESCE(?3, external_id),
                     delivered_at = COALESCE(?4, delivered_at),
                     read_at = COALESCE(?5, read_at)
                 WHERE id = ?1",
                params![
                    id,
                    patch.status.map(|s| s.to_string()),
                    patch.external_id,
                    patch.delivered_at.as_ref().map(to_text),
                    patch.read_at.as_ref().map(to_text),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_by_id(conn, &id)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_message(db: &Database, id: &str) -> Result<Option<Message>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_by_id(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Looks a message up by the transport-assigned id. The most recent row
/// wins if the transport ever reused an id.
pub async fn get_message_by_external_id(
    db: &Database,
    external_id: &str,
) -> Result<Option<Message>, CourierError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM messages WHERE external_id = ?1
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![external_id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{contacts, conversations};
    use courier_core::{Direction, MessageKind, MessageStatus};
    use tempfile::tempdir;

    async fn setup() -> (Database, NewMessage, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let contact = contacts::find_or_create(&db, "u1", "15551234567", None)
            .await
            .unwrap();
        let conversation = conversations::find_or_create(&db, "u1", &contact.id)
            .await
            .unwrap();
        let fields = NewMessage {
            user_id: "u1".into(),
            contact_id: contact.id,
            conversation_id: conversation.id,
            direction: Direction::Outgoing,
            kind: MessageKind::Text,
            content: Some("hello".into()),
            media_url: None,
            status: MessageStatus::Pending,
        };
        (db, fields, dir)
    }

    #[tokio::test]
    async fn insert_touches_conversation() {
        let (db, fields, _dir) = setup().await;
        let conversation_id = fields.conversation_id.clone();
        let message = insert_message(&db, fields).await.unwrap();

        let last: Option<String> = db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "SELECT last_message_at FROM conversations WHERE id = ?1",
                    params![conversation_id],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(last, Some(to_text(&message.created_at)));
    }

    #[tokio::test]
    async fn patch_leaves_unset_fields_untouched() {
        let (db, fields, _dir) = setup().await;
        let message = insert_message(&db, fields).await.unwrap();

        let sent = update_message(
            &db,
            &message.id,
            MessagePatch {
                external_id: Some("ext-1".into()),
                ..MessagePatch::status(MessageStatus::Sent)
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(sent.status, MessageStatus::Sent);

        let delivered = update_message(&db, &message.id, MessagePatch::status(MessageStatus::Delivered))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.external_id.as_deref(), Some("ext-1"));
        assert_eq!(delivered.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn update_of_missing_row_returns_none() {
        let (db, _, _dir) = setup().await;
        let updated = update_message(&db, "missing", MessagePatch::status(MessageStatus::Sent))
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn lookup_by_external_id() {
        let (db, fields, _dir) = setup().await;
        let message = insert_message(&db, fields).await.unwrap();
        update_message(
            &db,
            &message.id,
            MessagePatch {
                external_id: Some("ext-9".into()),
                ..MessagePatch::status(MessageStatus::Sent)
            },
        )
        .await
        .unwrap();

        let found = get_message_by_external_id(&db, "ext-9").await.unwrap().unwrap();
        assert_eq!(found.id, message.id);
        assert!(get_message_by_external_id(&db, "ext-0").await.unwrap().is_none());
    }
}
