//! Postgres-backed study repositories.
//!
//! Row structs mirror the tables in `migrations/0001_init.sql`; conversion
//! into domain types validates enums and ranges and reports bad data as
//! [`StoreError::CorruptRow`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use studyforge_core::{CardId, DeckId, ReviewId, SessionId, UserId};
use studyforge_study::{
    AnswerResult, Card, CardReview, Deck, Difficulty, Mastery, StudyAlgorithm, StudySession,
};

use super::{DeckRepository, ReviewLog, SessionRepository};
use crate::error::StoreError;

const CARD_COLUMNS: &str = "id, deck_id, front, back, difficulty_label, mastery_level, \
                            review_count, next_review_at, last_reviewed_at, created_at";

const SESSION_COLUMNS: &str = "id, deck_id, user_id, algorithm, started_at, ended_at, \
                               cards_studied, cards_mastered, duration_seconds";

#[derive(Debug, Clone)]
pub struct PostgresDeckRepository {
    pool: Arc<PgPool>,
}

impl PostgresDeckRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl DeckRepository for PostgresDeckRepository {
    #[instrument(
        skip(self, deck, cards),
        fields(deck_id = %deck.id, card_count = cards.len()),
        err
    )]
    async fn insert_deck_with_cards(&self, deck: &Deck, cards: &[Card]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO decks (id, owner_id, name, description, color, is_public, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(deck.id.as_uuid())
        .bind(deck.owner_id.as_uuid())
        .bind(&deck.name)
        .bind(&deck.description)
        .bind(&deck.color)
        .bind(deck.is_public)
        .bind(deck.created_at)
        .execute(&mut *tx)
        .await?;

        for card in cards {
            sqlx::query(&format!(
                "INSERT INTO cards ({CARD_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
            ))
            .bind(card.id.as_uuid())
            .bind(card.deck_id.as_uuid())
            .bind(&card.front)
            .bind(&card.back)
            .bind(card.difficulty_label.as_str())
            .bind(i16::from(card.mastery_level.value()))
            .bind(to_i32(card.review_count))
            .bind(card.next_review_at)
            .bind(card.last_reviewed_at)
            .bind(card.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(deck_id = %deck_id), err)]
    async fn get_deck(&self, deck_id: DeckId) -> Result<Option<Deck>, StoreError> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, description, color, is_public, created_at \
             FROM decks WHERE id = $1",
        )
        .bind(deck_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Deck {
                id: DeckId::from_uuid(r.try_get("id")?),
                owner_id: UserId::from_uuid(r.try_get("owner_id")?),
                name: r.try_get("name")?,
                description: r.try_get("description")?,
                color: r.try_get("color")?,
                is_public: r.try_get("is_public")?,
                created_at: r.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(deck_id = %deck_id), err)]
    async fn list_cards(&self, deck_id: DeckId) -> Result<Vec<Card>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE deck_id = $1 ORDER BY created_at, id"
        ))
        .bind(deck_id.as_uuid())
        .fetch_all(&*self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<Card, StoreError> { CardRow::from_row(r)?.try_into() })
            .collect()
    }

    #[instrument(skip(self), fields(card_id = %card_id), err)]
    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>, StoreError> {
        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = $1"))
            .bind(card_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(CardRow::from_row(&r)?.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, card), fields(card_id = %card.id), err)]
    async fn save_card_schedule(&self, card: &Card) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cards
            SET mastery_level = $2, review_count = $3, next_review_at = $4, last_reviewed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(card.id.as_uuid())
        .bind(i16::from(card.mastery_level.value()))
        .bind(to_i32(card.review_count))
        .bind(card.next_review_at)
        .bind(card.last_reviewed_at)
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("card {}", card.id)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresSessionRepository {
    pool: Arc<PgPool>,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    #[instrument(skip(self), fields(session_id = %session_id), err)]
    async fn get(&self, session_id: SessionId) -> Result<Option<StudySession>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM study_sessions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(session_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(SessionRow::from_row(&r)?.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(deck_id = %deck_id, user_id = %user_id), err)]
    async fn list_open(
        &self,
        deck_id: DeckId,
        user_id: UserId,
    ) -> Result<Vec<StudySession>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM study_sessions \
             WHERE deck_id = $1 AND user_id = $2 AND ended_at IS NULL"
        ))
        .bind(deck_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<StudySession, StoreError> { SessionRow::from_row(r)?.try_into() })
            .collect()
    }

    #[instrument(skip(self, session), fields(session_id = %session.id), err)]
    async fn insert(&self, session: &StudySession) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO study_sessions ({SESSION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(session.id.as_uuid())
        .bind(session.deck_id.as_uuid())
        .bind(session.user_id.as_uuid())
        .bind(session.algorithm.as_str())
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(to_i32(session.cards_studied))
        .bind(to_i32(session.cards_mastered))
        .bind(to_i32(session.duration_seconds))
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(session_id = %session.id), err)]
    async fn save(&self, session: &StudySession) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE study_sessions
            SET ended_at = $2, cards_studied = $3, cards_mastered = $4, duration_seconds = $5
            WHERE id = $1
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(session.ended_at)
        .bind(to_i32(session.cards_studied))
        .bind(to_i32(session.cards_mastered))
        .bind(to_i32(session.duration_seconds))
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("session {}", session.id)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresReviewLog {
    pool: Arc<PgPool>,
}

impl PostgresReviewLog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl ReviewLog for PostgresReviewLog {
    #[instrument(
        skip(self, review),
        fields(card_id = %review.card_id, session_id = %review.session_id),
        err
    )]
    async fn append(&self, review: &CardReview) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO card_reviews
                (id, card_id, session_id, result, previous_mastery, new_mastery, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(review.id.as_uuid())
        .bind(review.card_id.as_uuid())
        .bind(review.session_id.as_uuid())
        .bind(review.result.as_str())
        .bind(i16::from(review.previous_mastery.value()))
        .bind(i16::from(review.new_mastery.value()))
        .bind(review.created_at)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %session_id), err)]
    async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<CardReview>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, card_id, session_id, result, previous_mastery, new_mastery, created_at
            FROM card_reviews
            WHERE session_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(session_id.as_uuid())
        .fetch_all(&*self.pool)
        .await?;

        let mut reviews = Vec::with_capacity(rows.len());
        for r in rows {
            let result: String = r.try_get("result")?;
            reviews.push(CardReview {
                id: ReviewId::from_uuid(r.try_get("id")?),
                card_id: CardId::from_uuid(r.try_get("card_id")?),
                session_id: SessionId::from_uuid(r.try_get("session_id")?),
                result: result.parse::<AnswerResult>().map_err(corrupt)?,
                previous_mastery: mastery(r.try_get("previous_mastery")?)?,
                new_mastery: mastery(r.try_get("new_mastery")?)?,
                created_at: r.try_get("created_at")?,
            });
        }
        Ok(reviews)
    }
}

struct CardRow {
    id: uuid::Uuid,
    deck_id: uuid::Uuid,
    front: String,
    back: String,
    difficulty_label: String,
    mastery_level: i16,
    review_count: i32,
    next_review_at: Option<DateTime<Utc>>,
    last_reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for CardRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(CardRow {
            id: row.try_get("id")?,
            deck_id: row.try_get("deck_id")?,
            front: row.try_get("front")?,
            back: row.try_get("back")?,
            difficulty_label: row.try_get("difficulty_label")?,
            mastery_level: row.try_get("mastery_level")?,
            review_count: row.try_get("review_count")?,
            next_review_at: row.try_get("next_review_at")?,
            last_reviewed_at: row.try_get("last_reviewed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<CardRow> for Card {
    type Error = StoreError;

    fn try_from(row: CardRow) -> Result<Self, Self::Error> {
        Ok(Card {
            id: CardId::from_uuid(row.id),
            deck_id: DeckId::from_uuid(row.deck_id),
            front: row.front,
            back: row.back,
            difficulty_label: row.difficulty_label.parse::<Difficulty>().map_err(corrupt)?,
            mastery_level: mastery(row.mastery_level)?,
            review_count: to_u32(row.review_count)?,
            next_review_at: row.next_review_at,
            last_reviewed_at: row.last_reviewed_at,
            created_at: row.created_at,
        })
    }
}

struct SessionRow {
    id: uuid::Uuid,
    deck_id: uuid::Uuid,
    user_id: uuid::Uuid,
    algorithm: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    cards_studied: i32,
    cards_mastered: i32,
    duration_seconds: i32,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for SessionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(SessionRow {
            id: row.try_get("id")?,
            deck_id: row.try_get("deck_id")?,
            user_id: row.try_get("user_id")?,
            algorithm: row.try_get("algorithm")?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            cards_studied: row.try_get("cards_studied")?,
            cards_mastered: row.try_get("cards_mastered")?,
            duration_seconds: row.try_get("duration_seconds")?,
        })
    }
}

impl TryFrom<SessionRow> for StudySession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(StudySession {
            id: SessionId::from_uuid(row.id),
            deck_id: DeckId::from_uuid(row.deck_id),
            user_id: UserId::from_uuid(row.user_id),
            algorithm: row.algorithm.parse::<StudyAlgorithm>().map_err(corrupt)?,
            started_at: row.started_at,
            ended_at: row.ended_at,
            cards_studied: to_u32(row.cards_studied)?,
            cards_mastered: to_u32(row.cards_mastered)?,
            duration_seconds: to_u32(row.duration_seconds)?,
        })
    }
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    StoreError::CorruptRow(err.to_string())
}

fn mastery(raw: i16) -> Result<Mastery, StoreError> {
    let value = u8::try_from(raw).map_err(|_| corrupt(format!("mastery out of range: {raw}")))?;
    Mastery::new(value).map_err(corrupt)
}

fn to_u32(raw: i32) -> Result<u32, StoreError> {
    u32::try_from(raw).map_err(|_| corrupt(format!("negative counter: {raw}")))
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
