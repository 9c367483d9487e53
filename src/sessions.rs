//! Attendance sessions: QR check-in windows keyed by a short random token.
//!
//! The registry only tracks who has checked in. Ledger writes are returned to the
//! caller as records to append, so the reconciliation rules stay testable without
//! a store.

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use std::collections::HashMap;

use crate::ledger::{AttendanceRecord, Method, Status};
use crate::roster::Student;

pub const TOKEN_LEN: usize = 8;
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    /// Check-in order is kept for display.
    pub checked_in: Vec<String>,
}

impl Session {
    pub fn is_checked_in(&self, student_id: &str) -> bool {
        self.checked_in.iter().any(|id| id == student_id)
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session {token} expired at {expires_at}")]
    Expired {
        token: String,
        expires_at: NaiveDateTime,
    },
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotFound(_) => "not_found",
            SessionError::Expired { .. } => "session_expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckIn {
    Recorded(AttendanceRecord),
    AlreadyCheckedIn,
}

pub fn generate_token<R: Rng>(rng: &mut R) -> String {
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

pub fn checkin_url(base_url: &str, token: &str) -> String {
    format!("{}/checkin?session={}", base_url.trim_end_matches('/'), token)
}

pub fn qr_file_name(token: &str) -> String {
    format!("attendance_qr_{token}.png")
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    ttl: Duration,
    enforce_expiry: bool,
}

impl SessionRegistry {
    pub fn new(ttl: Duration, enforce_expiry: bool) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
            enforce_expiry,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn get(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    /// Oldest first.
    pub fn list(&self) -> Vec<&Session> {
        let mut out: Vec<&Session> = self.sessions.values().collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.token.cmp(&b.token))
        });
        out
    }

    pub fn create(&mut self, now: NaiveDateTime) -> &Session {
        self.create_with_rng(&mut rand::thread_rng(), now)
    }

    /// Tokens that collide with a live session are redrawn.
    pub fn create_with_rng<R: Rng>(&mut self, rng: &mut R, now: NaiveDateTime) -> &Session {
        let mut token = generate_token(rng);
        while self.sessions.contains_key(&token) {
            token = generate_token(rng);
        }
        let session = Session {
            token: token.clone(),
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(NaiveDateTime::MAX),
            checked_in: Vec::new(),
        };
        self.sessions.entry(token).or_insert(session)
    }

    /// Marks `student` present for the session's day. A repeat check-in is a
    /// no-op. Roster membership is the caller's concern.
    pub fn check_in(
        &mut self,
        token: &str,
        student: &Student,
        now: NaiveDateTime,
    ) -> Result<CheckIn, SessionError> {
        let enforce_expiry = self.enforce_expiry;
        let session = self
            .sessions
            .get_mut(token)
            .ok_or_else(|| SessionError::NotFound(token.to_string()))?;
        if enforce_expiry && session.is_expired(now) {
            return Err(SessionError::Expired {
                token: token.to_string(),
                expires_at: session.expires_at,
            });
        }
        if session.is_checked_in(&student.id) {
            return Ok(CheckIn::AlreadyCheckedIn);
        }
        session.checked_in.push(student.id.clone());
        Ok(CheckIn::Recorded(AttendanceRecord::new(
            student,
            session.created_at.date(),
            Status::Present,
            Method::Qr,
        )))
    }

    /// Removes the session and returns one Absent record per roster student who
    /// never checked in, in roster order.
    pub fn close(
        &mut self,
        token: &str,
        roster: &[Student],
    ) -> Result<Vec<AttendanceRecord>, SessionError> {
        let session = self
            .sessions
            .remove(token)
            .ok_or_else(|| SessionError::NotFound(token.to_string()))?;
        let date = session.created_at.date();
        Ok(roster
            .iter()
            .filter(|s| !session.is_checked_in(&s.id))
            .map(|s| AttendanceRecord::new(s, date, Status::Absent, Method::Qr))
            .collect())
    }
}
