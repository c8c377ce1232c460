//! Realistic-looking fixture values for scenario groups.
//!
//! The engine only needs `generate(kind)`; values are unlikely to collide
//! between calls but uniqueness is not guaranteed.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use petname::petname;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    FullName,
    Email,
    SongTitle,
    Genre,
    FreeText,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::FullName => "fullName",
            ValueKind::Email => "email",
            ValueKind::SongTitle => "songTitle",
            ValueKind::Genre => "genre",
            ValueKind::FreeText => "freeText",
        };
        f.write_str(name)
    }
}

pub trait ValueGenerator: Send + Sync {
    fn generate(&self, kind: ValueKind) -> Value;
}

const GENRES: &[&str] = &[
    "Rock", "Jazz", "Blues", "Hip Hop", "Pop", "Reggae", "Country", "Funk", "Soul", "Electronic",
    "Classical", "Folk", "Latin", "Metal",
];

/// Random words from the petname dictionaries plus a UUID suffix for emails.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomGenerator;

impl ValueGenerator for RandomGenerator {
    fn generate(&self, kind: ValueKind) -> Value {
        let text = match kind {
            ValueKind::FullName => title_case(&petname(2, " ")),
            ValueKind::Email => {
                let id = Uuid::new_v4().simple().to_string();
                format!("{}.{}@example.com", petname(2, "."), &id[..8])
            }
            ValueKind::SongTitle => title_case(&petname(3, " ")),
            ValueKind::Genre => GENRES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or("Rock")
                .to_string(),
            ValueKind::FreeText => {
                let mut sentence = petname(8, " ");
                if let Some(first) = sentence.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                sentence.push('.');
                sentence
            }
        };
        Value::String(text)
    }
}

/// Predictable values (`Full Name 1`, `user1@example.test`, ...) for
/// reproducible runs and tests.
#[derive(Debug, Default)]
pub struct SequentialGenerator {
    counter: AtomicU64,
}

impl SequentialGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ValueGenerator for SequentialGenerator {
    fn generate(&self, kind: ValueKind) -> Value {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let text = match kind {
            ValueKind::FullName => format!("Full Name {n}"),
            ValueKind::Email => format!("user{n}@example.test"),
            ValueKind::SongTitle => format!("Song Title {n}"),
            ValueKind::Genre => GENRES[(n as usize - 1) % GENRES.len()].to_string(),
            ValueKind::FreeText => format!("Free text number {n}."),
        };
        Value::String(text)
    }
}

fn title_case(words: &str) -> String {
    words
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
