//! Shorthand-token translation.
//!
//! Record text embeds emoji shorthand of the form `[em]e123[/em]`. Each
//! occurrence is resolved through a [`NameLookup`], potentially networked
//! and slow, so all occurrences of a record resolve concurrently. A lookup
//! miss or failure degrades that one token to a deterministic fallback
//! built from its id; it never aborts translation of the rest of the text.

use crate::error::ServiceError;
use crate::model::{ContentRecord, Entity};
use crate::service::NameLookup;
use futures::future::join_all;
use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[em\]e(\d+)\[/em\]").expect("literal pattern compiles"))
}

/// Display form used when a lookup has no result (or fails) for `id`.
pub fn fallback_text(id: u64) -> String {
    format!("[e{id}]")
}

async fn resolve(lookup: &dyn NameLookup, id: u64) -> String {
    match lookup.lookup(id).await {
        Ok(Some(name)) => name,
        Ok(None) => fallback_text(id),
        Err(error) => {
            log_lookup_failure(id, &error);
            fallback_text(id)
        }
    }
}

fn log_lookup_failure(id: u64, error: &ServiceError) {
    tracing::debug!(id, error = %error, "tag lookup failed; using fallback");
}

/// Replace every shorthand token in `text` with its resolved display form.
///
/// Non-token text is preserved verbatim and ordering is untouched. Zero
/// tokens means an identity copy; lookups for all tokens run concurrently.
pub async fn translate_text(lookup: &dyn NameLookup, text: &str) -> String {
    let pattern = tag_pattern();

    // (literal text before the token, token id), in order of appearance.
    let mut segments: Vec<(&str, u64)> = Vec::new();
    let mut base = 0;
    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        // An id too large for u64 stays literal (base not advanced).
        let Ok(id) = digits.as_str().parse::<u64>() else {
            continue;
        };
        segments.push((&text[base..whole.start()], id));
        base = whole.end();
    }

    if segments.is_empty() {
        return text.to_string();
    }

    let resolved = join_all(segments.iter().map(|(_, id)| resolve(lookup, *id))).await;

    let mut out = String::with_capacity(text.len());
    for ((prefix, _), replacement) in segments.iter().zip(resolved) {
        out.push_str(prefix);
        out.push_str(&replacement);
    }
    out.push_str(&text[base..]);
    out
}

/// Translate a span sequence: token substitution inside `Text` spans, and
/// `Emoji` spans resolved to `Text` in place (the image is removed, its
/// display text takes its position). Adjacent text spans are coalesced so
/// the resolved form reads as one run. All spans translate concurrently.
pub async fn translate_entities(lookup: &dyn NameLookup, entities: Vec<Entity>) -> Vec<Entity> {
    let translated = join_all(entities.into_iter().map(|entity| async move {
        match entity {
            Entity::Text { text } => Entity::Text {
                text: translate_text(lookup, &text).await,
            },
            Entity::Emoji { id } => Entity::Text {
                text: resolve(lookup, id).await,
            },
            other => other,
        }
    }))
    .await;

    coalesce(translated)
}

fn coalesce(entities: Vec<Entity>) -> Vec<Entity> {
    let mut out: Vec<Entity> = Vec::with_capacity(entities.len());
    for entity in entities {
        match (out.last_mut(), entity) {
            (Some(Entity::Text { text: prev }), Entity::Text { text }) => prev.push_str(&text),
            (_, entity) => out.push(entity),
        }
    }
    out
}

/// Translate a whole record: owner name and entities, concurrently.
pub async fn translate_record(lookup: &dyn NameLookup, record: &mut ContentRecord) {
    let entities = std::mem::take(&mut record.entities);
    let (owner_name, entities) = tokio::join!(
        translate_text(lookup, &record.owner_name),
        translate_entities(lookup, entities),
    );
    record.owner_name = owner_name;
    record.entities = entities;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct MapLookup {
        names: HashMap<u64, String>,
        failing: Vec<u64>,
    }

    impl MapLookup {
        fn new(pairs: &[(u64, &str)]) -> Self {
            Self {
                names: pairs.iter().map(|(k, v)| (*k, v.to_string())).collect(),
                failing: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl NameLookup for MapLookup {
        async fn lookup(&self, id: u64) -> Result<Option<String>, ServiceError> {
            if self.failing.contains(&id) {
                return Err(ServiceError::Transport("lookup backend down".into()));
            }
            Ok(self.names.get(&id).cloned())
        }
    }

    #[tokio::test]
    async fn test_zero_tokens_is_identity() {
        let lookup = MapLookup::new(&[]);
        let text = "plain text, no tokens at all [em]not-a-token[/em]";
        assert_eq!(translate_text(&lookup, text).await, text);
    }

    #[tokio::test]
    async fn test_tokens_substituted_in_order() {
        let lookup = MapLookup::new(&[(100, "smile"), (200, "wave")]);
        let out = translate_text(&lookup, "hi [em]e100[/em] and [em]e200[/em]!").await;
        assert_eq!(out, "hi smile and wave!");
    }

    #[tokio::test]
    async fn test_adjacent_tokens() {
        let lookup = MapLookup::new(&[(1, "a"), (2, "b")]);
        let out = translate_text(&lookup, "[em]e1[/em][em]e2[/em]").await;
        assert_eq!(out, "ab");
    }

    #[tokio::test]
    async fn test_unknown_id_uses_fallback() {
        let lookup = MapLookup::new(&[]);
        let out = translate_text(&lookup, "x [em]e404[/em] y").await;
        assert_eq!(out, "x [e404] y");
    }

    #[tokio::test]
    async fn test_single_failure_degrades_one_token_only() {
        let mut lookup = MapLookup::new(&[(1, "ok")]);
        lookup.failing.push(2);
        let out = translate_text(&lookup, "[em]e1[/em]/[em]e2[/em]/[em]e1[/em]").await;
        assert_eq!(out, "ok/[e2]/ok");
    }

    #[tokio::test]
    async fn test_emoji_spans_become_text_and_coalesce() {
        let lookup = MapLookup::new(&[(5, "sun")]);
        let entities = vec![
            Entity::text("good "),
            Entity::Emoji { id: 5 },
            Entity::text(" morning"),
            Entity::Mention {
                owner_id: 9,
                name: "ada".to_string(),
            },
        ];

        let out = translate_entities(&lookup, entities).await;
        assert_eq!(
            out,
            vec![
                Entity::text("good sun morning"),
                Entity::Mention {
                    owner_id: 9,
                    name: "ada".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_translate_record_covers_owner_name() {
        let lookup = MapLookup::new(&[(3, "star")]);
        let raw = crate::model::RawRecord::Web(crate::model::WebRecord {
            app_id: 311,
            type_id: 0,
            record_id: "fid".to_string(),
            created_at: 0,
            owner_id: 1,
            owner_name: "night[em]e3[/em]".to_string(),
            is_liked: false,
            markup: String::new(),
        });
        let mut record = ContentRecord::from_raw(&raw, crate::model::BatchId(0));
        record.entities = vec![Entity::text("see [em]e3[/em]")];

        translate_record(&lookup, &mut record).await;
        assert_eq!(record.owner_name, "nightstar");
        assert_eq!(record.entities, vec![Entity::text("see star")]);
    }
}
