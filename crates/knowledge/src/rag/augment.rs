//! Context augmentation: fold retrieved matches into the last user turn.

use crate::index::RetrievedMatch;
use rmp_llm::ChatMessage;

const NO_REVIEW: &str = "No review available";
const NO_SUBJECT: &str = "No subject available";
const NO_STARS: &str = "No stars available";

/// Render one match as a fixed four-line block.
pub fn render_match(m: &RetrievedMatch) -> String {
    format!(
        "Professor: {}\nReview: {}\nSubject: {}\nStars: {}",
        m.id,
        m.review().as_deref().unwrap_or(NO_REVIEW),
        m.subject().as_deref().unwrap_or(NO_SUBJECT),
        m.stars().as_deref().unwrap_or(NO_STARS),
    )
}

/// Build the augmented user message for `last`.
///
/// Blocks follow the original content after a blank line, separated from
/// each other by a blank line, in match order. With no matches the content
/// is unchanged. The result is always a user turn.
pub fn augment(last: &ChatMessage, matches: &[RetrievedMatch]) -> ChatMessage {
    if matches.is_empty() {
        return ChatMessage::user(last.content.clone());
    }

    let blocks: Vec<String> = matches.iter().map(render_match).collect();
    ChatMessage::user(format!("{}\n\n{}", last.content, blocks.join("\n\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmp_llm::Role;
    use serde_json::{json, Map, Value};

    fn retrieved(id: &str, metadata: Value) -> RetrievedMatch {
        RetrievedMatch {
            id: id.to_string(),
            score: None,
            metadata: metadata.as_object().cloned().unwrap_or_else(Map::new),
            rank: 0,
        }
    }

    #[test]
    fn test_render_full_block() {
        let m = retrieved(
            "Dr. Jane Smith",
            json!({"review": "Clear explanations", "subject": "Chemistry", "stars": 5}),
        );

        assert_eq!(
            render_match(&m),
            "Professor: Dr. Jane Smith\nReview: Clear explanations\nSubject: Chemistry\nStars: 5"
        );
    }

    #[test]
    fn test_empty_metadata_uses_fallbacks() {
        let block = render_match(&retrieved("Dr. Lee", json!({})));

        assert_eq!(
            block,
            "Professor: Dr. Lee\nReview: No review available\nSubject: No subject available\nStars: No stars available"
        );
    }

    #[test]
    fn test_augment_appends_blocks_in_order() {
        let last = ChatMessage::user("Who teaches chemistry well?");
        let matches = vec![
            retrieved("A", json!({"stars": 4})),
            retrieved("B", json!({"subject": "Physics"})),
        ];

        let augmented = augment(&last, &matches);
        assert_eq!(augmented.role, Role::User);

        let (head, tail) = augmented.content.split_once("\n\n").unwrap();
        assert_eq!(head, "Who teaches chemistry well?");
        let blocks: Vec<&str> = tail.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("Professor: A\n"));
        assert!(blocks[1].starts_with("Professor: B\n"));
        assert!(blocks[1].contains("Subject: Physics"));
    }

    #[test]
    fn test_augment_without_matches_keeps_content() {
        let last = ChatMessage::user("Anyone for art history?");
        let augmented = augment(&last, &[]);
        assert_eq!(augmented, last);
    }

    #[test]
    fn test_augmented_role_is_always_user() {
        let last = ChatMessage::assistant("odd trailing turn");
        assert_eq!(augment(&last, &[]).role, Role::User);
    }
}
