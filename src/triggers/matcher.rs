//! Keyword matching.
//!
//! A category matches when any of its keywords occurs anywhere in the
//! lowercased message text. There is no word-boundary check: "bog" matches
//! "zaBOGatyi". Substrings of longer words are intended to match.

use crate::storage::{Category, EffectiveCategories};

/// Checks whether a message text matches a category's keywords.
///
/// A category without keywords never matches.
#[must_use]
pub fn matches(message_text: &str, category: &Category) -> bool {
    contains_any(&message_text.to_lowercase(), &category.keyword_tokens())
}

fn contains_any(normalized_text: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|keyword| normalized_text.contains(keyword.as_str()))
}

/// Returns the lowest-id category whose keywords match.
#[must_use]
pub fn first_match<'a>(message_text: &str, categories: &'a EffectiveCategories) -> Option<&'a Category> {
    let text = message_text.to_lowercase();
    categories
        .in_match_order()
        .into_iter()
        .find(|category| contains_any(&text, &category.keyword_tokens()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str, keywords: &str) -> Category {
        Category {
            id,
            name: name.to_owned(),
            keywords: keywords.to_owned(),
            response: String::new(),
            chat_id: Some(-1),
            group_id: None,
            owner_id: None,
        }
    }

    #[test]
    fn test_empty_keywords_never_match() {
        assert!(!matches("anything at all", &category(1, "Empty", "")));
        assert!(!matches("", &category(1, "Empty", " , ,")));
    }

    #[test]
    fn test_case_insensitive_substring() {
        let cat = category(1, "Gods", "bog");
        assert!(matches("zaBOGatyi", &cat));
        assert!(matches("BOG", &cat));
        assert!(!matches("bo g", &cat));
    }

    #[test]
    fn test_any_keyword_matches() {
        let cat = category(1, "Politics", "Election, President");
        assert!(matches("Who will be president?", &cat));
        assert!(matches("ELECTIONS are coming", &cat));
        assert!(!matches("What about the weather?", &cat));
    }

    #[test]
    fn test_unicode_keywords() {
        let cat = category(1, "Выборы", "Президент");
        assert!(matches("Кто станет ПРЕЗИДЕНТОМ?", &cat));
    }

    #[test]
    fn test_first_match_prefers_lowest_id() {
        let merged = EffectiveCategories::merge(
            vec![category(9, "Later", "vote"), category(4, "Earlier", "vote,poll")],
            Vec::new(),
        );
        assert_eq!(first_match("let's VOTE", &merged).unwrap().id, 4);
        assert!(first_match("nothing here", &merged).is_none());
    }
}
