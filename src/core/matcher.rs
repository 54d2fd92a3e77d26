//! Matching helpdesk operators to chat-service users.
//!
//! Email is the primary key (case-insensitive); a normalised full-name
//! comparison is the fallback. Operators with no counterpart are
//! silently dropped.

use crate::core::ticket::{ChatUser, Operator};

/// Resolve each operator to a chat user id. Several operators may land
/// on the same chat user; the returned list is deduplicated preserving
/// first-seen order.
pub fn match_users(operators: &[Operator], chat_users: &[ChatUser]) -> Vec<String> {
    let mut matched = Vec::new();

    for operator in operators {
        let by_email = (!operator.email.is_empty())
            .then(|| {
                chat_users.iter().find(|user| {
                    user.email
                        .as_deref()
                        .is_some_and(|email| email.eq_ignore_ascii_case(&operator.email))
                })
            })
            .flatten();

        let hit = by_email.or_else(|| {
            let wanted = normalize_name(&operator.name);
            if wanted.is_empty() {
                return None;
            }
            chat_users.iter().find(|user| {
                user.name
                    .as_deref()
                    .is_some_and(|name| normalize_name(name) == wanted)
            })
        });

        if let Some(user) = hit {
            if !matched.iter().any(|id| id == &user.id) {
                matched.push(user.id.clone());
            }
        }
    }

    matched
}

/// Lowercase and collapse internal whitespace so "Ada  Lovelace" and
/// "ada lovelace" compare equal.
fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
