//! Plain-text rendering for the terminal.

use auth_bridge::AuthSnapshot;
use chrono::{TimeZone, Utc};
use collection_sync::{Post, Todo};
use std::fmt::Write;

pub fn todos(todos: &[Todo]) -> String {
    if todos.is_empty() {
        return "No todos yet.\n".to_string();
    }
    let mut out = String::new();
    for todo in todos {
        let mark = if todo.is_completed { 'x' } else { ' ' };
        let _ = writeln!(out, "[{}] {:>6}  {}", mark, todo.id, todo.text);
    }
    out
}

pub fn posts(posts: &[Post]) -> String {
    if posts.is_empty() {
        return "The feed is empty.\n".to_string();
    }
    let mut out = String::new();
    for post in posts {
        let _ = writeln!(out, "{:>6}  {}", post.id, post.content);
    }
    out
}

pub fn status(snapshot: &AuthSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "state:   {}", snapshot.state.as_str());

    if let Some(user) = &snapshot.user {
        let _ = writeln!(out, "user:    {}", user.id);
        if let Some(email) = &user.email {
            let _ = writeln!(out, "email:   {}", email);
        }
    }

    if let Some(session) = &snapshot.session {
        let expiry = session
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        let suffix = if session.is_expired() { " (expired)" } else { "" };
        let _ = writeln!(out, "expires: {}{}", expiry, suffix);
    }
    out
}

/// Clear the screen and draw `body`.
pub fn redraw(title: &str, body: &str) {
    print!("\x1b[2J\x1b[H");
    println!("{}  (Ctrl-C to stop)\n", title);
    print!("{}", body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_bridge::{AuthState, Session, User};
    use collection_sync::RowId;

    #[test]
    fn test_todos_marks_completed() {
        let rendered = todos(&[
            Todo {
                id: RowId::from(1),
                text: "buy milk".into(),
                is_completed: true,
            },
            Todo {
                id: RowId::from(2),
                text: "walk dog".into(),
                is_completed: false,
            },
        ]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "[x]      1  buy milk");
        assert_eq!(lines[1], "[ ]      2  walk dog");
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(todos(&[]), "No todos yet.\n");
        assert_eq!(posts(&[]), "The feed is empty.\n");
    }

    #[test]
    fn test_status_anonymous() {
        let snapshot = AuthSnapshot {
            state: AuthState::Anonymous,
            user: None,
            session: None,
        };
        assert_eq!(status(&snapshot), "state:   anonymous\n");
    }

    #[test]
    fn test_status_signed_in() {
        let user = User::new("u-1").with_email("a@example.com");
        let snapshot = AuthSnapshot {
            state: AuthState::Authenticated,
            user: Some(user.clone()),
            session: Some(Session {
                access_token: "a".into(),
                refresh_token: "r".into(),
                expires_in: None,
                expires_at: Some(4_102_444_800),
                token_type: "bearer".into(),
                user,
            }),
        };

        let rendered = status(&snapshot);
        assert!(rendered.contains("state:   authenticated"));
        assert!(rendered.contains("user:    u-1"));
        assert!(rendered.contains("email:   a@example.com"));
        assert!(rendered.contains("expires: 2100-01-01T00:00:00+00:00"));
        assert!(!rendered.contains("expired"));
    }
}
