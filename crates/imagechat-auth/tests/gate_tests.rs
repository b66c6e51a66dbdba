use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use imagechat_auth::{AccessGate, QueryHistory, Session};
use imagechat_core::error::Error;
use imagechat_core::traits::{HistoryStore, UserStore};
use imagechat_core::types::{HistoryEntry, User, UserId};

#[derive(Default)]
struct MemUsers {
    // (user, password)
    rows: Mutex<Vec<(User, String)>>,
    next_id: AtomicI64,
}

impl UserStore for MemUsers {
    fn create_user(&self, name: &str, email: &str, password: &str) -> anyhow::Result<User> {
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: name.to_string(),
            email: email.to_string(),
        };
        self.rows.lock().push((user.clone(), password.to_string()));
        Ok(user)
    }

    fn verify_credentials(&self, email: &str, password: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|(u, p)| u.email == email && p == password)
            .map(|(u, _)| u.clone()))
    }

    fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|(u, _)| u.email == email)
            .map(|(u, _)| u.clone()))
    }
}

#[derive(Default)]
struct MemHistory {
    entries: Mutex<Vec<HistoryEntry>>,
    appends: AtomicUsize,
    lists: AtomicUsize,
}

impl HistoryStore for MemHistory {
    fn append(
        &self,
        user_id: UserId,
        query_text: &str,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().push(HistoryEntry {
            user_id,
            query_text: query_text.to_string(),
            timestamp,
        });
        Ok(())
    }

    fn list_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<HistoryEntry>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let mut entries: Vec<HistoryEntry> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.reverse();
        Ok(entries)
    }
}

fn gate_with_user(email: &str, password: &str) -> AccessGate {
    let users = Arc::new(MemUsers::default());
    users
        .create_user("Test User", email, password)
        .expect("seed user");
    AccessGate::new(users)
}

#[test]
fn login_authenticates_the_session() {
    let gate = gate_with_user("sachin@example.com", "straightdrive");
    let mut session = Session::Anonymous;

    let user = gate
        .login(&mut session, "sachin@example.com", "straightdrive")
        .unwrap();

    assert!(session.is_authenticated());
    assert_eq!(session.authenticated_user().unwrap().id, user.id);
}

#[test]
fn wrong_password_leaves_session_anonymous() {
    let gate = gate_with_user("sachin@example.com", "straightdrive");
    let mut session = Session::Anonymous;

    let result = gate.login(&mut session, "sachin@example.com", "wrong");
    assert!(matches!(result, Err(Error::InvalidCredentials)));
    assert!(!session.is_authenticated());
}

#[test]
fn failed_login_discards_the_prior_session() {
    let users = Arc::new(MemUsers::default());
    users.create_user("A", "a@example.com", "pw-a").unwrap();
    let gate = AccessGate::new(users);

    let mut session = Session::Anonymous;
    gate.login(&mut session, "a@example.com", "pw-a").unwrap();
    assert!(session.is_authenticated());

    // A failed login as someone else must not keep A's session alive.
    let result = gate.login(&mut session, "b@example.com", "pw-b");
    assert!(result.is_err());
    assert!(!session.is_authenticated());
}

#[test]
fn logout_and_clear_are_unconditional() {
    let gate = gate_with_user("sachin@example.com", "straightdrive");
    let mut session = Session::Anonymous;
    gate.logout(&mut session);
    assert!(!session.is_authenticated());

    gate.login(&mut session, "sachin@example.com", "straightdrive")
        .unwrap();
    gate.logout(&mut session);
    assert!(!session.is_authenticated());

    gate.login(&mut session, "sachin@example.com", "straightdrive")
        .unwrap();
    gate.clear(&mut session);
    assert!(!session.is_authenticated());
}

#[test]
fn register_never_touches_the_session() {
    let gate = AccessGate::new(Arc::new(MemUsers::default()));
    let session = Session::Anonymous;

    gate.register("New User", "new@example.com", "secret").unwrap();
    assert!(!session.is_authenticated());

    // Still has to log in explicitly.
    let result = gate.require_user(&session);
    assert!(matches!(result, Err(Error::NotAuthenticated)));
}

#[test]
fn duplicate_email_is_rejected_without_a_session() {
    let users = Arc::new(MemUsers::default());
    users.create_user("A", "taken@example.com", "pw").unwrap();
    let gate = AccessGate::new(users);

    match gate.register("B", "taken@example.com", "other") {
        Err(Error::DuplicateEmail(email)) => assert_eq!(email, "taken@example.com"),
        other => panic!("expected DuplicateEmail, got {:?}", other),
    }
}

#[test]
fn register_requires_all_fields() {
    let gate = AccessGate::new(Arc::new(MemUsers::default()));

    assert!(matches!(
        gate.register("  ", "a@example.com", "pw"),
        Err(Error::MissingField("name"))
    ));
    assert!(matches!(
        gate.register("A", "", "pw"),
        Err(Error::MissingField("email"))
    ));
    assert!(matches!(
        gate.register("A", "a@example.com", ""),
        Err(Error::MissingField("password"))
    ));
}

#[test]
fn anonymous_history_operations_touch_no_store() {
    let store = Arc::new(MemHistory::default());
    let history = QueryHistory::new(store.clone());
    let session = Session::Anonymous;

    assert!(matches!(
        history.record(&session, "best cover drive"),
        Err(Error::NotAuthenticated)
    ));
    assert!(matches!(history.list(&session), Err(Error::NotAuthenticated)));
    assert_eq!(store.appends.load(Ordering::SeqCst), 0);
    assert_eq!(store.lists.load(Ordering::SeqCst), 0);
}

#[test]
fn history_round_trip_is_most_recent_first() {
    let users = Arc::new(MemUsers::default());
    users.create_user("A", "a@example.com", "pw").unwrap();
    let gate = AccessGate::new(users);
    let store = Arc::new(MemHistory::default());
    let history = QueryHistory::new(store);

    let mut session = Session::Anonymous;
    gate.login(&mut session, "a@example.com", "pw").unwrap();

    history.record(&session, "first query").unwrap();
    history.record(&session, "second query").unwrap();

    let entries = history.list(&session).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].query_text, "second query");
    assert_eq!(entries[1].query_text, "first query");
}
