//! In-memory index of conversation threads and the active-thread pointer.
//!
//! Reconciliation rules: threads created locally are usable immediately and only adopt
//! the server-issued id while they are still empty; threads loaded from the server
//! replace whatever was cached for them.

use std::collections::HashMap;

use tracing::debug;

use crate::core::constants::DEFAULT_THREAD_TITLE;
use crate::core::message::Message;
use crate::core::thread_id::ThreadId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadState {
    pub id: ThreadId,
    pub title: String,
    pub messages: Vec<Message>,
}

impl ThreadState {
    pub fn new(id: ThreadId) -> Self {
        Self {
            id,
            title: DEFAULT_THREAD_TITLE.to_string(),
            messages: Vec::new(),
        }
    }

    pub fn with_history(id: ThreadId, title: Option<&str>, messages: Vec<Message>) -> Self {
        Self {
            id,
            title: normalize_title(title.unwrap_or_default()),
            messages,
        }
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role.is_user())
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role.is_user())
    }
}

/// Trim a title and substitute the default for blank input.
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_THREAD_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Owner of every [`ThreadState`]. Exactly one thread is active at any time; it may be
/// unlisted (a fresh local thread that has not been used yet).
#[derive(Debug)]
pub struct ThreadRegistry {
    threads: HashMap<ThreadId, ThreadState>,
    /// Listed threads, oldest first.
    order: Vec<ThreadId>,
    active: ThreadId,
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadRegistry {
    /// Start with a single unlisted local thread as the active one.
    pub fn new() -> Self {
        let active = ThreadId::generate();
        let mut threads = HashMap::new();
        threads.insert(active.clone(), ThreadState::new(active.clone()));
        Self {
            threads,
            order: Vec::new(),
            active,
        }
    }

    pub fn active_id(&self) -> &ThreadId {
        &self.active
    }

    pub fn active(&self) -> &ThreadState {
        self.threads
            .get(&self.active)
            .unwrap_or_else(|| unreachable!("active thread is always registered"))
    }

    pub fn is_active(&self, id: &ThreadId) -> bool {
        &self.active == id
    }

    pub fn get(&self, id: &ThreadId) -> Option<&ThreadState> {
        self.threads.get(id)
    }

    pub fn contains(&self, id: &ThreadId) -> bool {
        self.threads.contains_key(id)
    }

    pub fn title(&self, id: &ThreadId) -> &str {
        self.threads
            .get(id)
            .map(|t| t.title.as_str())
            .unwrap_or(DEFAULT_THREAD_TITLE)
    }

    /// Listed thread ids, oldest first.
    pub fn list_threads(&self) -> &[ThreadId] {
        &self.order
    }

    pub fn is_listed(&self, id: &ThreadId) -> bool {
        self.order.contains(id)
    }

    /// Register a new local thread, list it, and make it active.
    pub fn create_thread(&mut self) -> ThreadId {
        let id = ThreadId::generate();
        self.threads.insert(id.clone(), ThreadState::new(id.clone()));
        self.order.push(id.clone());
        self.active = id.clone();
        id
    }

    /// Adopt the server-issued id for a locally created thread.
    ///
    /// The rename only happens while the local thread is still empty: once a message has
    /// been sent under the local id the server already knows the thread by that id.
    /// Returns the id the thread is known by afterwards, or `None` if the local thread
    /// no longer exists.
    pub fn confirm_thread(&mut self, local: &ThreadId, server: ThreadId) -> Option<ThreadId> {
        let state = self.threads.get(local)?;
        if *local == server || !state.messages.is_empty() {
            return Some(local.clone());
        }

        if let Some(mut state) = self.threads.remove(local) {
            state.id = server.clone();
            self.threads.entry(server.clone()).or_insert(state);
        }

        let already_listed = self.order.contains(&server);
        if let Some(pos) = self.order.iter().position(|id| id == local) {
            if already_listed {
                self.order.remove(pos);
            } else {
                self.order[pos] = server.clone();
            }
        }
        if self.active == *local {
            self.active = server.clone();
        }
        debug!(local = %local, server = %server, "Adopted server thread id");
        Some(server)
    }

    /// Add server-known threads that are not cached yet. Returns the newly added ids.
    pub fn merge_server_threads(&mut self, ids: Vec<ThreadId>) -> Vec<ThreadId> {
        let mut added = Vec::new();
        for id in ids {
            if !self.threads.contains_key(&id) {
                self.threads.insert(id.clone(), ThreadState::new(id.clone()));
                added.push(id.clone());
            }
            if !self.order.contains(&id) {
                self.order.push(id);
            }
        }
        added
    }

    /// Install a server snapshot of a thread and make it active.
    pub fn load_thread(&mut self, state: ThreadState) {
        let id = state.id.clone();
        let state = ThreadState {
            title: normalize_title(&state.title),
            ..state
        };
        self.threads.insert(id.clone(), state);
        if !self.order.contains(&id) {
            self.order.push(id.clone());
        }
        self.active = id;
    }

    /// Remove a thread. Deleting the active thread activates a fresh, unlisted local one.
    pub fn delete_thread(&mut self, id: &ThreadId) -> Option<ThreadState> {
        let removed = self.threads.remove(id);
        self.order.retain(|listed| listed != id);
        if self.active == *id {
            let fresh = ThreadId::generate();
            self.threads
                .insert(fresh.clone(), ThreadState::new(fresh.clone()));
            self.active = fresh;
        }
        removed
    }

    /// Append to a thread's history; a thread becomes listed once it has messages.
    /// Returns `false` when the thread is unknown (for example deleted mid-stream).
    pub fn append_message(&mut self, id: &ThreadId, message: Message) -> bool {
        let Some(state) = self.threads.get_mut(id) else {
            return false;
        };
        state.messages.push(message);
        if !self.order.contains(id) {
            self.order.push(id.clone());
        }
        true
    }

    pub fn set_title(&mut self, id: &ThreadId, title: &str) -> bool {
        match self.threads.get_mut(id) {
            Some(state) => {
                state.title = normalize_title(title);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_unlisted_empty_active_thread() {
        let registry = ThreadRegistry::new();
        assert!(registry.list_threads().is_empty());
        assert!(registry.active().messages.is_empty());
        assert_eq!(registry.active().title, DEFAULT_THREAD_TITLE);
    }

    #[test]
    fn create_thread_registers_and_activates() {
        let mut registry = ThreadRegistry::new();
        let id = registry.create_thread();
        assert_eq!(registry.active_id(), &id);
        assert_eq!(registry.list_threads(), &[id.clone()]);
        assert_eq!(registry.title(&id), DEFAULT_THREAD_TITLE);
    }

    #[test]
    fn deleting_active_thread_activates_fresh_thread() {
        let mut registry = ThreadRegistry::new();
        let id = registry.create_thread();
        registry.append_message(&id, Message::user("hello"));
        registry.set_title(&id, "Greetings");

        let removed = registry.delete_thread(&id).expect("removed");
        assert_eq!(removed.messages.len(), 1);

        let active = registry.active();
        assert_ne!(active.id, id);
        assert!(active.messages.is_empty());
        assert_eq!(active.title, DEFAULT_THREAD_TITLE);
        assert!(!registry.contains(&id));
        assert!(registry.list_threads().is_empty());
    }

    #[test]
    fn deleting_other_thread_keeps_active_untouched() {
        let mut registry = ThreadRegistry::new();
        let other = registry.create_thread();
        let active = registry.create_thread();
        registry.append_message(&active, Message::user("keep me"));

        registry.delete_thread(&other);

        assert_eq!(registry.active_id(), &active);
        assert_eq!(registry.active().messages, vec![Message::user("keep me")]);
        assert_eq!(registry.list_threads(), &[active]);
    }

    #[test]
    fn titles_never_become_empty() {
        let mut registry = ThreadRegistry::new();
        let id = registry.create_thread();
        assert!(registry.set_title(&id, "  Rust Lifetimes  "));
        assert_eq!(registry.title(&id), "Rust Lifetimes");
        assert!(registry.set_title(&id, "   "));
        assert_eq!(registry.title(&id), DEFAULT_THREAD_TITLE);
        assert!(!registry.set_title(&ThreadId::from("missing"), "x"));
    }

    #[test]
    fn append_preserves_order_and_lists_thread() {
        let mut registry = ThreadRegistry::new();
        let id = registry.active_id().clone();
        assert!(registry.append_message(&id, Message::user("one")));
        assert!(registry.append_message(&id, Message::assistant("two")));
        assert_eq!(
            registry.active().messages,
            vec![Message::user("one"), Message::assistant("two")]
        );
        assert_eq!(registry.list_threads(), &[id]);
        assert!(!registry.append_message(&ThreadId::from("gone"), Message::user("x")));
    }

    #[test]
    fn confirm_renames_empty_local_thread() {
        let mut registry = ThreadRegistry::new();
        let local = registry.create_thread();
        let server = ThreadId::from("srv-1");

        assert_eq!(
            registry.confirm_thread(&local, server.clone()),
            Some(server.clone())
        );
        assert_eq!(registry.active_id(), &server);
        assert_eq!(registry.list_threads(), &[server.clone()]);
        assert!(!registry.contains(&local));
        assert_eq!(registry.active().id, server);
    }

    #[test]
    fn confirm_keeps_local_id_once_used() {
        let mut registry = ThreadRegistry::new();
        let local = registry.create_thread();
        registry.append_message(&local, Message::user("already chatting"));

        assert_eq!(
            registry.confirm_thread(&local, ThreadId::from("srv-2")),
            Some(local.clone())
        );
        assert_eq!(registry.active_id(), &local);
        assert!(!registry.contains(&ThreadId::from("srv-2")));
    }

    #[test]
    fn confirm_after_delete_is_ignored() {
        let mut registry = ThreadRegistry::new();
        let local = registry.create_thread();
        registry.delete_thread(&local);
        assert_eq!(registry.confirm_thread(&local, ThreadId::from("srv")), None);
        assert!(!registry.contains(&ThreadId::from("srv")));
    }

    #[test]
    fn merge_adds_unknown_threads_only() {
        let mut registry = ThreadRegistry::new();
        let local = registry.create_thread();
        registry.set_title(&local, "Local");

        let added = registry.merge_server_threads(vec![local.clone(), "a".into(), "b".into()]);
        assert_eq!(added, vec![ThreadId::from("a"), ThreadId::from("b")]);
        assert_eq!(registry.title(&local), "Local");
        assert_eq!(registry.list_threads().len(), 3);

        let again = registry.merge_server_threads(vec!["a".into()]);
        assert!(again.is_empty());
        assert_eq!(registry.list_threads().len(), 3);
    }

    #[test]
    fn load_thread_is_server_first() {
        let mut registry = ThreadRegistry::new();
        let id = ThreadId::from("srv");
        registry.merge_server_threads(vec![id.clone()]);
        registry.append_message(&id, Message::user("stale"));

        registry.load_thread(ThreadState::with_history(
            id.clone(),
            Some("Loaded"),
            vec![Message::user("fresh"), Message::assistant("reply")],
        ));

        assert_eq!(registry.active_id(), &id);
        assert_eq!(registry.active().title, "Loaded");
        assert_eq!(
            registry.active().messages,
            vec![Message::user("fresh"), Message::assistant("reply")]
        );
        assert_eq!(registry.list_threads(), &[id]);
    }

    #[test]
    fn last_user_message_skips_assistant_replies() {
        let state = ThreadState::with_history(
            ThreadId::from("t"),
            None,
            vec![
                Message::user("first"),
                Message::assistant("a"),
                Message::user("second"),
                Message::assistant("b"),
            ],
        );
        assert_eq!(state.last_user_message(), Some(&Message::user("second")));
        assert!(state.has_user_message());
    }
}
