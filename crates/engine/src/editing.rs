use stratum_core::{ContentSnapshot, ExemptionSet, Scope, ScopeKey};

/// One in-progress, unsaved edit of a scope slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub target: ScopeKey,
    pub draft: ContentSnapshot,
    /// Parties that already opted out of this scope; the draft is not previewed for them.
    pub exemptions: ExemptionSet,
}

impl EditSession {
    pub fn scope(&self) -> Scope {
        self.target.scope()
    }
}

/// Which scope is being edited right now, if any.
/// Process-wide and non-persistent: at most one session, and starting a new
/// one replaces the previous one.
#[derive(Debug, Clone, Default)]
pub struct EditingScopeContext {
    session: Option<EditSession>,
}

impl EditingScopeContext {
    pub fn new() -> Self {
        Self { session: None }
    }

    /// Context with a session already open. Mostly useful when calling the
    /// resolver directly.
    pub fn editing(session: EditSession) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn target(&self) -> Option<&ScopeKey> {
        self.session.as_ref().map(|s| &s.target)
    }

    /// Start a session, returning the one it replaced.
    pub fn begin(&mut self, session: EditSession) -> Option<EditSession> {
        self.session.replace(session)
    }

    pub fn draft_mut(&mut self) -> Option<&mut ContentSnapshot> {
        self.session.as_mut().map(|s| &mut s.draft)
    }

    pub fn clear(&mut self) -> Option<EditSession> {
        self.session.take()
    }
}
