//! Chat and user identities.
//!
//! Telegram addresses a chat either by numeric id or by public `@handle`.
//! Group chats and channels can additionally carry a list of users that every
//! message should mention. Mentions are extracted into a [`ChatTarget`] once,
//! when a handler is built, so the hot path never has to ask what kind of
//! chat it is talking to.

use std::fmt;

use serde::{Serialize, Serializer};

/// A Telegram chat or user address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatIdentity {
    Numeric(i64),
    /// Public username, stored without the leading `@`.
    Handle(String),
}

impl Serialize for ChatIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChatIdentity::Numeric(id) => serializer.serialize_i64(*id),
            ChatIdentity::Handle(name) => serializer.serialize_str(&format!("@{name}")),
        }
    }
}

impl From<i64> for ChatIdentity {
    fn from(id: i64) -> Self {
        ChatIdentity::Numeric(id)
    }
}

impl From<&str> for ChatIdentity {
    fn from(name: &str) -> Self {
        ChatIdentity::Handle(name.to_string())
    }
}

impl From<String> for ChatIdentity {
    fn from(name: String) -> Self {
        ChatIdentity::Handle(name)
    }
}

/// A user that can be mentioned in a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct User(ChatIdentity);

impl User {
    pub fn new(id: impl Into<ChatIdentity>) -> Self {
        Self(id.into())
    }

    pub fn identity(&self) -> &ChatIdentity {
        &self.0
    }
}

/// Renders the mention as MarkdownV2.
///
/// Numeric ids become an inline `tg://user` link. Handles are emitted as-is:
/// the handle text is not escaped, so a handle containing reserved characters
/// will corrupt the surrounding markup.
impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ChatIdentity::Numeric(id) => write!(f, "[mentioning {id}](tg://user?id={id})"),
            ChatIdentity::Handle(name) => write!(f, "@{name}"),
        }
    }
}

impl Serialize for User {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl From<ChatIdentity> for User {
    fn from(id: ChatIdentity) -> Self {
        Self(id)
    }
}

impl From<i64> for User {
    fn from(id: i64) -> Self {
        Self(ChatIdentity::Numeric(id))
    }
}

impl From<&str> for User {
    fn from(name: &str) -> Self {
        Self(ChatIdentity::from(name))
    }
}

impl From<String> for User {
    fn from(name: String) -> Self {
        Self(ChatIdentity::Handle(name))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind {
    Group,
    Channel,
}

/// A group or channel, plus the users every message to it should mention.
///
/// The `mentioning*` builders leave `self` untouched and return a new value,
/// so one base chat can be reused with different mention lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupChat {
    id: ChatIdentity,
    kind: GroupKind,
    mentions: Vec<User>,
}

impl GroupChat {
    pub fn group(id: impl Into<ChatIdentity>) -> Self {
        Self {
            id: id.into(),
            kind: GroupKind::Group,
            mentions: Vec::new(),
        }
    }

    pub fn channel(id: impl Into<ChatIdentity>) -> Self {
        Self {
            id: id.into(),
            kind: GroupKind::Channel,
            mentions: Vec::new(),
        }
    }

    pub fn id(&self) -> &ChatIdentity {
        &self.id
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn mentions(&self) -> &[User] {
        &self.mentions
    }

    /// Append one mention.
    #[must_use]
    pub fn mentioning(&self, user: impl Into<User>) -> Self {
        let mut next = self.clone();
        next.mentions.push(user.into());
        next
    }

    /// Append several mentions, keeping their order.
    #[must_use]
    pub fn mentioning_all<U, I>(&self, users: I) -> Self
    where
        U: Into<User>,
        I: IntoIterator<Item = U>,
    {
        let mut next = self.clone();
        next.mentions.extend(users.into_iter().map(Into::into));
        next
    }
}

impl Serialize for GroupChat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

/// Where a handler delivers, and who it mentions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatTarget {
    pub chat_id: ChatIdentity,
    pub mentions: Vec<User>,
}

impl From<GroupChat> for ChatTarget {
    fn from(chat: GroupChat) -> Self {
        Self {
            chat_id: chat.id,
            mentions: chat.mentions,
        }
    }
}

impl From<User> for ChatTarget {
    fn from(user: User) -> Self {
        Self {
            chat_id: user.0,
            mentions: Vec::new(),
        }
    }
}

impl From<ChatIdentity> for ChatTarget {
    fn from(chat_id: ChatIdentity) -> Self {
        Self {
            chat_id,
            mentions: Vec::new(),
        }
    }
}

impl From<i64> for ChatTarget {
    fn from(id: i64) -> Self {
        ChatIdentity::from(id).into()
    }
}

impl From<&str> for ChatTarget {
    fn from(name: &str) -> Self {
        ChatIdentity::from(name).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_becomes_numeric_and_serializes_raw() {
        let id = ChatIdentity::from(42);
        assert_eq!(id, ChatIdentity::Numeric(42));
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }

    #[test]
    fn string_becomes_handle_and_serializes_with_at() {
        let id = ChatIdentity::from("ops");
        assert_eq!(id, ChatIdentity::Handle("ops".to_string()));
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""@ops""#);
    }

    #[test]
    fn mention_rendering() {
        assert_eq!(User::from(99).to_string(), "[mentioning 99](tg://user?id=99)");
        assert_eq!(User::from("alice").to_string(), "@alice");
    }

    #[test]
    fn mentioning_returns_new_value_and_keeps_order() {
        let base = GroupChat::group(-100123);
        let user_a = User::from(1);
        let user_b = User::from("bob");

        let with = base.mentioning_all([user_a.clone(), user_b.clone()]);

        assert_eq!(with.mentions(), &[user_a, user_b]);
        assert!(base.mentions().is_empty());
    }

    #[test]
    fn mentioning_accepts_ids_handles_and_identities() {
        let chat = GroupChat::channel("alerts")
            .mentioning(7)
            .mentioning("carol")
            .mentioning(ChatIdentity::Numeric(8))
            .mentioning_all(["dave", "erin"]);

        let rendered: Vec<String> = chat.mentions().iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "[mentioning 7](tg://user?id=7)",
                "@carol",
                "[mentioning 8](tg://user?id=8)",
                "@dave",
                "@erin",
            ]
        );
        assert_eq!(chat.kind(), GroupKind::Channel);
    }

    #[test]
    fn targets_extract_mentions_once() {
        let target = ChatTarget::from(GroupChat::group(-5).mentioning(3));
        assert_eq!(target.chat_id, ChatIdentity::Numeric(-5));
        assert_eq!(target.mentions, vec![User::from(3)]);

        let direct = ChatTarget::from(User::from("ops"));
        assert!(direct.mentions.is_empty());
    }

    #[test]
    fn group_serializes_as_its_identity() {
        let chat = GroupChat::group("team").mentioning(1);
        assert_eq!(serde_json::to_string(&chat).unwrap(), r#""@team""#);
    }
}
