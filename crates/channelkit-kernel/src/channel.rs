//! Platform-agnostic channel snapshots.

use crate::any_identity::AnyIdentity;
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use std::hash::{Hash, Hasher};
use url::Url;

/// An immutable snapshot of a live-streaming channel on any platform.
///
/// Equality and hashing are defined by [`id`](Self::id) alone: two snapshots
/// of the same channel compare equal even if their titles or online states
/// differ.
#[derive(Debug, Clone)]
pub struct Channel {
    /// The identity of the channel.
    pub id: AnyIdentity,

    /// The name of the channel, usually the owner's nickname.
    pub name: String,

    /// The title of the live or most recent stream.
    pub title: Option<String>,

    /// Whether the channel is currently live.
    pub is_online: bool,

    /// When the most recent stream started.
    pub start_date: Option<DateTime<Utc>>,

    pub avatar_url: Option<Url>,

    pub thumbnail_url: Option<Url>,
}

impl Channel {
    pub fn builder(id: impl Into<AnyIdentity>, name: impl Into<String>) -> ChannelBuilder {
        ChannelBuilder {
            channel: Channel {
                id: id.into(),
                name: name.into(),
                title: None,
                is_online: false,
                start_date: None,
                avatar_url: None,
                thumbnail_url: None,
            },
        }
    }

    /// The channel's website URL for its current online state.
    pub fn web_view_url(&self) -> Url {
        self.identity().web_view_url(self.is_online)
    }

    /// The short, human-readable form of [`web_view_url`](Self::web_view_url).
    pub fn display_url(&self) -> String {
        self.identity().display_url(self.is_online)
    }

    pub fn in_app_view_url(&self) -> Option<Url> {
        self.identity().in_app_view_url(self.is_online)
    }

    fn identity(&self) -> &dyn Identity {
        self.id.base()
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Channel {}

impl Hash for Channel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Incremental construction of a [`Channel`].
#[derive(Debug, Clone)]
pub struct ChannelBuilder {
    channel: Channel,
}

impl ChannelBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.channel.title = Some(title.into());
        self
    }

    pub fn online(mut self, is_online: bool) -> Self {
        self.channel.is_online = is_online;
        self
    }

    pub fn start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.channel.start_date = Some(start_date);
        self
    }

    pub fn avatar_url(mut self, url: Url) -> Self {
        self.channel.avatar_url = Some(url);
        self
    }

    pub fn thumbnail_url(mut self, url: Url) -> Self {
        self.channel.thumbnail_url = Some(url);
        self
    }

    pub fn build(self) -> Channel {
        self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{value_eq, value_hash};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    struct Login(String);

    impl Identity for Login {
        fn hash_value(&self) -> u64 {
            value_hash(self)
        }

        fn is_equal(&self, other: &dyn Identity) -> bool {
            value_eq(self, other)
        }

        fn web_view_url(&self, online: bool) -> Url {
            let path = if online { "live" } else { "profile" };
            Url::parse(&format!("https://www.example.tv/{path}/{}", self.0))
                .expect("test url must parse")
        }

        fn in_app_view_url(&self, online: bool) -> Option<Url> {
            online
                .then(|| Url::parse(&format!("example://stream/{}", self.0)).ok())
                .flatten()
        }

        fn to_payload(&self) -> serde_json::Result<Value> {
            serde_json::to_value(self)
        }
    }

    #[test]
    fn equality_ignores_everything_but_identity() {
        let live = Channel::builder(Login("a".into()), "A")
            .title("speedrun")
            .online(true)
            .build();
        let offline = Channel::builder(Login("a".into()), "A (renamed)").build();
        let other = Channel::builder(Login("b".into()), "A").build();

        assert_eq!(live, offline);
        assert_ne!(live, other);

        let set: HashSet<Channel> = [live, offline, other].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn urls_follow_online_state() {
        let live = Channel::builder(Login("a".into()), "A").online(true).build();
        let offline = Channel::builder(Login("a".into()), "A").build();

        assert_eq!(live.web_view_url().as_str(), "https://www.example.tv/live/a");
        assert_eq!(offline.display_url(), "example.tv/profile/a");
        assert!(live.in_app_view_url().is_some());
        assert!(offline.in_app_view_url().is_none());
    }
}
