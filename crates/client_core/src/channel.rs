//! Local view of the currently joined channel.
//!
//! The client is a thin projection of server state for one channel at a
//! time: switching channels replaces this state wholesale, and a channel's
//! log is not retained across switches.

use shared::domain::{ChatEvent, FileRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    pub name: String,
    pub topic: String,
    pub roster: Vec<String>,
    pub messages: Vec<ChatEvent>,
    pub files: Vec<FileRecord>,
}

impl ChannelState {
    pub fn fresh(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: String::new(),
            roster: Vec::new(),
            messages: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Applies one poll result: events are appended in arrival order (the
    /// server is the sole ordering authority; nothing is reordered or
    /// deduplicated), and the roster is replaced — not merged — when the
    /// poll carried one for this channel.
    pub fn apply_poll(&mut self, events: Vec<ChatEvent>, roster: Option<Vec<String>>) {
        self.messages.extend(events);
        if let Some(roster) = roster {
            self.roster = roster;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_poll_appends_in_arrival_order() {
        let mut state = ChannelState::fresh("#general");
        state.apply_poll(
            vec![
                ChatEvent::Plain {
                    text: "first".to_string(),
                },
                ChatEvent::Plain {
                    text: "second".to_string(),
                },
            ],
            None,
        );
        state.apply_poll(
            vec![ChatEvent::Plain {
                text: "third".to_string(),
            }],
            None,
        );

        let texts: Vec<_> = state
            .messages
            .iter()
            .map(|event| match event {
                ChatEvent::Plain { text } => text.as_str(),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn roster_is_replaced_not_merged() {
        let mut state = ChannelState::fresh("#general");
        state.apply_poll(Vec::new(), Some(vec!["alice".to_string(), "bob".to_string()]));
        state.apply_poll(Vec::new(), Some(vec!["carol".to_string()]));
        assert_eq!(state.roster, vec!["carol".to_string()]);
    }

    #[test]
    fn missing_roster_keeps_previous_one() {
        let mut state = ChannelState::fresh("#general");
        state.apply_poll(Vec::new(), Some(vec!["alice".to_string()]));
        state.apply_poll(Vec::new(), None);
        assert_eq!(state.roster, vec!["alice".to_string()]);
    }
}
