use pilot_domain::{Message, TerminationReason};

/// Terminal marker appended to the transcript when a run ends without `done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationMessage {
    /// Short title describing how the run ended
    pub title: String,
    /// Explanation and possible next steps
    pub description: String,
}

impl TerminationMessage {
    /// Formats a termination reason into a user facing marker. A limit stop
    /// reads differently from a user stop.
    pub fn format(reason: &TerminationReason) -> Self {
        match reason {
            TerminationReason::Cancelled => Self {
                title: "Run Stopped".to_string(),
                description: "The run was stopped before it finished. \
                    Completed steps are kept above."
                    .to_string(),
            },
            TerminationReason::LimitReached { limit } => {
                let allowance = match limit {
                    Some(limit) => format!("daily limit of {limit} actions"),
                    None => "daily action limit".to_string(),
                };
                Self {
                    title: "Daily Limit Reached".to_string(),
                    description: format!(
                        "The agent has used up the {allowance}. \
                        Upgrade your plan or try again tomorrow."
                    ),
                }
            }
            TerminationReason::FeedLost => Self {
                title: "Connection Lost".to_string(),
                description: "The agent stopped responding before the run finished. \
                    Completed steps are kept above."
                    .to_string(),
            },
        }
    }

    pub fn into_message(self) -> Message {
        Message::system(format!("{}\n\n{}", self.title, self.description))
    }
}
