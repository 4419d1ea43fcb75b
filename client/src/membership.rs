//! Social-channel membership verification against the chat platform's
//! bot API, with a bounded poll.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use shared::{TaskId, UserId};
use tracing::{info, instrument, warn};

use crate::claim::unlock_task;
use crate::store::RemoteStore;

/// Attempt ceiling: the poll terminates even on sustained failure.
pub const MEMBERSHIP_POLL_ATTEMPTS: u32 = 100;
pub const MEMBERSHIP_POLL_INTERVAL: Duration = Duration::from_secs(3);

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    // `default = "Option::default"` keeps serde from demanding
    // `T: Default`; error responses carry no `result` at all.
    #[serde(default = "Option::default")]
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatMemberUpdated {
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(default)]
    my_chat_member: Option<ChatMemberUpdated>,
}

/// Terminal outcome of one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOutcome {
    /// Membership confirmed; the task's claimable sentinel was written.
    Verified,
    /// The user is verifiably not a member ("Join Again").
    NotMember,
    /// The chat or the member status could not be resolved.
    LookupFailed,
    /// Attempt ceiling reached without a conclusive answer.
    Exhausted,
}

pub struct MembershipChecker {
    client: Client,
    api_base: String,
    bot_token: String,
    attempts: u32,
    interval: Duration,
}

impl MembershipChecker {
    pub fn new(bot_token: String) -> Self {
        Self {
            client: Client::new(),
            api_base: API_BASE.to_owned(),
            bot_token,
            attempts: MEMBERSHIP_POLL_ATTEMPTS,
            interval: MEMBERSHIP_POLL_INTERVAL,
        }
    }

    pub fn with_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts;
        self.interval = interval;
        self
    }

    /// Points the checker at a different API host (local test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Resolves the chat the bot was added to, from the bot's pending
    /// updates. `None` when no membership update is waiting.
    #[instrument(skip(self))]
    pub async fn discover_chat(&self) -> anyhow::Result<Option<Chat>> {
        let url = format!("{}/bot{}/getUpdates", self.api_base, self.bot_token);
        let response: ApiResponse<Vec<Update>> =
            self.client.get(&url).send().await?.json().await?;
        if !response.ok {
            return Ok(None);
        }
        Ok(response
            .result
            .unwrap_or_default()
            .into_iter()
            .find_map(|update| update.my_chat_member)
            .map(|updated| updated.chat))
    }

    async fn fetch_chat_member(
        &self,
        chat_id: i64,
        user: &UserId,
    ) -> anyhow::Result<Option<ChatMember>> {
        let url = format!(
            "{}/bot{}/getChatMember?chat_id={chat_id}&user_id={user}",
            self.api_base, self.bot_token
        );
        let response: ApiResponse<ChatMember> =
            self.client.get(&url).send().await?.json().await?;
        Ok(if response.ok { response.result } else { None })
    }

    /// Polls the member status until a terminal outcome or the attempt
    /// ceiling. Transport errors are retried inside the budget; a
    /// resolved "not a member" answers immediately. On success the
    /// task's claimable sentinel is written before returning.
    ///
    /// Cancellation is cooperative: abort the owning task to stop the
    /// poll when its UI context is torn down.
    #[instrument(skip(self, store, chat), fields(task = %task_id))]
    pub async fn verify<S: RemoteStore>(
        &self,
        store: &S,
        user: &UserId,
        task_id: &TaskId,
        chat: Option<&Chat>,
    ) -> anyhow::Result<MembershipOutcome> {
        let Some(chat) = chat else {
            return Ok(MembershipOutcome::LookupFailed);
        };

        for attempt in 1..=self.attempts {
            match self.fetch_chat_member(chat.id, user).await {
                Err(err) => {
                    warn!("membership lookup attempt {attempt} failed: {err:#}");
                    // The interval separates attempts; the last failure
                    // returns without another wait.
                    if attempt < self.attempts {
                        tokio::time::sleep(self.interval).await;
                    }
                }
                Ok(None) => return Ok(MembershipOutcome::LookupFailed),
                Ok(Some(member)) => {
                    return if is_member(&chat.kind, &member.status) {
                        unlock_task(store, user, task_id).await?;
                        info!("membership verified");
                        Ok(MembershipOutcome::Verified)
                    } else {
                        Ok(MembershipOutcome::NotMember)
                    };
                }
            }
        }

        Ok(MembershipOutcome::Exhausted)
    }
}

/// Group-like chats accept any joined role; broadcast channels only
/// report plain members.
fn is_member(chat_kind: &str, status: &str) -> bool {
    match chat_kind {
        "group" | "supergroup" => matches!(status, "member" | "administrator" | "creator"),
        "channel" => status == "member",
        _ => false,
    }
}
