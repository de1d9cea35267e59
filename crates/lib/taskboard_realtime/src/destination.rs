//! Destination Authorization Matcher.
//!
//! An ordered rule table evaluated for every inbound frame. The first rule
//! that applies decides; a frame no rule claims is denied.

use regex::Regex;
use taskboard_core::permissions::PermissionEvaluator;
use tracing::warn;

use crate::frame::{Command, Inbound};
use crate::interceptor::SecurityContext;

/// Comment topic destinations a client may subscribe to.
pub const COMMENT_TOPIC_PATTERN: &str = r"^/topic/projects/(\d+)/tasks/(\d+)/comments$";

/// Commands every session may send, authenticated or not.
const PERMITTED_COMMANDS: &[Command] = &[
    Command::Connect,
    Command::Stomp,
    Command::Unsubscribe,
    Command::Disconnect,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Permit,
    Deny,
}

impl Decision {
    pub fn is_permit(&self) -> bool {
        matches!(self, Decision::Permit)
    }
}

/// Resource ids captured from a comment topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentTopic {
    pub project_id: i64,
    pub task_id: i64,
}

enum Rule {
    /// Heart-beats and session lifecycle commands.
    PermitAll(&'static [Command]),
    /// SUBSCRIBE to a task's comment topic by a reader of its project.
    SubscribeCommentTopic(Regex),
    DenyAll,
}

pub struct DestinationMatcher {
    permissions: PermissionEvaluator,
    rules: Vec<Rule>,
}

impl DestinationMatcher {
    pub fn new(permissions: PermissionEvaluator) -> Result<Self, regex::Error> {
        Ok(Self {
            permissions,
            rules: vec![
                Rule::PermitAll(PERMITTED_COMMANDS),
                Rule::SubscribeCommentTopic(Regex::new(COMMENT_TOPIC_PATTERN)?),
                Rule::DenyAll,
            ],
        })
    }

    /// Decide whether `inbound` may proceed under `ctx`.
    pub async fn authorize(&self, inbound: &Inbound, ctx: &SecurityContext) -> Decision {
        let frame = match inbound {
            Inbound::Heartbeat => return Decision::Permit,
            Inbound::Frame(frame) => frame,
        };

        for rule in &self.rules {
            match rule {
                Rule::PermitAll(commands) => {
                    if commands.contains(&frame.command) {
                        return Decision::Permit;
                    }
                }
                Rule::SubscribeCommentTopic(pattern) => {
                    if frame.command != Command::Subscribe {
                        continue;
                    }
                    let Some(destination) = frame.destination() else {
                        continue;
                    };
                    if !pattern.is_match(destination) {
                        continue;
                    }
                    return self
                        .authorize_comment_topic(pattern, destination, ctx)
                        .await;
                }
                Rule::DenyAll => {
                    warn!(
                        command = %frame.command,
                        destination = frame.destination().unwrap_or(""),
                        user_id = ?ctx.user_id(),
                        "Frame denied"
                    );
                    return Decision::Deny;
                }
            }
        }
        Decision::Deny
    }

    async fn authorize_comment_topic(
        &self,
        pattern: &Regex,
        destination: &str,
        ctx: &SecurityContext,
    ) -> Decision {
        let Some(topic) = parse_comment_topic(pattern, destination) else {
            warn!(%destination, "Subscription denied: unparseable resource id");
            return Decision::Deny;
        };
        let Some(identity) = ctx.identity.as_ref().filter(|i| i.user_id().is_some()) else {
            warn!(%destination, "Subscription denied: no authenticated user");
            return Decision::Deny;
        };
        if self
            .permissions
            .can_read_project(identity, topic.project_id)
            .await
        {
            Decision::Permit
        } else {
            warn!(
                %destination,
                subject = %identity.subject,
                project_id = topic.project_id,
                "Subscription denied: not a project reader"
            );
            Decision::Deny
        }
    }
}

fn parse_comment_topic(pattern: &Regex, destination: &str) -> Option<CommentTopic> {
    let captures = pattern.captures(destination)?;
    Some(CommentTopic {
        project_id: captures.get(1)?.as_str().parse().ok()?,
        task_id: captures.get(2)?.as_str().parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taskboard_core::auth::Identity;
    use taskboard_core::models::ProjectRole;
    use taskboard_core::store::{MemoryStore, ProjectStore};

    use super::*;
    use crate::frame::Frame;

    async fn matcher() -> (DestinationMatcher, i64) {
        let store = Arc::new(MemoryStore::new());
        let project = store.create_project("p", None, 1).await.unwrap();
        store
            .add_member(project.id, 2, ProjectRole::Viewer)
            .await
            .unwrap();
        let matcher = DestinationMatcher::new(PermissionEvaluator::new(store)).unwrap();
        (matcher, project.id)
    }

    fn subscribe(destination: &str) -> Inbound {
        Inbound::Frame(
            Frame::new(Command::Subscribe)
                .with_header("id", "sub-0")
                .with_header("destination", destination),
        )
    }

    fn as_user(id: i64) -> SecurityContext {
        SecurityContext {
            identity: Some(Identity::for_user(id, ["USER"])),
        }
    }

    #[tokio::test]
    async fn lifecycle_frames_are_permitted_anonymously() {
        let (matcher, _) = matcher().await;
        let anon = SecurityContext::anonymous();
        for command in [
            Command::Connect,
            Command::Stomp,
            Command::Unsubscribe,
            Command::Disconnect,
        ] {
            let inbound = Inbound::Frame(Frame::new(command));
            assert_eq!(matcher.authorize(&inbound, &anon).await, Decision::Permit);
        }
        assert!(matcher.authorize(&Inbound::Heartbeat, &anon).await.is_permit());
    }

    #[tokio::test]
    async fn members_may_subscribe_to_comment_topics() {
        let (matcher, project_id) = matcher().await;
        let inbound = subscribe(&format!("/topic/projects/{project_id}/tasks/77/comments"));
        assert!(matcher.authorize(&inbound, &as_user(1)).await.is_permit());
        assert!(matcher.authorize(&inbound, &as_user(2)).await.is_permit());
        assert_eq!(matcher.authorize(&inbound, &as_user(3)).await, Decision::Deny);
        assert_eq!(
            matcher
                .authorize(&inbound, &SecurityContext::anonymous())
                .await,
            Decision::Deny
        );
    }

    #[tokio::test]
    async fn other_destinations_and_commands_are_denied() {
        let (matcher, project_id) = matcher().await;
        let owner = as_user(1);
        for destination in [
            format!("/topic/projects/{project_id}/tasks/1/comments/extra"),
            format!("/topic/projects/{project_id}/tasks/x/comments"),
            format!("/topic/projects/{project_id}"),
            "/queue/anything".to_string(),
            "/topic/projects/99999999999999999999/tasks/1/comments".to_string(),
        ] {
            assert_eq!(
                matcher.authorize(&subscribe(&destination), &owner).await,
                Decision::Deny,
                "{destination}"
            );
        }

        let send = Inbound::Frame(
            Frame::new(Command::Send).with_header(
                "destination",
                format!("/topic/projects/{project_id}/tasks/1/comments"),
            ),
        );
        assert_eq!(matcher.authorize(&send, &owner).await, Decision::Deny);
    }

    #[tokio::test]
    async fn non_numeric_subject_cannot_subscribe() {
        let (matcher, project_id) = matcher().await;
        let mut identity = Identity::for_user(1, ["USER"]);
        identity.subject = "alice".into();
        let ctx = SecurityContext {
            identity: Some(identity),
        };
        let inbound = subscribe(&format!("/topic/projects/{project_id}/tasks/1/comments"));
        assert_eq!(matcher.authorize(&inbound, &ctx).await, Decision::Deny);
    }
}
