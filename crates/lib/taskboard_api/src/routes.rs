//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REGISTER: &str = "/auth/register";
pub const GET_AUTH_VERIFY_EMAIL: &str = "/auth/verify-email";
pub const POST_AUTH_PASSWORD_RESET_REQUEST: &str = "/auth/password-reset/request";
pub const POST_AUTH_PASSWORD_RESET_CONFIRM: &str = "/auth/password-reset/confirm";
pub const GET_AUTH_ME: &str = "/auth/me";

pub const PROJECTS: &str = "/projects";
pub const PROJECT: &str = "/projects/{project_id}";
pub const PROJECT_MEMBERS: &str = "/projects/{project_id}/members";
pub const PROJECT_MEMBER: &str = "/projects/{project_id}/members/{user_id}";

pub const TASKS: &str = "/projects/{project_id}/tasks";
pub const TASK: &str = "/projects/{project_id}/tasks/{task_id}";

pub const COMMENTS: &str = "/projects/{project_id}/tasks/{task_id}/comments";
pub const COMMENT: &str = "/projects/{project_id}/tasks/{task_id}/comments/{comment_id}";
pub const COMMENT_REPLIES: &str =
    "/projects/{project_id}/tasks/{task_id}/comments/{comment_id}/replies";
