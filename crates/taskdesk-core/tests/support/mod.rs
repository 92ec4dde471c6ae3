#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde_json::{Value, json};
use taskdesk_core::client::{ApiClient, ApiRequest, ApiResponse, Method, Payload, Transport};
use taskdesk_core::context::{Credential, RequestContext};
use taskdesk_core::error::ApiError;
use taskdesk_shared::{TaskDto, UserDto, UserRef};

pub const ALICE_PASSWORD: &str = "wonderland";
pub const BOB_PASSWORD: &str = "builder";

struct Account {
    user: UserDto,
    password: String,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    tasks: BTreeMap<u64, TaskDto>,
    next_task_id: u64,
    requests: Vec<ApiRequest>,
    scripted: HashMap<(Method, String), Vec<ScriptedReply>>,
}

enum ScriptedReply {
    Respond(u16, Value),
    Unreachable,
}

/// In-memory stand-in for the task API. Tokens are `token-<user id>`.
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    pub fn new() -> Self {
        let accounts = vec![
            Account {
                user: UserDto {
                    id: 1,
                    email: "alice@example.com".to_string(),
                    name: "Alice".to_string(),
                    is_admin: true,
                    is_active: true,
                },
                password: ALICE_PASSWORD.to_string(),
            },
            Account {
                user: UserDto {
                    id: 2,
                    email: "bob@example.com".to_string(),
                    name: "Bob".to_string(),
                    is_admin: false,
                    is_active: true,
                },
                password: BOB_PASSWORD.to_string(),
            },
        ];

        Self {
            state: Mutex::new(State {
                accounts,
                next_task_id: 1,
                ..State::default()
            }),
        }
    }

    pub fn token_for(user_id: u64) -> Credential {
        Credential::new(format!("token-{user_id}"))
    }

    pub fn seed_task(&self, title: &str, assignee_id: Option<u64>) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_task_id;
        state.next_task_id += 1;
        let task = build_task(&state, id, title, None, assignee_id);
        state.tasks.insert(id, task);
        id
    }

    pub fn task(&self, id: u64) -> Option<TaskDto> {
        self.state.lock().tasks.get(&id).cloned()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// The next call to `method path` answers with `status` and `body`
    /// instead of the normal route.
    pub fn respond_once(&self, method: Method, path: &str, status: u16, body: Value) {
        self.state
            .lock()
            .scripted
            .entry((method, path.to_string()))
            .or_default()
            .push(ScriptedReply::Respond(status, body));
    }

    pub fn unreachable_once(&self, method: Method, path: &str) {
        self.state
            .lock()
            .scripted
            .entry((method, path.to_string()))
            .or_default()
            .push(ScriptedReply::Unreachable);
    }
}

impl Transport for FakeApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());

        let key = (request.method, request.path.clone());
        if let Some(queue) = state.scripted.get_mut(&key)
            && !queue.is_empty()
        {
            return match queue.remove(0) {
                ScriptedReply::Respond(status, body) => Ok(ApiResponse::new(status, body)),
                ScriptedReply::Unreachable => {
                    Err(ApiError::Transport("connection refused".to_string()))
                }
            };
        }

        Ok(route(&mut state, &request))
    }
}

pub fn client(api: FakeApi) -> ApiClient<FakeApi> {
    ApiClient::new(api)
}

pub fn context_for(user_id: u64) -> RequestContext {
    RequestContext::with_credential(FakeApi::token_for(user_id))
}

fn reply(status: u16, body: Value) -> ApiResponse {
    ApiResponse::new(status, body)
}

fn detail(status: u16, text: &str) -> ApiResponse {
    reply(status, json!({ "detail": text }))
}

fn route(state: &mut State, request: &ApiRequest) -> ApiResponse {
    let segments: Vec<&str> = request
        .path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match (request.method, segments.as_slice()) {
        (Method::Post, ["users", "login"]) => login(state, request, false),
        (Method::Post, ["users", "admin", "login"]) => login(state, request, true),
        (Method::Post, ["users", "register"]) => register(state, request, false),
        (Method::Post, ["users", "register", "admin"]) => {
            if caller(state, request).is_none_or(|user| !user.is_admin) {
                return detail(401, "Not authenticated");
            }
            register(state, request, true)
        }
        _ => {
            let Some(me) = caller(state, request) else {
                return detail(401, "Could not validate credentials");
            };
            authed_route(state, request, &segments, me)
        }
    }
}

fn authed_route(
    state: &mut State,
    request: &ApiRequest,
    segments: &[&str],
    me: UserDto,
) -> ApiResponse {
    let body = match &request.payload {
        Payload::Json(value) => value.clone(),
        _ => Value::Null,
    };

    match (request.method, segments) {
        (Method::Get, ["users", "me"]) => reply(200, json!(me)),
        (Method::Get, ["users", "all"]) => {
            let users: Vec<&UserDto> = state.accounts.iter().map(|a| &a.user).collect();
            reply(200, json!(users))
        }
        (Method::Get, ["users", "all", "active"]) => {
            let users: Vec<&UserDto> = state
                .accounts
                .iter()
                .map(|a| &a.user)
                .filter(|user| user.is_active)
                .collect();
            reply(200, json!(users))
        }
        (Method::Patch, ["users", action @ ("activate" | "deactivate"), id]) => {
            let Ok(id) = id.parse::<u64>() else {
                return detail(422, "invalid id");
            };
            match state.accounts.iter_mut().find(|a| a.user.id == id) {
                Some(account) => {
                    account.user.is_active = *action == "activate";
                    reply(200, json!(account.user))
                }
                None => detail(404, "User not found"),
            }
        }
        (Method::Get, ["tasks"]) => {
            let tasks: Vec<&TaskDto> = state.tasks.values().collect();
            reply(200, json!(tasks))
        }
        (Method::Get, ["tasks", "my"]) => {
            let tasks: Vec<&TaskDto> = state
                .tasks
                .values()
                .filter(|task| task.assignee_id == Some(me.id))
                .collect();
            reply(200, json!(tasks))
        }
        (Method::Get, ["tasks", id]) => match task_id(id).and_then(|id| state.tasks.get(&id)) {
            Some(task) => reply(200, json!(task)),
            None => detail(404, "Task not found"),
        },
        (Method::Post, ["tasks"]) => {
            let Some(title) = body.get("title").and_then(Value::as_str) else {
                return reply(422, json!({"detail": [{"msg": "field required"}]}));
            };
            let description = body
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            let assignee_id = decode_assignee(body.get("assignee_id"));
            let id = state.next_task_id;
            state.next_task_id += 1;
            let mut task = build_task(state, id, title, description, assignee_id);
            task.creator_id = Some(me.id);
            state.tasks.insert(id, task.clone());
            reply(200, json!(task))
        }
        (Method::Patch, ["tasks", id]) => {
            let Some(id) = task_id(id) else {
                return detail(422, "invalid id");
            };
            let Some(mut task) = state.tasks.get(&id).cloned() else {
                return detail(404, "Task not found");
            };
            if let Some(title) = body.get("title").and_then(Value::as_str) {
                task.title = title.to_string();
            }
            if let Some(description) = body.get("description").and_then(Value::as_str) {
                task.description = Some(description.to_string());
            }
            if let Some(complete) = body.get("is_complete").and_then(Value::as_bool) {
                task.is_complete = complete;
            }
            if body.get("assignee_id").is_some() {
                task.assignee_id = decode_assignee(body.get("assignee_id"));
                task.assignee = assignee_ref(state, task.assignee_id);
            }
            state.tasks.insert(id, task.clone());
            reply(200, json!(task))
        }
        (Method::Delete, ["tasks", id]) => match task_id(id).and_then(|id| state.tasks.remove(&id)) {
            Some(_) => detail(200, "Task deleted"),
            None => detail(404, "Task not found"),
        },
        _ => detail(404, "Not Found"),
    }
}

fn login(state: &State, request: &ApiRequest, admin: bool) -> ApiResponse {
    let Payload::Form(fields) = &request.payload else {
        return detail(422, "form body required");
    };
    let field = |name: &str| {
        fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    };

    let account = state
        .accounts
        .iter()
        .find(|a| a.user.email == field("username") || a.user.name == field("username"));
    match account {
        Some(account) if account.password == field("password") && account.user.is_active => {
            if admin && !account.user.is_admin {
                return detail(403, "Admin access required");
            }
            reply(
                200,
                json!({
                    "access_token": format!("token-{}", account.user.id),
                    "token_type": "bearer",
                }),
            )
        }
        _ => detail(401, "Incorrect username or password"),
    }
}

fn register(state: &mut State, request: &ApiRequest, admin: bool) -> ApiResponse {
    let Payload::Json(body) = &request.payload else {
        return detail(422, "json body required");
    };
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    if state.accounts.iter().any(|a| a.user.email == email) {
        return detail(400, "Email already registered");
    }

    let user = UserDto {
        id: state.accounts.len() as u64 + 1,
        email: email.to_string(),
        name: body
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        is_admin: admin,
        is_active: true,
    };
    state.accounts.push(Account {
        user: user.clone(),
        password: body
            .get("password")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    });
    reply(201, json!(user))
}

fn caller(state: &State, request: &ApiRequest) -> Option<UserDto> {
    let id = request
        .bearer
        .as_deref()?
        .strip_prefix("token-")?
        .parse::<u64>()
        .ok()?;
    state
        .accounts
        .iter()
        .map(|a| &a.user)
        .find(|user| user.id == id && user.is_active)
        .cloned()
}

fn task_id(raw: &str) -> Option<u64> {
    raw.parse().ok()
}

fn decode_assignee(value: Option<&Value>) -> Option<u64> {
    value
        .and_then(Value::as_i64)
        .filter(|id| *id >= 0)
        .map(|id| id as u64)
}

fn build_task(
    state: &State,
    id: u64,
    title: &str,
    description: Option<String>,
    assignee_id: Option<u64>,
) -> TaskDto {
    let assignee = assignee_ref(state, assignee_id);
    TaskDto {
        id,
        title: title.to_string(),
        description,
        is_complete: false,
        assignee_id,
        creator_id: None,
        assignee,
        created_by: None,
        created_at: Some("2024-03-01T09:00:00".to_string()),
        updated_at: None,
    }
}

fn assignee_ref(state: &State, assignee_id: Option<u64>) -> Option<UserRef> {
    let id = assignee_id?;
    state
        .accounts
        .iter()
        .find(|a| a.user.id == id)
        .map(|a| UserRef {
            id: a.user.id,
            name: a.user.name.clone(),
            email: a.user.email.clone(),
        })
}
