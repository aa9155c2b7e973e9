use super::{ActionTable, BehavioralModel};
use crate::{
    environment::ServiceContext,
    message::{Message, Status, StatusOrigin, StatusValue},
};

/// The built-in `cyst` namespace: echo actions for testing and session
/// creation.
pub struct CystModel {
    actions: ActionTable<CystModel>,
}

impl CystModel {
    pub fn new() -> Self {
        let actions = ActionTable::new(Self::unsupported)
            .with("cyst:test:echo_success", Self::echo_success)
            .with("cyst:test:echo_failure", Self::echo_failure)
            .with("cyst:test:echo_error", Self::echo_error)
            .with("cyst:network:create_session", Self::create_session);
        Self { actions }
    }

    fn echo(request: &Message, ctx: &mut ServiceContext<'_>, value: StatusValue) -> (u64, Message) {
        let content = request
            .action()
            .and_then(|action| action.parameter("content"))
            .map(str::to_string);
        let status = Status::new(StatusOrigin::Service, value);
        (0, ctx.create_response(request, status, content))
    }

    fn echo_success(&mut self, request: &Message, ctx: &mut ServiceContext<'_>) -> (u64, Message) {
        Self::echo(request, ctx, StatusValue::Success)
    }

    fn echo_failure(&mut self, request: &Message, ctx: &mut ServiceContext<'_>) -> (u64, Message) {
        Self::echo(request, ctx, StatusValue::Failure)
    }

    fn echo_error(&mut self, request: &Message, ctx: &mut ServiceContext<'_>) -> (u64, Message) {
        Self::echo(request, ctx, StatusValue::Error)
    }

    fn create_session(&mut self, request: &Message, ctx: &mut ServiceContext<'_>) -> (u64, Message) {
        match ctx.create_session_from_message(request) {
            Ok(session) => {
                let status = Status::new(StatusOrigin::Service, StatusValue::Success);
                let mut response = ctx.create_response(request, status, Some(session.to_string()));
                response.set_session(Some(session));
                (0, response)
            }
            Err(e) => {
                let status = Status::new(StatusOrigin::Service, StatusValue::Error);
                (0, ctx.create_response(request, status, Some(e.to_string())))
            }
        }
    }

    fn unsupported(&mut self, request: &Message, ctx: &mut ServiceContext<'_>) -> (u64, Message) {
        let id = request.action().map_or("", |action| action.id());
        let status = Status::new(StatusOrigin::System, StatusValue::Error);
        let content = format!("Action {} not supported by the cyst model", id);
        (0, ctx.create_response(request, status, Some(content)))
    }
}

impl Default for CystModel {
    fn default() -> Self {
        Self::new()
    }
}

impl BehavioralModel for CystModel {
    fn evaluate(&mut self, request: &Message, ctx: &mut ServiceContext<'_>) -> (u64, Message) {
        let id = request.action().map_or("", |action| action.id());
        let handler = self.actions.handler(id);
        handler(self, request, ctx)
    }
}
