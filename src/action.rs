use std::fmt;

/// Closed vocabulary of event kinds tagging every detail entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Consuming,
    Producing,
    Produced,
    Inbound,
    Outbound,
    AppLogic,
    HttpRequest,
    HttpResponse,
    DbRequest,
    DbResponse,
    Exception,
    System,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Consuming => "[CONSUMING]",
            EventKind::Producing => "[PRODUCING]",
            EventKind::Produced => "[PRODUCED]",
            EventKind::Inbound => "[INBOUND]",
            EventKind::Outbound => "[OUTBOUND]",
            EventKind::AppLogic => "[APP_LOGIC]",
            EventKind::HttpRequest => "[HTTP_REQUEST]",
            EventKind::HttpResponse => "[HTTP_RESPONSE]",
            EventKind::DbRequest => "[DB_REQUEST]",
            EventKind::DbResponse => "[DB_RESPONSE]",
            EventKind::Exception => "[EXCEPTION]",
            EventKind::System => "[SYSTEM]",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database operation used as the sub-action of DB events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOperation {
    Create,
    Read,
    Update,
    Delete,
    None,
}

impl DbOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbOperation::Create => "CREATE",
            DbOperation::Read => "READ",
            DbOperation::Update => "UPDATE",
            DbOperation::Delete => "DELETE",
            DbOperation::None => "NONE",
        }
    }
}

/// Event kind plus free-text description for one detail entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogAction {
    pub kind: EventKind,
    pub description: String,
    pub sub_action: String,
}

impl LogAction {
    pub fn new(kind: EventKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            sub_action: String::new(),
        }
    }

    /// Appends a sub-action; several are joined with `", "`.
    pub fn with_sub_action(mut self, sub_action: impl AsRef<str>) -> Self {
        if !self.sub_action.is_empty() {
            self.sub_action.push_str(", ");
        }
        self.sub_action.push_str(sub_action.as_ref());
        self
    }

    pub fn consuming(desc: impl Into<String>) -> Self {
        Self::new(EventKind::Consuming, desc)
    }

    pub fn producing(desc: impl Into<String>) -> Self {
        Self::new(EventKind::Producing, desc)
    }

    pub fn produced(desc: impl Into<String>) -> Self {
        Self::new(EventKind::Produced, desc)
    }

    pub fn inbound(desc: impl Into<String>) -> Self {
        Self::new(EventKind::Inbound, desc)
    }

    pub fn outbound(desc: impl Into<String>) -> Self {
        Self::new(EventKind::Outbound, desc)
    }

    pub fn app_logic(desc: impl Into<String>) -> Self {
        Self::new(EventKind::AppLogic, desc)
    }

    pub fn http_request(desc: impl Into<String>) -> Self {
        Self::new(EventKind::HttpRequest, desc)
    }

    pub fn http_response(desc: impl Into<String>) -> Self {
        Self::new(EventKind::HttpResponse, desc)
    }

    /// DB events carry the operation as sub-action and the query target as
    /// description.
    pub fn db_request(op: DbOperation, desc: impl Into<String>) -> Self {
        Self::new(EventKind::DbRequest, desc).with_sub_action(op.as_str())
    }

    pub fn db_response(op: DbOperation, desc: impl Into<String>) -> Self {
        Self::new(EventKind::DbResponse, desc).with_sub_action(op.as_str())
    }

    pub fn exception(desc: impl Into<String>) -> Self {
        Self::new(EventKind::Exception, desc)
    }

    pub fn system(desc: impl Into<String>) -> Self {
        Self::new(EventKind::System, desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_render_as_bracketed_tags() {
        assert_eq!(EventKind::DbRequest.to_string(), "[DB_REQUEST]");
        assert_eq!(EventKind::Inbound.as_str(), "[INBOUND]");
        assert_eq!(EventKind::Produced.as_str(), "[PRODUCED]");
    }

    #[test]
    fn sub_actions_join_with_comma() {
        let action = LogAction::outbound("call user service")
            .with_sub_action("GET")
            .with_sub_action("retry");
        assert_eq!(action.sub_action, "GET, retry");
        assert_eq!(action.kind, EventKind::Outbound);
    }

    #[test]
    fn db_actions_carry_operation() {
        let action = LogAction::db_request(DbOperation::Create, "orders");
        assert_eq!(action.kind, EventKind::DbRequest);
        assert_eq!(action.description, "orders");
        assert_eq!(action.sub_action, "CREATE");
    }
}
