use serde::{Deserialize, Serialize};

/// The reply to a settlement callback. The processor must redeliver the callback until it sees `acknowledge: true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    pub acknowledge: bool,
}

impl CallbackAck {
    pub fn acknowledged() -> Self {
        Self { acknowledge: true }
    }

    pub fn rejected() -> Self {
        Self { acknowledge: false }
    }
}
